//! Maps, the objects placed on them and the viewer that draws them

pub mod entity;
pub mod object_manager;
pub mod tile_map;
pub mod viewer;

pub use entity::{EntityState, MapEntity, MapObject, Sprite};
pub use object_manager::{GameObject, ObjectId, ObjectManager};
pub use tile_map::{quad_geometry, tile_grid_geometry, Layer, Map, TexRect};
pub use viewer::{centre_point_in_range, GuiOverlay, MapViewer, Viewport};
