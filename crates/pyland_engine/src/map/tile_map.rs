//! Tile maps: ordered layers plus the entities placed on them

use crate::map::object_manager::ObjectId;
use crate::render::renderable::RenderableComponent;

/// One drawable layer of a map
#[derive(Debug)]
pub struct Layer {
    name: String,
    renderable: RenderableComponent,
}

impl Layer {
    /// Layer with an empty renderable
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            renderable: RenderableComponent::new(),
        }
    }

    /// Layer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renderable component
    pub fn renderable(&self) -> &RenderableComponent {
        &self.renderable
    }

    /// Mutable renderable component
    pub fn renderable_mut(&mut self) -> &mut RenderableComponent {
        &mut self.renderable
    }
}

/// A tile map
///
/// Owns its layers, drawn first to last. Sprites and map objects are only
/// referenced by id; they live in the object manager.
#[derive(Debug)]
pub struct Map {
    name: String,
    width: u32,
    height: u32,
    layers: Vec<Layer>,
    sprites: Vec<ObjectId>,
    map_objects: Vec<ObjectId>,
}

impl Map {
    /// Empty map of `width` x `height` tiles
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            layers: Vec::new(),
            sprites: Vec::new(),
            map_objects: Vec::new(),
        }
    }

    /// Map name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width in tiles
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in tiles
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Layers, bottom to top
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Mutable layers
    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    /// Put `layer` on top
    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Sprites on the map
    pub fn sprites(&self) -> &[ObjectId] {
        &self.sprites
    }

    /// Place a sprite; no-op if already placed
    pub fn add_sprite(&mut self, id: ObjectId) {
        if !self.sprites.contains(&id) {
            self.sprites.push(id);
        }
    }

    /// Remove a sprite, returning whether it was placed
    pub fn remove_sprite(&mut self, id: ObjectId) -> bool {
        let before = self.sprites.len();
        self.sprites.retain(|sprite| *sprite != id);
        self.sprites.len() != before
    }

    /// Map objects on the map
    pub fn map_objects(&self) -> &[ObjectId] {
        &self.map_objects
    }

    /// Place a map object; no-op if already placed
    pub fn add_map_object(&mut self, id: ObjectId) {
        if !self.map_objects.contains(&id) {
            self.map_objects.push(id);
        }
    }

    /// Remove a map object, returning whether it was placed
    pub fn remove_map_object(&mut self, id: ObjectId) -> bool {
        let before = self.map_objects.len();
        self.map_objects.retain(|object| *object != id);
        self.map_objects.len() != before
    }
}

/// Texture rectangle `[u0, v0, u1, v1]`
pub type TexRect = [f32; 4];

/// Two triangles per tile for a `width` x `height` grid, built left to
/// right, bottom to top. `tile_uv` picks each tile's texture rectangle;
/// `None` leaves the tile out.
///
/// Returns `(positions, texcoords)`, two floats per vertex.
pub fn tile_grid_geometry<F>(width: u32, height: u32, tile_pixels: f32, mut tile_uv: F) -> (Vec<f32>, Vec<f32>)
where
    F: FnMut(u32, u32) -> Option<TexRect>,
{
    let mut positions = Vec::new();
    let mut texcoords = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let Some(uv) = tile_uv(x, y) else {
                continue;
            };
            let left = x as f32 * tile_pixels;
            let bottom = y as f32 * tile_pixels;
            push_quad(&mut positions, &mut texcoords, [left, bottom, left + tile_pixels, bottom + tile_pixels], uv);
        }
    }
    (positions, texcoords)
}

/// One quad from the origin to `(width, height)` pixels, full texture
pub fn quad_geometry(width: f32, height: f32) -> (Vec<f32>, Vec<f32>) {
    let mut positions = Vec::with_capacity(12);
    let mut texcoords = Vec::with_capacity(12);
    push_quad(&mut positions, &mut texcoords, [0.0, 0.0, width, height], [0.0, 0.0, 1.0, 1.0]);
    (positions, texcoords)
}

fn push_quad(positions: &mut Vec<f32>, texcoords: &mut Vec<f32>, rect: [f32; 4], uv: TexRect) {
    let [x0, y0, x1, y1] = rect;
    let [u0, v0, u1, v1] = uv;
    positions.extend_from_slice(&[x0, y0, x1, y0, x1, y1, x0, y0, x1, y1, x0, y1]);
    texcoords.extend_from_slice(&[u0, v0, u1, v0, u1, v1, u0, v0, u1, v1, u0, v1]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_lists_ignore_duplicates() {
        let mut map = Map::new("test", 10, 8);
        map.add_sprite(ObjectId(1));
        map.add_sprite(ObjectId(1));
        map.add_map_object(ObjectId(2));

        assert_eq!(map.sprites(), &[ObjectId(1)]);
        assert!(map.remove_sprite(ObjectId(1)));
        assert!(!map.remove_sprite(ObjectId(1)));
        assert!(map.remove_map_object(ObjectId(2)));
        assert!(map.map_objects().is_empty());
    }

    #[test]
    fn test_layers_keep_insertion_order() {
        let mut map = Map::new("test", 4, 4);
        map.add_layer(Layer::new("ground"));
        map.add_layer(Layer::new("decor"));

        let names: Vec<&str> = map.layers().iter().map(Layer::name).collect();
        assert_eq!(names, vec!["ground", "decor"]);
    }

    #[test]
    fn test_grid_geometry_skips_empty_tiles() {
        let (positions, texcoords) =
            tile_grid_geometry(3, 2, 32.0, |x, _| (x != 1).then_some([0.0, 0.0, 0.5, 0.5]));

        // Four tiles, six vertices each, two floats per vertex.
        assert_eq!(positions.len(), 4 * 6 * 2);
        assert_eq!(texcoords.len(), positions.len());
        assert_eq!(&positions[0..4], &[0.0, 0.0, 32.0, 0.0]);
    }

    #[test]
    fn test_quad_geometry_covers_size() {
        let (positions, _) = quad_geometry(16.0, 24.0);
        assert_eq!(positions.len(), 12);
        assert_eq!(positions.iter().copied().fold(0.0_f32, f32::max), 24.0);
    }
}
