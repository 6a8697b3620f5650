//! Map viewer: camera, viewport and the layered draw pipeline
//!
//! Every frame draws, in this order: map layers (bottom to top), map
//! objects, sprites, then the GUI overlay. All passes share one orthographic
//! projection covering the window in pixels. Layers are translated by the
//! camera offset, entities by their position relative to the camera, the
//! GUI not at all.

use std::sync::Arc;

use crate::foundation::math::{pixel_projection, translation_2d, IVec2, Mat4, Vec2};
use crate::map::entity::{MapEntity, MapObject, Sprite};
use crate::map::object_manager::{ObjectId, ObjectManager};
use crate::map::tile_map::Map;
use crate::render::api::{ClearFlags, GraphicsDevice};
use crate::render::renderable::RenderableComponent;
use crate::render::RenderError;

/// Something drawn on top of the map in window pixels
pub trait GuiOverlay {
    /// Renderable drawn last each frame
    fn renderable_component(&mut self) -> &mut RenderableComponent;
}

/// Visible part of the map, in tiles
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    /// Left edge
    pub x: f32,
    /// Bottom edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

/// Offset of a window of size `bound` along a line of size `length` so that
/// it is centred on `point` where possible.
///
/// ```text
/// length >= bound: the window stays inside the line
///
///         ┼─────────────┼
///     ├─────────────•───┤
///
/// bound > length: the line stays inside the window
///
///     ┼─────────────┼
///         |•────────┤
/// ```
///
/// The result is the distance from the start of the line to the start of
/// the window; negative when the window starts before the line.
pub fn centre_point_in_range(point: f32, length: f32, bound: f32) -> f32 {
    let offset = point - bound / 2.0;

    // Note the order of min/max.
    if length >= bound {
        offset.max(0.0).min(length - bound)
    } else {
        offset.min(0.0).max(length - bound)
    }
}

/// Renders one map into one window
pub struct MapViewer {
    objects: Arc<ObjectManager>,
    map: Option<Map>,
    focus: Option<ObjectId>,
    viewport: Viewport,
    window_size: (u32, u32),
    tile_pixels: f32,
    gui: Option<Box<dyn GuiOverlay>>,
}

impl MapViewer {
    /// Viewer for a window of `window_size` pixels. Configures the device's
    /// fixed pipeline state and clear colour.
    pub fn new(
        objects: Arc<ObjectManager>,
        device: &dyn GraphicsDevice,
        window_size: (u32, u32),
        tile_pixels: f32,
        clear_color: [f32; 4],
    ) -> Self {
        device.set_clear_color(clear_color);
        device.clear(ClearFlags::DEPTH);
        device.configure_pipeline_state();

        let mut viewer = Self {
            objects,
            map: None,
            focus: None,
            viewport: Viewport::default(),
            window_size,
            tile_pixels,
            gui: None,
        };
        viewer.resize(device, window_size);
        viewer
    }

    /// Recompute the viewport for a new window size
    pub fn resize(&mut self, device: &dyn GraphicsDevice, window_size: (u32, u32)) {
        log::info!("Map resizing");
        self.window_size = window_size;
        self.viewport.width = window_size.0 as f32 / self.tile_pixels;
        self.viewport.height = window_size.1 as f32 / self.tile_pixels;

        device.set_viewport(window_size.0, window_size.1);

        if self.map.is_some() {
            self.refocus_map();
        }
    }

    /// Draw one frame
    pub fn render(&mut self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        if self.map.is_none() {
            return Err(RenderError::NoMap);
        }

        device.clear(ClearFlags::COLOR | ClearFlags::DEPTH);

        self.refocus_map();
        let projection = pixel_projection(self.window_size.0, self.window_size.1);

        self.render_layers(device, &projection);
        self.render_objects(device, &projection);
        self.render_sprites(device, &projection);
        self.render_gui(device, &projection);
        Ok(())
    }

    fn render_layers(&mut self, device: &dyn GraphicsDevice, projection: &Mat4) {
        let modelview = translation_2d(
            -self.viewport.x * self.tile_pixels,
            -self.viewport.y * self.tile_pixels,
        );
        let Some(map) = self.map.as_mut() else {
            return;
        };
        for layer in map.layers_mut() {
            let name = layer.name().to_string();
            draw_component(device, layer.renderable_mut(), projection, modelview, &name);
        }
    }

    fn render_objects(&self, device: &dyn GraphicsDevice, projection: &Mat4) {
        let Some(map) = self.map.as_ref() else {
            return;
        };
        for id in map.map_objects() {
            match self.objects.get_object::<MapObject>(*id) {
                Some(object) => self.draw_entity(device, object.as_ref(), projection),
                None => log::debug!("MapViewer: skipping unresolvable map object {id}"),
            }
        }
    }

    fn render_sprites(&self, device: &dyn GraphicsDevice, projection: &Mat4) {
        let Some(map) = self.map.as_ref() else {
            return;
        };
        for id in map.sprites() {
            match self.objects.get_object::<Sprite>(*id) {
                Some(sprite) => self.draw_entity(device, sprite.as_ref(), projection),
                None => log::debug!("MapViewer: skipping unresolvable sprite {id}"),
            }
        }
    }

    fn render_gui(&mut self, device: &dyn GraphicsDevice, projection: &Mat4) {
        if let Some(gui) = self.gui.as_mut() {
            draw_component(device, gui.renderable_component(), projection, Mat4::identity(), "gui");
        }
    }

    fn draw_entity<E: MapEntity>(&self, device: &dyn GraphicsDevice, entity: &E, projection: &Mat4) {
        let position = entity.position();
        let modelview = translation_2d(
            self.tile_pixels * (position.x - self.viewport.x),
            self.tile_pixels * (position.y - self.viewport.y),
        );
        let mut renderable = entity.renderable();
        draw_component(device, &mut renderable, projection, modelview, entity.name());
    }

    /// Centre the camera on the focus sprite, half a tile in
    pub fn refocus_map(&mut self) {
        let Some(focus) = self.focus else {
            log::debug!("MapViewer::refocus_map: No focus.");
            return;
        };
        let Some(map) = self.map.as_ref() else {
            return;
        };
        let Some(sprite) = self.objects.get_object::<Sprite>(focus) else {
            log::info!("MapViewer::refocus_map: No sprites have focus.");
            return;
        };

        let position = sprite.position();
        self.viewport.x = centre_point_in_range(position.x + 0.5, map.width() as f32, self.viewport.width);
        self.viewport.y = centre_point_in_range(position.y + 0.5, map.height() as f32, self.viewport.height);
    }

    /// Follow `id` with the camera. Ids never allocated are rejected.
    pub fn set_map_focus_object(&mut self, id: ObjectId) -> bool {
        if !self.objects.is_valid_object_id(id) {
            log::error!("MapViewer::set_map_focus_object: Invalid focus object {id}");
            return false;
        }
        self.focus = Some(id);
        self.refocus_map();
        true
    }

    /// Current focus
    pub fn map_focus_object(&self) -> Option<ObjectId> {
        self.focus
    }

    /// Current viewport in tiles
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Window size the viewport was computed for
    pub fn window_size(&self) -> (u32, u32) {
        self.window_size
    }

    /// Show `map`, returning the previous one
    pub fn set_map(&mut self, map: Map) -> Option<Map> {
        let previous = self.map.replace(map);
        self.refocus_map();
        previous
    }

    /// Stop showing the current map
    pub fn take_map(&mut self) -> Option<Map> {
        self.map.take()
    }

    /// Current map
    pub fn map(&self) -> Option<&Map> {
        self.map.as_ref()
    }

    /// Mutable current map
    pub fn map_mut(&mut self) -> Option<&mut Map> {
        self.map.as_mut()
    }

    /// Install or remove the GUI overlay
    pub fn set_gui(&mut self, gui: Option<Box<dyn GuiOverlay>>) {
        self.gui = gui;
    }

    /// Window pixel (bottom-left origin) to map tile coordinates
    pub fn pixel_to_tile(&self, pixel: IVec2) -> Vec2 {
        pixel.cast::<f32>() / self.tile_pixels + Vec2::new(self.viewport.x, self.viewport.y)
    }

    /// Map tile coordinates to window pixel
    pub fn tile_to_pixel(&self, tile: Vec2) -> IVec2 {
        let offset = (tile - Vec2::new(self.viewport.x, self.viewport.y)) * self.tile_pixels;
        IVec2::new(offset.x as i32, offset.y as i32)
    }
}

fn draw_component(
    device: &dyn GraphicsDevice,
    component: &mut RenderableComponent,
    projection: &Mat4,
    modelview: Mat4,
    what: &str,
) {
    component.set_projection_matrix(*projection);
    component.set_modelview_matrix(modelview);

    let Some(bound) = component.bind(device) else {
        log::error!("MapViewer: \"{what}\" has no shader, skipped");
        return;
    };
    bound.upload_matrices();
    bound.draw();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{DeviceCall, RecordingDevice};
    use crate::map::object_manager::GameObject;
    use crate::map::tile_map::Layer;
    use crate::render::context::GraphicsContext;
    use crate::render::shader::{InlineSources, Shader, ShaderCaches};
    use approx::assert_relative_eq;

    struct Fixture {
        device: RecordingDevice,
        objects: Arc<ObjectManager>,
        shader: Arc<Shader>,
        _context: GraphicsContext,
        _caches: ShaderCaches,
    }

    fn fixture() -> Fixture {
        let device = RecordingDevice::new();
        let context = GraphicsContext::new();
        let caches = ShaderCaches::new(InlineSources::new().with_program("tile", "v", "f"));
        let shader = caches.get_shared_shader(&context, &device, "tile").unwrap();
        Fixture {
            device,
            objects: Arc::new(ObjectManager::new()),
            shader,
            _context: context,
            _caches: caches,
        }
    }

    fn viewer(fixture: &Fixture, window: (u32, u32)) -> MapViewer {
        MapViewer::new(Arc::clone(&fixture.objects), &fixture.device, window, 32.0, [0.0, 0.0, 0.0, 1.0])
    }

    fn shaded(component: &mut RenderableComponent, shader: &Arc<Shader>, vertices: i32) {
        component.set_shader(Some(Arc::clone(shader)));
        component.set_num_vertices_render(vertices);
    }

    #[test]
    fn test_centre_worked_examples() {
        assert_relative_eq!(centre_point_in_range(5.5, 10.0, 4.0), 3.5);
        assert_relative_eq!(centre_point_in_range(1.0, 3.0, 10.0), -4.0);
        assert_relative_eq!(centre_point_in_range(0.5, 10.0, 4.0), 0.0);
        assert_relative_eq!(centre_point_in_range(9.5, 10.0, 4.0), 6.0);
        assert_relative_eq!(centre_point_in_range(3.0, 6.0, 6.0), 0.0);
    }

    #[test]
    fn test_centre_stays_in_bounds() {
        for length in [1.0_f32, 4.0, 10.0, 25.0] {
            for bound in [1.0_f32, 4.0, 10.0, 25.0] {
                for step in 0..=20 {
                    let point = length * step as f32 / 20.0;
                    let offset = centre_point_in_range(point, length, bound);
                    if length >= bound {
                        assert!((0.0..=length - bound).contains(&offset));
                    } else {
                        assert!((length - bound..=0.0).contains(&offset));
                    }
                }
            }
        }
    }

    #[test]
    fn test_resize_sets_viewport_and_device() {
        let fixture = fixture();
        let mut viewer = viewer(&fixture, (640, 480));

        assert_relative_eq!(viewer.viewport().width, 20.0);
        assert_relative_eq!(viewer.viewport().height, 15.0);

        viewer.resize(&fixture.device, (320, 320));
        assert_relative_eq!(viewer.viewport().width, 10.0);
        assert!(fixture
            .device
            .calls()
            .contains(&DeviceCall::SetViewport { width: 320, height: 320 }));
    }

    #[test]
    fn test_new_configures_pipeline() {
        let fixture = fixture();
        let _viewer = viewer(&fixture, (64, 64));
        let calls = fixture.device.calls();

        assert!(calls.contains(&DeviceCall::ConfigurePipelineState));
        assert!(calls.contains(&DeviceCall::SetClearColor([0.0, 0.0, 0.0, 1.0])));
    }

    #[test]
    fn test_render_without_map_fails() {
        let fixture = fixture();
        let mut viewer = viewer(&fixture, (64, 64));

        assert!(matches!(viewer.render(&fixture.device), Err(RenderError::NoMap)));
    }

    #[test]
    fn test_refocus_without_focus_keeps_camera() {
        let fixture = fixture();
        let mut viewer = viewer(&fixture, (128, 128));
        viewer.set_map(Map::new("m", 20, 20));
        let before = viewer.viewport();

        viewer.refocus_map();
        assert_eq!(viewer.viewport(), before);
    }

    #[test]
    fn test_focus_centres_camera_on_sprite() {
        let fixture = fixture();
        let mut viewer = viewer(&fixture, (128, 128));
        viewer.set_map(Map::new("m", 10, 10));
        let sprite = Sprite::spawn(&fixture.objects, "player", Vec2::new(5.0, 1.0));

        assert!(viewer.set_map_focus_object(sprite.id()));

        // Viewport is 4x4 tiles.
        assert_relative_eq!(viewer.viewport().x, 3.5);
        assert_relative_eq!(viewer.viewport().y, 0.0);
    }

    #[test]
    fn test_invalid_focus_is_rejected() {
        let fixture = fixture();
        let mut viewer = viewer(&fixture, (128, 128));
        viewer.set_map(Map::new("m", 10, 10));
        let sprite = Sprite::spawn(&fixture.objects, "player", Vec2::new(5.0, 5.0));
        viewer.set_map_focus_object(sprite.id());

        assert!(!viewer.set_map_focus_object(ObjectId(0)));
        assert!(!viewer.set_map_focus_object(ObjectId(99)));
        assert_eq!(viewer.map_focus_object(), Some(sprite.id()));
    }

    #[test]
    fn test_stale_focus_keeps_camera() {
        let fixture = fixture();
        let mut viewer = viewer(&fixture, (128, 128));
        viewer.set_map(Map::new("m", 10, 10));
        let sprite = Sprite::spawn(&fixture.objects, "player", Vec2::new(8.0, 8.0));
        viewer.set_map_focus_object(sprite.id());
        let before = viewer.viewport();

        fixture.objects.remove_object(sprite.id());
        sprite.set_position(Vec2::new(0.0, 0.0));
        viewer.refocus_map();

        assert_eq!(viewer.viewport(), before);
    }

    #[test]
    fn test_render_order_and_draw_counts() {
        let fixture = fixture();
        let mut viewer = viewer(&fixture, (256, 256));

        let mut map = Map::new("m", 16, 16);
        for (name, vertices) in [("ground", 6), ("decor", 12)] {
            let mut layer = Layer::new(name);
            shaded(layer.renderable_mut(), &fixture.shader, vertices);
            map.add_layer(layer);
        }
        let object = MapObject::spawn(&fixture.objects, "chest", Vec2::new(2.0, 2.0));
        shaded(&mut object.renderable(), &fixture.shader, 18);
        map.add_map_object(object.id());
        let sprite = Sprite::spawn(&fixture.objects, "player", Vec2::new(3.0, 4.0));
        shaded(&mut sprite.renderable(), &fixture.shader, 24);
        map.add_sprite(sprite.id());
        map.add_sprite(ObjectId(500));
        viewer.set_map(map);

        struct Hud(RenderableComponent);
        impl GuiOverlay for Hud {
            fn renderable_component(&mut self) -> &mut RenderableComponent {
                &mut self.0
            }
        }
        let mut hud = RenderableComponent::new();
        shaded(&mut hud, &fixture.shader, 30);
        viewer.set_gui(Some(Box::new(Hud(hud))));

        fixture.device.clear_calls();
        viewer.render(&fixture.device).unwrap();

        let calls = fixture.device.calls();
        assert_eq!(calls[0], DeviceCall::Clear(ClearFlags::COLOR | ClearFlags::DEPTH));
        assert_eq!(
            fixture.device.draw_calls(),
            vec![(0, 6), (0, 12), (0, 18), (0, 24), (0, 30)]
        );
    }

    #[test]
    fn test_entity_modelview_is_relative_to_camera() {
        let fixture = fixture();
        let mut viewer = viewer(&fixture, (128, 128));
        let mut map = Map::new("m", 10, 10);
        let sprite = Sprite::spawn(&fixture.objects, "player", Vec2::new(5.0, 1.0));
        shaded(&mut sprite.renderable(), &fixture.shader, 6);
        map.add_sprite(sprite.id());
        viewer.set_map(map);
        viewer.set_map_focus_object(sprite.id());

        viewer.render(&fixture.device).unwrap();

        let expected = translation_2d(32.0 * (5.0 - 3.5), 32.0 * (1.0 - 0.0));
        assert_eq!(*sprite.renderable().modelview_matrix(), expected);
        assert_eq!(*sprite.renderable().projection_matrix(), pixel_projection(128, 128));
    }

    #[test]
    fn test_missing_shader_skips_only_that_entity() {
        let fixture = fixture();
        let mut viewer = viewer(&fixture, (128, 128));
        let mut map = Map::new("m", 10, 10);

        let bare = Sprite::spawn(&fixture.objects, "bare", Vec2::new(1.0, 1.0));
        bare.renderable().set_num_vertices_render(6);
        map.add_sprite(bare.id());
        let drawn = Sprite::spawn(&fixture.objects, "drawn", Vec2::new(2.0, 2.0));
        shaded(&mut drawn.renderable(), &fixture.shader, 12);
        map.add_sprite(drawn.id());
        viewer.set_map(map);

        viewer.render(&fixture.device).unwrap();
        assert_eq!(fixture.device.draw_calls(), vec![(0, 12)]);
    }

    #[test]
    fn test_pixel_tile_conversion() {
        let fixture = fixture();
        let mut viewer = viewer(&fixture, (128, 128));
        viewer.set_map(Map::new("m", 10, 10));
        let sprite = Sprite::spawn(&fixture.objects, "player", Vec2::new(5.0, 5.0));
        viewer.set_map_focus_object(sprite.id());

        let tile = viewer.pixel_to_tile(IVec2::new(64, 32));
        assert_relative_eq!(tile.x, viewer.viewport().x + 2.0);
        assert_relative_eq!(tile.y, viewer.viewport().y + 1.0);
        assert_eq!(viewer.tile_to_pixel(tile), IVec2::new(64, 32));
    }
}
