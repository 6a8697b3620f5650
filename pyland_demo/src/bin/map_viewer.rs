//! Map viewer demo
//!
//! A procedurally textured island with a player sprite the camera follows.
//! Arrow keys move the player, closing the window quits.

use std::path::PathBuf;

use pyland_engine::map::{quad_geometry, tile_grid_geometry, GuiOverlay, TexRect};
use pyland_engine::prelude::*;
use pyland_engine::render::TextureHandle;

const MAP_WIDTH: u32 = 40;
const MAP_HEIGHT: u32 = 30;

/// Atlas of 2x2 tiles, 16 pixels each
const ATLAS_TILE: usize = 16;
const ATLAS_SIZE: usize = ATLAS_TILE * 2;

#[derive(Clone, Copy)]
enum Tile {
    Water,
    Grass,
    Path,
    Stone,
}

impl Tile {
    fn atlas_slot(self) -> (usize, usize) {
        match self {
            Self::Water => (0, 0),
            Self::Grass => (1, 0),
            Self::Path => (0, 1),
            Self::Stone => (1, 1),
        }
    }

    fn colour(self) -> [u8; 3] {
        match self {
            Self::Water => [40, 90, 200],
            Self::Grass => [60, 160, 70],
            Self::Path => [200, 170, 110],
            Self::Stone => [130, 130, 140],
        }
    }

    fn uv(self) -> TexRect {
        let (column, row) = self.atlas_slot();
        let step = 0.5;
        let (u, v) = (column as f32 * step, row as f32 * step);
        [u, v, u + step, v + step]
    }

    /// Texture coordinates of this tile for one [`quad_geometry`] quad
    fn uv_quad(self) -> Vec<f32> {
        let [u0, v0, u1, v1] = self.uv();
        vec![u0, v0, u1, v0, u1, v1, u0, v0, u1, v1, u0, v1]
    }
}

fn tile_at(x: u32, y: u32) -> Tile {
    let dx = x as f32 - MAP_WIDTH as f32 / 2.0;
    let dy = y as f32 - MAP_HEIGHT as f32 / 2.0;
    let distance = (dx * dx + dy * dy).sqrt();

    if distance > 13.0 {
        Tile::Water
    } else if x == MAP_WIDTH / 2 || y == MAP_HEIGHT / 2 {
        Tile::Path
    } else if (x * 7 + y * 13) % 17 == 0 {
        Tile::Stone
    } else {
        Tile::Grass
    }
}

fn atlas_pixels() -> Vec<u8> {
    let mut pixels = vec![0; ATLAS_SIZE * ATLAS_SIZE * 4];
    for tile in [Tile::Water, Tile::Grass, Tile::Path, Tile::Stone] {
        let (column, row) = tile.atlas_slot();
        let [r, g, b] = tile.colour();
        for y in 0..ATLAS_TILE {
            for x in 0..ATLAS_TILE {
                // Darker border so tile edges are visible.
                let shade = if x == 0 || y == 0 { 0.8 } else { 1.0 };
                let px = column * ATLAS_TILE + x;
                let py = row * ATLAS_TILE + y;
                let offset = (py * ATLAS_SIZE + px) * 4;
                pixels[offset..offset + 4].copy_from_slice(&[
                    (f32::from(r) * shade) as u8,
                    (f32::from(g) * shade) as u8,
                    (f32::from(b) * shade) as u8,
                    0xff,
                ]);
            }
        }
    }
    pixels
}

fn player_pixels() -> Vec<u8> {
    let size = ATLAS_TILE as i32;
    let centre = size / 2;
    let mut pixels = Vec::with_capacity(ATLAS_TILE * ATLAS_TILE * 4);
    for y in 0..size {
        for x in 0..size {
            let (dx, dy) = (x - centre, y - centre);
            if dx * dx + dy * dy <= (centre - 1) * (centre - 1) {
                pixels.extend_from_slice(&[220, 40, 40, 0xff]);
            } else {
                pixels.extend_from_slice(&[0, 0, 0, 0]);
            }
        }
    }
    pixels
}

/// Small marker in the bottom-left corner of the window
struct Hud {
    renderable: RenderableComponent,
}

impl GuiOverlay for Hud {
    fn renderable_component(&mut self) -> &mut RenderableComponent {
        &mut self.renderable
    }
}

fn textured(
    device: &dyn GraphicsDevice,
    shader: &std::sync::Arc<Shader>,
    texture: TextureHandle,
    (positions, texcoords): (Vec<f32>, Vec<f32>),
) -> Result<RenderableComponent, RenderError> {
    let mut renderable = RenderableComponent::new();
    renderable.upload_geometry(device, &positions, &texcoords)?;
    renderable.set_shader(Some(std::sync::Arc::clone(shader)));
    renderable.set_textures(vec![texture]);
    Ok(renderable)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = EngineConfig::load_or_default("pyland.toml")?;
    pyland_engine::foundation::logging::init_with_level(&config.log_level);

    log::info!("Starting Pyland map viewer demo");

    if !config.shaders.search_dir.exists() {
        config.shaders.search_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("resources/shaders");
    }
    config.window.title = "Pyland map viewer".to_string();

    let mut engine = Engine::new(GlfwPlatform::new(), config)?;
    let shader = engine.load_shader("tile")?;
    let device = engine.device()?;
    let tile_pixels = engine.config().rendering.tile_pixels;

    let atlas = device.create_texture_rgba(ATLAS_SIZE as u32, ATLAS_SIZE as u32, &atlas_pixels())?;
    let player_texture = device.create_texture_rgba(ATLAS_TILE as u32, ATLAS_TILE as u32, &player_pixels())?;

    let mut map = Map::new("island", MAP_WIDTH, MAP_HEIGHT);
    let mut ground = Layer::new("ground");
    *ground.renderable_mut() = textured(
        device.as_ref(),
        &shader,
        atlas,
        tile_grid_geometry(MAP_WIDTH, MAP_HEIGHT, tile_pixels, |x, y| Some(tile_at(x, y).uv())),
    )?;
    map.add_layer(ground);

    let player = Sprite::spawn(engine.objects(), "player", Vec2::new(20.0, 15.0));
    *player.renderable() = textured(
        device.as_ref(),
        &shader,
        player_texture,
        quad_geometry(tile_pixels, tile_pixels),
    )?;
    map.add_sprite(player.id());

    let hud = Hud {
        renderable: textured(
            device.as_ref(),
            &shader,
            atlas,
            (quad_geometry(tile_pixels / 2.0, tile_pixels / 2.0).0, Tile::Stone.uv_quad()),
        )?,
    };

    let viewer = engine.viewer_mut();
    viewer.set_map(map);
    viewer.set_gui(Some(Box::new(hud)));
    viewer.set_map_focus_object(player.id());

    while engine.run_frame()? {
        let input = engine.window()?.input_manager();
        let mut step = Vec2::zeros();
        if input.is_key_pressed(KeyCode::Left) {
            step.x -= 1.0;
        }
        if input.is_key_pressed(KeyCode::Right) {
            step.x += 1.0;
        }
        if input.is_key_pressed(KeyCode::Up) {
            step.y += 1.0;
        }
        if input.is_key_pressed(KeyCode::Down) {
            step.y -= 1.0;
        }
        if step != Vec2::zeros() {
            let target = player.position() + step;
            let x = target.x.clamp(0.0, (MAP_WIDTH - 1) as f32);
            let y = target.y.clamp(0.0, (MAP_HEIGHT - 1) as f32);
            player.set_position(Vec2::new(x, y));
        }
    }

    log::info!(
        "Finished after {} frames ({:.1} fps)",
        engine.clock().frame_count(),
        engine.clock().average_fps()
    );
    Ok(())
}
