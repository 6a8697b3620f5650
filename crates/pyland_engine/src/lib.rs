//! # Pyland Engine
//!
//! Window, surface and tile-map rendering core for a 2D game.
//!
//! ## Features
//!
//! - **Window lifecycle**: a registry of windows with deferred surface
//!   re-initialization on resize, move and focus changes
//! - **Background rendering**: offscreen surfaces read back and presented
//!   when a window cannot be drawn to directly
//! - **Shader cache**: one shared program per name and graphics context,
//!   reclaimed once unused
//! - **Map viewer**: layers, map objects, sprites and GUI drawn in order
//!   with a camera that follows a sprite
//! - **Headless mode**: mock platform and recording device for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pyland_engine::prelude::*;
//!
//! # #[cfg(feature = "glfw-backend")]
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     pyland_engine::foundation::logging::init();
//!
//!     let config = EngineConfig::load_or_default("pyland.toml")?;
//!     let mut engine = Engine::new(GlfwPlatform::new(), config)?;
//!
//!     let shader = engine.load_shader("tile")?;
//!     let mut map = Map::new("demo", 32, 32);
//!     let mut ground = Layer::new("ground");
//!     ground.renderable_mut().set_shader(Some(shader));
//!     map.add_layer(ground);
//!     engine.viewer_mut().set_map(map);
//!
//!     engine.run()?;
//!     Ok(())
//! }
//! # #[cfg(not(feature = "glfw-backend"))]
//! # fn main() {}
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod config;
pub mod core;
pub mod foundation;
pub mod input;
pub mod map;
pub mod render;
pub mod window;

// Platform backends
pub mod backend;
pub mod headless;

mod engine;

pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    #[cfg(feature = "glfw-backend")]
    pub use crate::backend::GlfwPlatform;
    pub use crate::{
        config::{Config, ConfigError},
        core::config::{EngineConfig, RenderingConfig, ShaderConfig, ShaderDialect, WindowConfig},
        foundation::{
            callbacks::{CallbackRegistry, Lifeline},
            math::{IVec2, Mat4, Vec2},
            time::FrameClock,
        },
        input::{InputManager, KeyCode},
        map::{GameObject, Layer, Map, MapEntity, MapObject, MapViewer, ObjectId, ObjectManager, Sprite},
        render::{GraphicsDevice, RenderError, RenderableComponent, Shader, ShaderCaches},
        window::{GameWindow, InitError, ResizeEvent, WindowId, WindowRegistry},
        Engine, EngineError,
    };
}
