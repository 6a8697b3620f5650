//! # Rendering System
//!
//! The 2D tile renderer: a small graphics-device abstraction, per-context
//! shader caches and the renderable component every drawable entity carries.
//!
//! ## Architecture
//!
//! - **Device API**: [`api::GraphicsDevice`] is the only way the engine talks
//!   to the GPU. The desktop implementation lives in [`backends`]; tests use
//!   the recording device from [`crate::headless`].
//! - **Graphics context**: [`context::GraphicsContext`] identifies one native
//!   context and runs resource releasers when it is torn down.
//! - **Shader cache**: [`shader::ShaderCaches`] hands out shared, linked
//!   programs per context and forgets them once nobody holds them.
//! - **Renderables**: [`renderable::RenderableComponent`] bundles shader,
//!   vertex buffers, textures and matrices for one draw.

pub mod api;
pub mod backends;
pub mod context;
pub mod renderable;
pub mod shader;

use thiserror::Error;

pub use api::{
    BufferHandle, ClearFlags, GraphicsDevice, ProgramHandle, ShaderHandle, ShaderStage,
    TextureHandle, VertexAttribute,
};
pub use context::{ContextId, GraphicsContext};
pub use renderable::{BoundRenderable, RenderableComponent};
pub use shader::{LoadError, Shader, ShaderCache, ShaderCaches, ShaderDirectory, ShaderSourceProvider};

/// Rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// The viewer was asked to draw before a map was set
    #[error("No map is set on the viewer")]
    NoMap,

    /// The window has no graphics device to render with
    #[error("No graphics device available")]
    NoDevice,

    /// Device-level failure
    #[error("Device error: {0}")]
    Device(String),
}
