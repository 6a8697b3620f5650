//! Graphics device implementations
//!
//! Only OpenGL through `glow` for now. Headless runs use the recording
//! device from [`crate::headless`].

/// OpenGL device
#[cfg(feature = "glfw-backend")]
pub mod gl;

#[cfg(feature = "glfw-backend")]
pub use gl::GlowDevice;
