//! # Platform Backends
//!
//! Concrete implementations of the windowing traits in [`crate::window`].
//! The headless platform used by tests lives in [`crate::headless`].

/// GLFW windows with OpenGL contexts
#[cfg(feature = "glfw-backend")]
pub mod glfw;

#[cfg(feature = "glfw-backend")]
pub use self::glfw::{GlfwPlatform, GlfwWindow};
