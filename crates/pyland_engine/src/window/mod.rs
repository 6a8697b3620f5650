//! # Window Management
//!
//! Windows, their graphics surfaces and the registry that pumps platform
//! events into them.
//!
//! ## Organization
//!
//! - **Platform**: backend traits ([`platform::Platform`],
//!   [`platform::NativeWindow`], [`platform::SurfaceBackend`]) and the
//!   platform-neutral [`platform::WindowEvent`]
//! - **Surface**: the per-window surface state machine with deferred
//!   re-initialization and background blitting
//! - **Game window**: one window with its surface, context, input manager
//!   and resize callbacks
//! - **Registry**: owns all windows, tracks focus, runs the per-frame pump

pub mod game_window;
pub mod platform;
pub mod registry;
pub mod surface;

use thiserror::Error;

pub use game_window::{GameWindow, ResizeEvent};
pub use platform::{
    NativeWindow, Platform, SurfaceBackend, SurfaceRect, WindowEvent, WindowSizing, WindowRequest,
};
pub use registry::WindowRegistry;
pub use surface::{SurfaceAction, SurfaceManager, SurfaceMode, SurfaceState};

/// Identifier of a registered window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u32);

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// Window, context and surface construction errors
#[derive(Error, Debug)]
pub enum InitError {
    /// The windowing platform could not be initialized
    #[error("Failed to initialize platform: {0}")]
    PlatformInit(String),

    /// A window was requested before the platform was initialized
    #[error("Platform is not initialized")]
    PlatformNotInitialized,

    /// The native window could not be created
    #[error("Failed to create window: {0}")]
    WindowCreation(String),

    /// The graphics context could not be created or bound
    #[error("Graphics context error: {0}")]
    Context(String),

    /// The drawing surface could not be created
    #[error("Surface error: {0}")]
    Surface(String),
}
