//! Backend-agnostic windowing traits
//!
//! A [`Platform`] is the process-wide windowing subsystem; it creates
//! [`NativeWindow`]s. Every native window is also a [`SurfaceBackend`], the
//! small set of context/surface calls the surface state machine drives.

use std::any::Any;
use std::rc::Rc;

use crate::input::KeyCode;
use crate::render::api::GraphicsDevice;
use crate::window::surface::SurfaceMode;
use crate::window::InitError;

/// Drawable area of a window, in pixels, relative to the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceRect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl SurfaceRect {
    /// Rectangle at `(x, y)` of the given size
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Same size, moved by `(dx, dy)`
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }
}

/// How a new window is sized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSizing {
    /// Resizable window of the given size
    Fixed {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
    /// Fullscreen on the primary monitor
    Fullscreen {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
    /// Resizable window filling the desktop
    Maximized,
}

impl WindowSizing {
    /// Sizing for a `create_window(width, height, fullscreen)` request.
    /// Zero width and height without fullscreen means maximized.
    pub fn from_request(width: u32, height: u32, fullscreen: bool) -> Self {
        if fullscreen {
            Self::Fullscreen { width, height }
        } else if width == 0 && height == 0 {
            Self::Maximized
        } else {
            Self::Fixed { width, height }
        }
    }

    /// Pixel size to open the window with. A zero dimension means automatic
    /// and takes the monitor's; maximized windows take the whole monitor.
    pub fn resolve(self, monitor: (u32, u32)) -> (u32, u32) {
        match self {
            Self::Fixed { width, height } | Self::Fullscreen { width, height } => (
                if width == 0 { monitor.0 } else { width },
                if height == 0 { monitor.1 } else { height },
            ),
            Self::Maximized => monitor,
        }
    }
}

/// Everything a platform needs to open a window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRequest {
    /// Title bar text
    pub title: String,
    /// Sizing mode
    pub sizing: WindowSizing,
}

impl WindowRequest {
    /// Request from title and sizing
    pub fn new(title: impl Into<String>, sizing: WindowSizing) -> Self {
        Self {
            title: title.into(),
            sizing,
        }
    }
}

/// Platform-neutral window event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// The user asked to close the window
    Close,
    /// The window was resized
    Resized {
        /// New width
        width: u32,
        /// New height
        height: u32,
    },
    /// The window was maximized
    Maximized,
    /// The window was restored from maximized or minimized
    Restored,
    /// The window moved
    Moved {
        /// New left edge
        x: i32,
        /// New top edge
        y: i32,
    },
    /// The window became visible
    Shown,
    /// The window gained input focus
    FocusGained,
    /// The window lost input focus
    FocusLost,
    /// The window was minimized
    Minimized,
    /// The window was hidden
    Hidden,
    /// A key changed state
    Key {
        /// Key
        key: KeyCode,
        /// Pressed or released
        pressed: bool,
    },
    /// Anything the engine does not handle
    Other,
}

/// Context and surface operations of one native window
pub trait SurfaceBackend {
    /// Create the graphics context
    fn create_context(&mut self) -> Result<(), InitError>;

    /// Destroy the graphics context
    fn destroy_context(&mut self);

    /// Create the drawing surface. Foreground surfaces are on-screen at
    /// `rect`; background surfaces are offscreen buffers of `rect`'s size.
    fn create_surface(&mut self, mode: SurfaceMode, rect: SurfaceRect) -> Result<(), InitError>;

    /// Destroy the surface created in `mode`
    fn destroy_surface(&mut self, mode: SurfaceMode);

    /// Bind the context to the current surface
    fn make_current(&mut self) -> Result<(), InitError>;

    /// Unbind the context
    fn release_current(&mut self);

    /// Present a foreground surface
    fn swap(&mut self);

    /// Read `width` x `height` RGBA pixels of the background surface,
    /// bottom row first
    fn read_pixels(&mut self, width: u32, height: u32, out: &mut [u8]);

    /// Show `width` x `height` RGBA pixels, top row first, in the window
    fn present_pixels(&mut self, width: u32, height: u32, pixels: &[u8]);

    /// Current drawable area
    fn drawable_rect(&self) -> SurfaceRect;
}

/// One platform window
pub trait NativeWindow: SurfaceBackend {
    /// Events received since the last call, oldest first
    fn drain_events(&mut self) -> Vec<WindowEvent>;

    /// Device issuing GPU commands into this window's context
    fn graphics_device(&self) -> Option<Rc<dyn GraphicsDevice>>;

    /// Get access to the concrete type for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Get mutable access to the concrete type for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Process-wide windowing subsystem
pub trait Platform {
    /// Window type created by this platform
    type Window: NativeWindow;

    /// Initialize the subsystem
    fn init(&mut self) -> Result<(), InitError>;

    /// Tear the subsystem down
    fn terminate(&mut self);

    /// Whether [`Platform::init`] succeeded and was not undone
    fn is_initialized(&self) -> bool;

    /// Open a window
    fn create_window(&mut self, request: &WindowRequest) -> Result<Self::Window, InitError>;

    /// Collect pending events into each window's queue. Returns `true` when
    /// the platform asked the whole application to quit.
    fn pump_events(&mut self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizing_from_request() {
        assert_eq!(WindowSizing::from_request(0, 0, false), WindowSizing::Maximized);
        assert_eq!(
            WindowSizing::from_request(0, 0, true),
            WindowSizing::Fullscreen { width: 0, height: 0 }
        );
        assert_eq!(
            WindowSizing::from_request(640, 0, false),
            WindowSizing::Fixed { width: 640, height: 0 }
        );
        assert_eq!(
            WindowSizing::from_request(800, 600, true),
            WindowSizing::Fullscreen {
                width: 800,
                height: 600
            }
        );
    }

    #[test]
    fn test_automatic_dimensions_take_monitor_size() {
        let monitor = (1920, 1080);
        assert_eq!(WindowSizing::from_request(0, 0, true).resolve(monitor), (1920, 1080));
        assert_eq!(WindowSizing::from_request(0, 0, false).resolve(monitor), (1920, 1080));
        assert_eq!(WindowSizing::from_request(640, 0, false).resolve(monitor), (640, 1080));
        assert_eq!(WindowSizing::from_request(800, 600, true).resolve(monitor), (800, 600));
    }

    #[test]
    fn test_rect_offset_keeps_size() {
        let rect = SurfaceRect::new(10, 20, 300, 200).offset(24, 16);
        assert_eq!(rect, SurfaceRect::new(34, 36, 300, 200));
    }
}
