//! A single game window
//!
//! Owns its native window, surface manager, graphics context and input
//! manager. Construction brings up context and surface; dropping the window
//! tears them down in reverse (surface, then context with its resource
//! releasers, then callbacks) before the native window goes away.

use std::rc::Rc;

use crate::core::config::RenderingConfig;
use crate::foundation::callbacks::{CallbackRegistry, Lifeline};
use crate::input::InputManager;
use crate::render::api::GraphicsDevice;
use crate::render::context::GraphicsContext;
use crate::window::platform::{NativeWindow, SurfaceRect};
use crate::window::surface::SurfaceManager;
use crate::window::{InitError, WindowId};

/// Payload of resize callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeEvent {
    /// Window that changed
    pub window: WindowId,
    /// New drawable geometry
    pub rect: SurfaceRect,
}

/// A window with its surface, graphics context and input state
pub struct GameWindow<N: NativeWindow> {
    id: WindowId,
    native: N,
    surface: SurfaceManager,
    context: Option<GraphicsContext>,
    input: InputManager,
    resizing: bool,
    close_requested: bool,
    resize_callbacks: CallbackRegistry<ResizeEvent>,
}

impl<N: NativeWindow> GameWindow<N> {
    /// Bring up context and surface on `native`.
    ///
    /// On failure everything created so far is released and `native` is
    /// dropped, closing the platform window.
    pub fn create(id: WindowId, mut native: N, rendering: &RenderingConfig) -> Result<Self, InitError> {
        let mut surface = SurfaceManager::new(rendering);

        native.create_context()?;
        if let Err(error) = surface.init(&mut native) {
            log::error!("Failed to initialize surface for {id}: {error}");
            native.destroy_context();
            return Err(error);
        }

        Ok(Self {
            id,
            native,
            surface,
            context: Some(GraphicsContext::new()),
            input: InputManager::new(),
            resizing: false,
            close_requested: false,
            resize_callbacks: CallbackRegistry::new(),
        })
    }

    /// Window id
    pub fn id(&self) -> WindowId {
        self.id
    }

    /// Ask the game loop to close this window
    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    /// Withdraw a close request
    pub fn cancel_close(&mut self) {
        self.close_requested = false;
    }

    /// Whether closing was requested
    pub fn check_close(&self) -> bool {
        self.close_requested
    }

    /// Drawable size in pixels, as of the last surface init
    pub fn size(&self) -> (u32, u32) {
        let rect = self.surface.rect();
        (rect.width, rect.height)
    }

    /// Drawable origin, as of the last surface init
    pub fn position(&self) -> (i32, i32) {
        let rect = self.surface.rect();
        (rect.x, rect.y)
    }

    /// Whether a surface exists to draw on
    pub fn is_visible(&self) -> bool {
        self.surface.is_visible()
    }

    /// Whether rendering goes directly to the window
    pub fn is_foreground(&self) -> bool {
        self.surface.is_foreground()
    }

    /// Surface state machine
    pub fn surface(&self) -> &SurfaceManager {
        &self.surface
    }

    /// Graphics context, `None` only during teardown
    pub fn context(&self) -> Option<&GraphicsContext> {
        self.context.as_ref()
    }

    /// Device rendering into this window's context
    pub fn graphics_device(&self) -> Option<Rc<dyn GraphicsDevice>> {
        self.native.graphics_device()
    }

    /// Native window
    pub fn native(&self) -> &N {
        &self.native
    }

    /// Mutable native window
    pub fn native_mut(&mut self) -> &mut N {
        &mut self.native
    }

    /// Make this window's context current
    pub fn use_context(&mut self) {
        if let Err(error) = self.surface.make_current(&mut self.native) {
            log::error!("Failed to bind context of {}: {error}", self.id);
        }
    }

    /// Unbind this window's context
    pub fn disable_context(&mut self) {
        self.surface.release_current(&mut self.native);
    }

    /// Present the rendered frame
    pub fn swap_buffers(&mut self) {
        self.surface.swap(&mut self.native);
    }

    /// Pixel coordinates as fractions of the window size
    pub fn ratio_from_pixels(&self, pixels: (i32, i32)) -> (f32, f32) {
        let (width, height) = self.size();
        (pixels.0 as f32 / width as f32, pixels.1 as f32 / height as f32)
    }

    /// Call `callback` once per frame in which the window was resized
    #[must_use = "dropping the lifeline immediately unregisters the callback"]
    pub fn register_resize_handler<F>(&self, callback: F) -> Lifeline
    where
        F: FnMut(&ResizeEvent) + 'static,
    {
        self.resize_callbacks.register(callback)
    }

    /// Input state of this window
    pub fn input_manager(&self) -> &InputManager {
        &self.input
    }

    pub(crate) fn input_manager_mut(&mut self) -> &mut InputManager {
        &mut self.input
    }

    pub(crate) fn surface_mut(&mut self) -> &mut SurfaceManager {
        &mut self.surface
    }

    pub(crate) fn mark_resizing(&mut self) {
        self.resizing = true;
    }

    /// Reconcile the surface, then fire resize and input callbacks
    pub(crate) fn finish_pump(&mut self) {
        self.surface.check_moved(&self.native);
        self.surface.reconcile(&mut self.native);

        if self.resizing {
            let event = ResizeEvent {
                window: self.id,
                rect: self.surface.rect(),
            };
            self.resize_callbacks.broadcast(&event);
            self.resizing = false;
        }
        self.input.run_callbacks();
    }

    fn deinit_gl(&mut self) {
        self.surface.deinit(&mut self.native);
        if let Some(context) = self.context.take() {
            // Releasers issue GL deletes.
            if let Err(error) = self.native.make_current() {
                log::warn!("Could not bind context for teardown: {error}");
            }
            drop(context);
            self.native.destroy_context();
        }
    }
}

impl<N: NativeWindow> Drop for GameWindow<N> {
    fn drop(&mut self) {
        log::info!("Destroying {}", self.id);
        self.deinit_gl();
        self.resize_callbacks.clear();
        self.input.disable_callbacks();
    }
}

impl<N: NativeWindow> std::fmt::Debug for GameWindow<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameWindow")
            .field("id", &self.id)
            .field("surface", &self.surface)
            .field("resizing", &self.resizing)
            .field("close_requested", &self.close_requested)
            .finish_non_exhaustive()
    }
}
