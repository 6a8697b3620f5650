//! Per-window graphics surface state machine
//!
//! A window has at most one valid surface. Events never rebuild it directly:
//! they schedule a [`SurfaceAction`] which [`SurfaceManager::reconcile`]
//! applies once per pump cycle, after the whole event batch was drained.
//! Re-initialization always tears the old surface down first.
//!
//! Foreground surfaces are presented by swapping. Background surfaces render
//! offscreen; presenting reads the pixels back, flips them vertically (GL
//! rows run bottom-up, window rows top-down) with alpha forced opaque, and
//! hands them to the window.

use crate::core::config::RenderingConfig;
use crate::window::platform::{SurfaceBackend, SurfaceRect};
use crate::window::InitError;

/// Whether a surface currently exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    /// No surface; nothing can be drawn
    NotInitialized,
    /// Surface created and bound
    Visible,
}

/// Work scheduled for the next reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceAction {
    /// Keep the current surface
    DoNothing,
    /// Rebuild the surface from the window's current geometry
    DoInit,
    /// Release the surface
    DoDeinit,
}

/// Where rendering goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceMode {
    /// Straight to the window, double buffered
    Foreground,
    /// Offscreen buffer copied into the window on swap
    Background,
}

/// CPU-side copy of a background surface
#[derive(Debug)]
struct BlitBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    flipped: Vec<u8>,
}

impl BlitBuffer {
    fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 4;
        Self {
            width,
            height,
            pixels: vec![0; len],
            flipped: vec![0; len],
        }
    }

    /// Copy `pixels` into `flipped` bottom row first, alpha ignored
    fn flip_rows(&mut self) {
        let stride = self.width as usize * 4;
        if stride == 0 {
            return;
        }
        let rows = self.pixels.chunks_exact(stride).rev();
        for (dst, src) in self.flipped.chunks_exact_mut(stride).zip(rows) {
            dst.copy_from_slice(src);
            for alpha in dst.iter_mut().skip(3).step_by(4) {
                *alpha = 0xff;
            }
        }
    }
}

/// Surface lifecycle of one window
#[derive(Debug)]
pub struct SurfaceManager {
    state: SurfaceState,
    mode: SurfaceMode,
    active_mode: SurfaceMode,
    pending: SurfaceAction,
    rect: SurfaceRect,
    overscan: (i32, i32),
    force_background: bool,
    blit: Option<BlitBuffer>,
}

impl SurfaceManager {
    /// Manager with no surface yet
    pub fn new(rendering: &RenderingConfig) -> Self {
        let mode = if rendering.force_background_rendering {
            SurfaceMode::Background
        } else {
            SurfaceMode::Foreground
        };
        Self {
            state: SurfaceState::NotInitialized,
            mode,
            active_mode: mode,
            pending: SurfaceAction::DoNothing,
            rect: SurfaceRect::default(),
            overscan: rendering.overscan(),
            force_background: rendering.force_background_rendering,
            blit: None,
        }
    }

    /// Current state
    pub fn state(&self) -> SurfaceState {
        self.state
    }

    /// Whether a surface exists
    pub fn is_visible(&self) -> bool {
        self.state == SurfaceState::Visible
    }

    /// Mode the next surface will be built in
    pub fn mode(&self) -> SurfaceMode {
        self.mode
    }

    /// Whether the next surface renders directly to the window
    pub fn is_foreground(&self) -> bool {
        self.mode == SurfaceMode::Foreground
    }

    /// Scheduled action
    pub fn pending_action(&self) -> SurfaceAction {
        self.pending
    }

    /// Geometry recorded by the last successful init
    pub fn rect(&self) -> SurfaceRect {
        self.rect
    }

    /// Switch between direct and background rendering for the next init.
    /// Forced background rendering always wins.
    pub fn set_foreground(&mut self, foreground: bool) {
        self.mode = if foreground && !self.force_background {
            SurfaceMode::Foreground
        } else {
            SurfaceMode::Background
        };
    }

    /// Schedule `action` for the next reconciliation
    pub fn schedule(&mut self, action: SurfaceAction) {
        self.pending = action;
    }

    /// Build a surface from the backend's current drawable area
    pub fn init<B: SurfaceBackend + ?Sized>(&mut self, backend: &mut B) -> Result<(), InitError> {
        let rect = backend.drawable_rect();
        self.init_with_rect(backend, rect)
    }

    /// Build a surface covering `rect`.
    ///
    /// The previous surface is always released first. On failure the manager
    /// is left not visible with `DoInit` still pending.
    pub fn init_with_rect<B: SurfaceBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        rect: SurfaceRect,
    ) -> Result<(), InitError> {
        self.deinit(backend);
        self.pending = SurfaceAction::DoInit;

        let mode = self.mode;
        let target = match mode {
            SurfaceMode::Foreground => {
                log::info!("Initializing window surface.");
                rect.offset(self.overscan.0, self.overscan.1)
            }
            SurfaceMode::Background => rect,
        };
        match mode {
            SurfaceMode::Foreground => log::info!(
                "New surface: {}x{} at ({},{}).",
                rect.width,
                rect.height,
                rect.x,
                rect.y
            ),
            SurfaceMode::Background => {
                log::info!("New surface: {}x{} (Pixel Buffer).", rect.width, rect.height);
            }
        }

        backend.create_surface(mode, target)?;
        if let Err(error) = backend.make_current() {
            backend.destroy_surface(mode);
            return Err(error);
        }

        self.blit = match mode {
            SurfaceMode::Background => Some(BlitBuffer::new(rect.width, rect.height)),
            SurfaceMode::Foreground => None,
        };
        self.active_mode = mode;
        self.state = SurfaceState::Visible;
        self.pending = SurfaceAction::DoNothing;
        self.rect = rect;
        Ok(())
    }

    /// Release the surface and any CPU blit buffer.
    ///
    /// The surface is destroyed while the context is still bound; the context
    /// is released afterwards.
    pub fn deinit<B: SurfaceBackend + ?Sized>(&mut self, backend: &mut B) {
        if self.is_visible() {
            backend.destroy_surface(self.active_mode);
            backend.release_current();
        }
        self.blit = None;
        self.state = SurfaceState::NotInitialized;
        self.pending = SurfaceAction::DoNothing;
    }

    /// Schedule a rebuild if the drawable moved since the last init
    pub fn check_moved<B: SurfaceBackend + ?Sized>(&mut self, backend: &B) {
        if !self.is_visible() {
            return;
        }
        let current = backend.drawable_rect();
        if current.x != self.rect.x || current.y != self.rect.y {
            log::info!("Need surface reinit (moved).");
            self.pending = SurfaceAction::DoInit;
        }
    }

    /// Apply the scheduled action. Failures are logged, not returned.
    pub fn reconcile<B: SurfaceBackend + ?Sized>(&mut self, backend: &mut B) {
        match self.pending {
            SurfaceAction::DoInit => {
                if let Err(error) = self.init(backend) {
                    log::warn!("Surface reinit failed: {error}");
                }
            }
            SurfaceAction::DoDeinit => self.deinit(backend),
            SurfaceAction::DoNothing => {}
        }
    }

    /// Bind the context to the surface, if there is one
    pub fn make_current<B: SurfaceBackend + ?Sized>(&mut self, backend: &mut B) -> Result<(), InitError> {
        if self.is_visible() {
            backend.make_current()
        } else {
            Ok(())
        }
    }

    /// Unbind the context, if a surface is bound
    pub fn release_current<B: SurfaceBackend + ?Sized>(&mut self, backend: &mut B) {
        if self.is_visible() {
            backend.release_current();
        }
    }

    /// Present the frame
    pub fn swap<B: SurfaceBackend + ?Sized>(&mut self, backend: &mut B) {
        if !self.is_visible() {
            return;
        }
        match self.active_mode {
            SurfaceMode::Foreground => backend.swap(),
            SurfaceMode::Background => {
                if let Some(blit) = self.blit.as_mut() {
                    backend.read_pixels(blit.width, blit.height, &mut blit.pixels);
                    blit.flip_rows();
                    backend.present_pixels(blit.width, blit.height, &blit.flipped);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{MockCall, MockController, MockPlatform, MockWindow};
    use crate::window::platform::{Platform, WindowSizing, WindowRequest};

    fn open(width: u32, height: u32) -> (MockPlatform, MockController, MockWindow) {
        let (mut platform, controller) = MockPlatform::new();
        platform.init().unwrap();
        let window = platform
            .create_window(&WindowRequest::new("surface", WindowSizing::Fixed { width, height }))
            .unwrap();
        controller.clear_journal();
        (platform, controller, window)
    }

    #[test]
    fn test_init_deinitializes_first() {
        let (_platform, controller, mut window) = open(64, 32);
        let mut surface = SurfaceManager::new(&RenderingConfig::default());

        surface.init(&mut window).unwrap();
        surface.init(&mut window).unwrap();

        let journal = controller.journal();
        let creates: Vec<usize> = journal
            .iter()
            .enumerate()
            .filter(|(_, call)| matches!(call, MockCall::CreateSurface { .. }))
            .map(|(index, _)| index)
            .collect();
        let destroy = journal
            .iter()
            .position(|call| matches!(call, MockCall::DestroySurface { .. }))
            .unwrap();

        assert_eq!(creates.len(), 2);
        assert!(creates[0] < destroy && destroy < creates[1]);
        assert!(surface.is_visible());
        assert_eq!(surface.pending_action(), SurfaceAction::DoNothing);
    }

    #[test]
    fn test_foreground_surface_applies_overscan() {
        let (_platform, controller, mut window) = open(64, 32);
        let rendering = RenderingConfig {
            static_overscan: true,
            ..RenderingConfig::default()
        };
        let mut surface = SurfaceManager::new(&rendering);

        surface.init(&mut window).unwrap();

        assert!(controller.journal().contains(&MockCall::CreateSurface {
            window: window.index(),
            mode: SurfaceMode::Foreground,
            rect: SurfaceRect::new(24, 16, 64, 32),
        }));
        assert_eq!(surface.rect(), SurfaceRect::new(0, 0, 64, 32));
    }

    #[test]
    fn test_background_swap_flips_rows_and_forces_alpha() {
        let (_platform, controller, mut window) = open(2, 3);
        let mut surface = SurfaceManager::new(&RenderingConfig::default());
        surface.set_foreground(false);
        surface.init(&mut window).unwrap();

        surface.swap(&mut window);

        let presented = controller.last_presented();
        assert_eq!(presented.len(), 2 * 3 * 4);
        // Mock rows are filled with their row index, alpha zero.
        assert_eq!(&presented[0..8], &[2, 2, 2, 0xff, 2, 2, 2, 0xff]);
        assert_eq!(&presented[16..24], &[0, 0, 0, 0xff, 0, 0, 0, 0xff]);
        assert!(!controller
            .journal()
            .iter()
            .any(|call| matches!(call, MockCall::Swap(_))));
    }

    #[test]
    fn test_forced_background_ignores_foreground_requests() {
        let rendering = RenderingConfig {
            force_background_rendering: true,
            ..RenderingConfig::default()
        };
        let mut surface = SurfaceManager::new(&rendering);

        surface.set_foreground(true);
        assert_eq!(surface.mode(), SurfaceMode::Background);
    }

    #[test]
    fn test_failed_bind_leaves_surface_down_and_pending() {
        let (_platform, controller, mut window) = open(64, 32);
        let mut surface = SurfaceManager::new(&RenderingConfig::default());
        controller.fail_make_current(true);

        surface.schedule(SurfaceAction::DoInit);
        surface.reconcile(&mut window);

        assert_eq!(surface.state(), SurfaceState::NotInitialized);
        assert_eq!(surface.pending_action(), SurfaceAction::DoInit);
        assert!(controller.journal().iter().any(|call| matches!(call, MockCall::DestroySurface { .. })));

        controller.fail_make_current(false);
        surface.reconcile(&mut window);
        assert!(surface.is_visible());
    }

    #[test]
    fn test_background_surface_destroyed_before_context_release() {
        let (_platform, controller, mut window) = open(64, 32);
        let mut surface = SurfaceManager::new(&RenderingConfig::default());
        surface.set_foreground(false);
        surface.init(&mut window).unwrap();
        controller.clear_journal();

        surface.set_foreground(true);
        surface.init(&mut window).unwrap();

        let index = window.index();
        let journal = controller.journal();
        assert_eq!(
            &journal[..2],
            &[
                MockCall::DestroySurface {
                    window: index,
                    mode: SurfaceMode::Background
                },
                MockCall::ReleaseCurrent(index),
            ]
        );
        assert!(matches!(
            journal[2],
            MockCall::CreateSurface {
                mode: SurfaceMode::Foreground,
                ..
            }
        ));
    }

    #[test]
    fn test_deinit_action_releases_surface() {
        let (_platform, _controller, mut window) = open(64, 32);
        let mut surface = SurfaceManager::new(&RenderingConfig::default());
        surface.init(&mut window).unwrap();

        surface.schedule(SurfaceAction::DoDeinit);
        surface.reconcile(&mut window);

        assert_eq!(surface.state(), SurfaceState::NotInitialized);
        assert_eq!(surface.pending_action(), SurfaceAction::DoNothing);
    }

    #[test]
    fn test_moved_drawable_schedules_reinit() {
        let (_platform, controller, mut window) = open(64, 32);
        let mut surface = SurfaceManager::new(&RenderingConfig::default());
        surface.init(&mut window).unwrap();

        surface.check_moved(&window);
        assert_eq!(surface.pending_action(), SurfaceAction::DoNothing);

        controller.move_window(window.index(), 5, 7);
        surface.check_moved(&window);
        assert_eq!(surface.pending_action(), SurfaceAction::DoInit);

        surface.reconcile(&mut window);
        assert_eq!(surface.rect(), SurfaceRect::new(5, 7, 64, 32));
    }

    #[test]
    fn test_swap_without_surface_is_noop() {
        let (_platform, controller, mut window) = open(64, 32);
        let mut surface = SurfaceManager::new(&RenderingConfig::default());

        surface.swap(&mut window);
        assert!(controller.journal().is_empty());
    }
}
