//! Window registry and the per-frame event pump
//!
//! The registry owns the platform and every live window. The first window
//! created initializes the platform; destroying the last one terminates it.
//! Windows are registered only once fully constructed, so the registry
//! always holds exactly the live windows.

use std::collections::BTreeMap;

use crate::core::config::RenderingConfig;
use crate::window::game_window::GameWindow;
use crate::window::platform::{NativeWindow, Platform, WindowEvent, WindowRequest, WindowSizing};
use crate::window::surface::SurfaceAction;
use crate::window::{InitError, WindowId};

/// All live windows of one platform
pub struct WindowRegistry<P: Platform> {
    platform: P,
    windows: BTreeMap<WindowId, GameWindow<P::Window>>,
    focused: Option<WindowId>,
    rendering: RenderingConfig,
    next_id: u32,
}

impl<P: Platform> WindowRegistry<P> {
    /// Empty registry; the platform is initialized on first window creation
    pub fn new(platform: P, rendering: RenderingConfig) -> Self {
        Self {
            platform,
            windows: BTreeMap::new(),
            focused: None,
            rendering,
            next_id: 1,
        }
    }

    /// Open a window.
    ///
    /// Zero `width` and `height` without `fullscreen` opens a maximized
    /// window. Any failure unwinds the native window and, if this would have
    /// been the only window, the platform.
    pub fn create_window(
        &mut self,
        title: &str,
        width: u32,
        height: u32,
        fullscreen: bool,
    ) -> Result<WindowId, InitError> {
        let first = self.windows.is_empty();
        if first && !self.platform.is_initialized() {
            log::info!("Initializing platform...");
            self.platform.init()?;
            log::info!("Platform initialized.");
        }

        let id = WindowId(self.next_id);
        let request = WindowRequest::new(title, WindowSizing::from_request(width, height, fullscreen));
        let created = self
            .platform
            .create_window(&request)
            .and_then(|native| GameWindow::create(id, native, &self.rendering));

        match created {
            Ok(window) => {
                self.next_id += 1;
                let (width, height) = window.size();
                log::info!("Created {id}: {width}x{height}");
                self.windows.insert(id, window);
                Ok(id)
            }
            Err(error) => {
                log::error!("Failed to create window \"{title}\": {error}");
                if first {
                    self.terminate_platform();
                }
                Err(error)
            }
        }
    }

    /// Close a window. Returns `false` if `id` is not registered.
    pub fn destroy_window(&mut self, id: WindowId) -> bool {
        let Some(window) = self.windows.remove(&id) else {
            log::warn!("Attempted to destroy unknown {id}");
            return false;
        };
        drop(window);

        if self.focused == Some(id) {
            self.focused = None;
        }
        if self.windows.is_empty() {
            self.terminate_platform();
        }
        true
    }

    /// Window by id
    pub fn window(&self, id: WindowId) -> Option<&GameWindow<P::Window>> {
        self.windows.get(&id)
    }

    /// Mutable window by id
    pub fn window_mut(&mut self, id: WindowId) -> Option<&mut GameWindow<P::Window>> {
        self.windows.get_mut(&id)
    }

    /// Ids of all live windows, ascending
    pub fn ids(&self) -> Vec<WindowId> {
        self.windows.keys().copied().collect()
    }

    /// Number of live windows
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether no window is open
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// The window holding focus
    pub fn focused(&self) -> Option<WindowId> {
        self.focused
    }

    /// Platform
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Mutable platform
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Run one pump cycle.
    ///
    /// Input managers are cleaned, platform events are drained and applied
    /// to window flags, and only then does each window reconcile its surface
    /// and fire its resize and input callbacks. A platform quit request
    /// marks every window close-requested.
    pub fn update(&mut self) {
        for window in self.windows.values_mut() {
            window.input_manager_mut().clean();
        }

        let quit = self.platform.pump_events();

        for id in self.ids() {
            let events = match self.windows.get_mut(&id) {
                Some(window) => window.native_mut().drain_events(),
                None => continue,
            };
            for event in events {
                self.dispatch(id, event);
            }
        }

        for window in self.windows.values_mut() {
            window.finish_pump();
            if quit {
                window.request_close();
            }
        }
    }

    fn dispatch(&mut self, source: WindowId, event: WindowEvent) {
        if let WindowEvent::Key { key, pressed } = event {
            let target = self
                .focused
                .filter(|id| self.windows.contains_key(id))
                .unwrap_or(source);
            if let Some(window) = self.windows.get_mut(&target) {
                window.input_manager_mut().handle_event(key, pressed);
            }
            return;
        }

        let Some(window) = self.windows.get_mut(&source) else {
            return;
        };

        match event {
            WindowEvent::Close => window.request_close(),
            WindowEvent::Resized { .. } | WindowEvent::Maximized | WindowEvent::Restored => {
                log::info!("Need surface reinit (resize)");
                window.mark_resizing();
                window.surface_mut().schedule(SurfaceAction::DoInit);
                self.focused = Some(source);
            }
            WindowEvent::Moved { .. } => {
                log::info!("Need surface reinit (moved)");
                window.surface_mut().schedule(SurfaceAction::DoInit);
                self.focused = Some(source);
            }
            WindowEvent::Shown | WindowEvent::FocusGained => {
                log::info!("Need surface reinit (gained focus)");
                window.surface_mut().set_foreground(true);
                window.surface_mut().schedule(SurfaceAction::DoInit);
                self.focused = Some(source);
            }
            WindowEvent::FocusLost | WindowEvent::Minimized | WindowEvent::Hidden => {
                log::info!("Need surface reinit (lost focus)");
                window.surface_mut().set_foreground(false);
                window.surface_mut().schedule(SurfaceAction::DoInit);
                if self.focused == Some(source) {
                    self.focused = None;
                }
            }
            WindowEvent::Key { .. } => {}
            WindowEvent::Other => log::warn!("Unhandled WM event."),
        }
    }

    fn terminate_platform(&mut self) {
        if self.platform.is_initialized() {
            log::info!("Deinitializing platform...");
            self.platform.terminate();
            log::info!("Platform deinitialized.");
        }
    }
}

impl<P: Platform> Drop for WindowRegistry<P> {
    fn drop(&mut self) {
        for id in self.ids() {
            self.destroy_window(id);
        }
    }
}
