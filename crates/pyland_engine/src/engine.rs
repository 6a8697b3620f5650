//! Engine facade and frame loop
//!
//! Ties one window, its map viewer, the object manager and the shader caches
//! together. A frame pumps the platform, resizes the viewer when the window
//! reported a resize, renders and presents, then reclaims shader programs
//! dropped since the last frame.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use thiserror::Error;

use crate::config::ConfigError;
use crate::core::config::EngineConfig;
use crate::foundation::callbacks::Lifeline;
use crate::foundation::time::FrameClock;
use crate::map::object_manager::ObjectManager;
use crate::map::viewer::MapViewer;
use crate::render::api::GraphicsDevice;
use crate::render::shader::{LoadError, Shader, ShaderCaches, ShaderDirectory, ShaderSourceProvider};
use crate::render::RenderError;
use crate::window::game_window::GameWindow;
use crate::window::platform::Platform;
use crate::window::registry::WindowRegistry;
use crate::window::{InitError, WindowId};

/// Main engine struct
///
/// Owns the window registry and the single game window the viewer draws
/// into.
pub struct Engine<P: Platform> {
    // Field order is drop order: map resources go before the window and
    // its context.
    viewer: MapViewer,
    objects: Arc<ObjectManager>,
    _resize_lifeline: Lifeline,
    shaders: ShaderCaches,
    registry: WindowRegistry<P>,
    window: WindowId,
    resized: Rc<Cell<bool>>,
    clock: FrameClock,
    config: EngineConfig,
}

impl<P: Platform> Engine<P> {
    /// Open the main window and set up the viewer. Shader sources come from
    /// the configured search directory.
    pub fn new(platform: P, config: EngineConfig) -> Result<Self, EngineError> {
        let provider = ShaderDirectory::from_config(&config.shaders);
        Self::with_shader_provider(platform, config, provider)
    }

    /// As [`Engine::new`], loading shader sources through `provider`
    pub fn with_shader_provider(
        platform: P,
        config: EngineConfig,
        provider: impl ShaderSourceProvider + 'static,
    ) -> Result<Self, EngineError> {
        log::info!("Initializing engine...");
        config.validate()?;

        let mut registry = WindowRegistry::new(platform, config.rendering.clone());
        let window = registry.create_window(
            &config.window.title,
            config.window.width,
            config.window.height,
            config.window.fullscreen,
        )?;

        let resized = Rc::new(Cell::new(false));
        let (viewer, objects, resize_lifeline) = {
            let game_window = registry
                .window_mut(window)
                .ok_or(EngineError::WindowLost(window))?;
            game_window.use_context();
            let device = game_window.graphics_device().ok_or(RenderError::NoDevice)?;

            let objects = Arc::new(ObjectManager::new());
            let viewer = MapViewer::new(
                Arc::clone(&objects),
                device.as_ref(),
                game_window.size(),
                config.rendering.tile_pixels,
                config.rendering.clear_color,
            );

            let flag = Rc::clone(&resized);
            let lifeline = game_window.register_resize_handler(move |_| flag.set(true));
            (viewer, objects, lifeline)
        };

        log::info!("Engine initialized");
        Ok(Self {
            viewer,
            objects,
            _resize_lifeline: resize_lifeline,
            shaders: ShaderCaches::new(provider),
            registry,
            window,
            resized,
            clock: FrameClock::new(),
            config,
        })
    }

    /// Run one frame. Returns `false` once the window asked to close.
    pub fn run_frame(&mut self) -> Result<bool, EngineError> {
        self.clock.tick();
        self.registry.update();

        let window = self
            .registry
            .window_mut(self.window)
            .ok_or(EngineError::WindowLost(self.window))?;
        if window.check_close() {
            return Ok(false);
        }

        window.use_context();
        let device = window.graphics_device().ok_or(RenderError::NoDevice)?;

        if self.resized.replace(false) {
            self.viewer.resize(device.as_ref(), window.size());
        }

        if window.is_visible() {
            self.viewer.render(device.as_ref())?;
            window.swap_buffers();
        }

        if let Some(context) = window.context() {
            let reclaimed = self.shaders.collect_garbage(context, device.as_ref());
            if reclaimed > 0 {
                log::debug!("Deleted {reclaimed} unused shader programs");
            }
        }
        Ok(true)
    }

    /// Run frames until the window asks to close
    pub fn run(&mut self) -> Result<(), EngineError> {
        log::info!("Starting main loop...");
        while self.run_frame()? {}
        log::info!(
            "Main loop finished after {} frames ({:.1} fps average)",
            self.clock.frame_count(),
            self.clock.average_fps()
        );
        Ok(())
    }

    /// Shared program `name` for the main window's context
    pub fn load_shader(&mut self, name: &str) -> Result<Arc<Shader>, EngineError> {
        let window = self
            .registry
            .window_mut(self.window)
            .ok_or(EngineError::WindowLost(self.window))?;
        window.use_context();
        let device = window.graphics_device().ok_or(RenderError::NoDevice)?;
        let context = window.context().ok_or(RenderError::NoDevice)?;
        Ok(self.shaders.get_shared_shader(context, device.as_ref(), name)?)
    }

    /// Device of the main window
    pub fn device(&self) -> Result<Rc<dyn GraphicsDevice>, EngineError> {
        let window = self.window()?;
        Ok(window.graphics_device().ok_or(RenderError::NoDevice)?)
    }

    /// The main window
    pub fn window(&self) -> Result<&GameWindow<P::Window>, EngineError> {
        self.registry
            .window(self.window)
            .ok_or(EngineError::WindowLost(self.window))
    }

    /// The main window, mutably
    pub fn window_mut(&mut self) -> Result<&mut GameWindow<P::Window>, EngineError> {
        self.registry
            .window_mut(self.window)
            .ok_or(EngineError::WindowLost(self.window))
    }

    /// Id of the main window
    pub fn window_id(&self) -> WindowId {
        self.window
    }

    /// Window registry
    pub fn registry(&self) -> &WindowRegistry<P> {
        &self.registry
    }

    /// Mutable window registry
    pub fn registry_mut(&mut self) -> &mut WindowRegistry<P> {
        &mut self.registry
    }

    /// Map viewer
    pub fn viewer(&self) -> &MapViewer {
        &self.viewer
    }

    /// Mutable map viewer
    pub fn viewer_mut(&mut self) -> &mut MapViewer {
        &mut self.viewer
    }

    /// Object manager shared with the viewer
    pub fn objects(&self) -> &Arc<ObjectManager> {
        &self.objects
    }

    /// Shader caches
    pub fn shaders(&self) -> &ShaderCaches {
        &self.shaders
    }

    /// Frame timing
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl<P: Platform> Drop for Engine<P> {
    fn drop(&mut self) {
        log::info!("Engine shutdown");
    }
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Window, context or surface construction failed
    #[error("Initialization failed: {0}")]
    Init(#[from] InitError),

    /// A shader could not be loaded
    #[error("Shader error: {0}")]
    Load(#[from] LoadError),

    /// A frame could not be rendered
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// The configuration is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The main window is no longer registered
    #[error("{0} is no longer open")]
    WindowLost(WindowId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{MockCall, MockController, MockPlatform};
    use crate::map::tile_map::{Layer, Map};
    use crate::render::shader::InlineSources;
    use crate::window::platform::WindowEvent;

    fn engine() -> (Engine<MockPlatform>, MockController) {
        let (platform, controller) = MockPlatform::new();
        let sources = InlineSources::new().with_program("tile", "v", "f");
        let engine = Engine::with_shader_provider(platform, EngineConfig::default(), sources).unwrap();
        (engine, controller)
    }

    fn with_map(engine: &mut Engine<MockPlatform>) {
        let shader = engine.load_shader("tile").unwrap();
        let mut map = Map::new("test", 8, 8);
        let mut layer = Layer::new("ground");
        layer.renderable_mut().set_shader(Some(shader));
        layer.renderable_mut().set_num_vertices_render(6);
        map.add_layer(layer);
        engine.viewer_mut().set_map(map);
    }

    #[test]
    fn test_frame_without_map_is_an_error() {
        let (mut engine, _controller) = engine();

        assert!(matches!(
            engine.run_frame(),
            Err(EngineError::Render(RenderError::NoMap))
        ));
    }

    #[test]
    fn test_frame_renders_and_swaps() {
        let (mut engine, controller) = engine();
        with_map(&mut engine);
        controller.clear_journal();

        assert!(engine.run_frame().unwrap());
        assert_eq!(controller.device().draw_calls(), vec![(0, 6)]);
        assert!(controller.journal().contains(&MockCall::Swap(controller.window_index(0))));
    }

    #[test]
    fn test_resize_reaches_viewer() {
        let (mut engine, controller) = engine();
        with_map(&mut engine);

        controller.resize_window(controller.window_index(0), 320, 160);
        engine.run_frame().unwrap();

        assert_eq!(engine.viewer().window_size(), (320, 160));
        assert!((engine.viewer().viewport().width - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_close_stops_loop() {
        let (mut engine, controller) = engine();
        with_map(&mut engine);

        controller.push_event(controller.window_index(0), WindowEvent::Close);
        engine.run().unwrap();
        assert_eq!(engine.clock().frame_count(), 1);
    }

    #[test]
    fn test_dropped_shaders_are_collected_next_frame() {
        let (mut engine, controller) = engine();
        with_map(&mut engine);
        let programs = controller.device().live_program_count();

        engine.viewer_mut().take_map();
        engine.viewer_mut().set_map(Map::new("empty", 4, 4));
        engine.run_frame().unwrap();

        assert_eq!(controller.device().live_program_count(), programs - 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let (platform, controller) = MockPlatform::new();
        let mut config = EngineConfig::default();
        config.rendering.tile_pixels = 0.0;

        assert!(matches!(Engine::new(platform, config), Err(EngineError::Config(_))));
        assert!(!controller.platform_initialized());
    }
}
