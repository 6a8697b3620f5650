//! Full frames through the headless platform

use pyland_engine::headless::{MockCall, MockController, MockPlatform};
use pyland_engine::prelude::*;
use pyland_engine::render::shader::InlineSources;
use pyland_engine::window::{SurfaceMode, SurfaceRect, WindowEvent};

fn small_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.window.width = 4;
    config.window.height = 3;
    config.rendering.tile_pixels = 1.0;
    config
}

fn start(config: EngineConfig) -> (Engine<MockPlatform>, MockController) {
    let (platform, controller) = MockPlatform::new();
    let sources = InlineSources::new().with_program("tile", "vertex", "fragment");
    let mut engine = Engine::with_shader_provider(platform, config, sources).unwrap();

    let shader = engine.load_shader("tile").unwrap();
    let mut map = Map::new("frame", 16, 16);
    let mut ground = Layer::new("ground");
    ground.renderable_mut().set_shader(Some(shader.clone()));
    ground.renderable_mut().set_num_vertices_render(6);
    map.add_layer(ground);

    let player = Sprite::spawn(engine.objects(), "player", Vec2::new(8.0, 8.0));
    player.renderable().set_shader(Some(shader));
    player.renderable().set_num_vertices_render(12);
    map.add_sprite(player.id());

    let viewer = engine.viewer_mut();
    viewer.set_map(map);
    assert!(viewer.set_map_focus_object(player.id()));

    (engine, controller)
}

#[test]
fn test_frames_draw_layers_then_sprites() {
    let (mut engine, controller) = start(small_config());
    let device = controller.device();
    device.clear_calls();

    for _ in 0..3 {
        assert!(engine.run_frame().unwrap());
    }

    assert_eq!(device.draw_calls(), vec![(0, 6), (0, 12), (0, 6), (0, 12), (0, 6), (0, 12)]);
    let swaps = controller
        .journal()
        .iter()
        .filter(|call| matches!(call, MockCall::Swap(_)))
        .count();
    assert_eq!(swaps, 3);
}

#[test]
fn test_shader_is_compiled_once_per_context() {
    let (mut engine, controller) = start(small_config());

    engine.load_shader("tile").unwrap();
    engine.run_frame().unwrap();
    engine.load_shader("tile").unwrap();

    assert_eq!(controller.device().link_count(), 1);
    assert_eq!(engine.shaders().cache_count(), 1);
}

#[test]
fn test_focus_loss_switches_to_background_presentation() {
    let (mut engine, controller) = start(small_config());
    let native = controller.window_index(0);

    controller.push_event(native, WindowEvent::FocusLost);
    controller.clear_journal();
    engine.run_frame().unwrap();

    let journal = controller.journal();
    assert!(journal.contains(&MockCall::CreateSurface {
        window: native,
        mode: SurfaceMode::Background,
        rect: SurfaceRect::new(0, 0, 4, 3),
    }));
    assert!(journal.contains(&MockCall::ReadPixels {
        window: native,
        width: 4,
        height: 3,
    }));

    // Top row first, alpha forced opaque.
    let presented = controller.last_presented();
    assert_eq!(&presented[0..4], &[2, 2, 2, 0xff]);
    assert_eq!(&presented[presented.len() - 4..], &[0, 0, 0, 0xff]);
}

#[test]
fn test_resize_updates_viewport() {
    let (mut engine, controller) = start(small_config());

    controller.resize_window(controller.window_index(0), 10, 6);
    engine.run_frame().unwrap();

    let viewport = engine.viewer().viewport();
    assert!((viewport.width - 10.0).abs() < f32::EPSILON);
    assert!((viewport.height - 6.0).abs() < f32::EPSILON);
    assert_eq!(engine.window().unwrap().size(), (10, 6));
}

#[test]
fn test_quit_request_ends_run() {
    let (mut engine, controller) = start(small_config());

    controller.request_quit();
    engine.run().unwrap();

    assert!(engine.window().unwrap().check_close());
}

#[test]
fn test_shutdown_releases_in_order() {
    let (engine, controller) = start(small_config());
    let native = controller.window_index(0);
    controller.clear_journal();

    drop(engine);

    let journal = controller.journal();
    let position = |wanted: &MockCall| journal.iter().position(|call| call == wanted);
    let surface = position(&MockCall::DestroySurface {
        window: native,
        mode: SurfaceMode::Foreground,
    })
    .unwrap();
    let context = position(&MockCall::DestroyContext(native)).unwrap();
    let window = position(&MockCall::WindowDestroyed(native)).unwrap();
    let platform = position(&MockCall::PlatformTerminate).unwrap();

    assert!(surface < context && context < window && window < platform);
    assert!(!controller.platform_initialized());
    assert_eq!(controller.live_windows(), 0);
}
