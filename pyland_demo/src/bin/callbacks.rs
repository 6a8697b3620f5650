//! Keyboard callback demo
//!
//! Opens a window that cycles its clear colour. Every key press prints a
//! dot until Escape unregisters the handler; Shift+Escape quits.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use pyland_engine::core::config::RenderingConfig;
use pyland_engine::prelude::*;
use pyland_engine::render::ClearFlags;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Startup...");

    let mut windows = WindowRegistry::new(GlfwPlatform::new(), RenderingConfig::default());
    let id = windows.create_window("Pyland callbacks", 640, 400, false)?;

    let lifeline: Rc<RefCell<Option<Lifeline>>> = Rc::new(RefCell::new(None));
    {
        let window = windows.window_mut(id).ok_or("window vanished")?;
        window.use_context();

        let handle = Rc::clone(&lifeline);
        let registered = window.input_manager().register_keyboard_handler(move |event| {
            if event.key == KeyCode::Escape {
                handle.borrow_mut().take();
                log::info!("Keyboard handler unregistered");
            } else if event.pressed {
                print!(".");
                // Progress dots only; a failed flush is not worth stopping for.
                let _ = std::io::stdout().flush();
            }
        });
        *lifeline.borrow_mut() = Some(registered);
    }

    let (mut r, mut g, mut b) = (0.0_f32, 0.0_f32, 0.0_f32);
    loop {
        let window = windows.window_mut(id).ok_or("window vanished")?;
        if window.check_close() {
            break;
        }

        r = step(r, 0.001);
        g = step(g, 0.01);
        b = step(b, 0.1);

        window.use_context();
        if let Some(device) = window.graphics_device() {
            device.set_clear_color([r, g, b, 0.8]);
            device.clear(ClearFlags::COLOR);
        }
        window.swap_buffers();

        windows.update();

        let window = windows.window(id).ok_or("window vanished")?;
        let input = window.input_manager();
        if input.is_key_down(KeyCode::Escape) && input.is_key_down(KeyCode::LeftShift) {
            log::info!("Shift+Escape pressed!");
            break;
        }
    }

    lifeline.borrow_mut().take();
    log::info!("Terminate");
    Ok(())
}

fn step(value: f32, amount: f32) -> f32 {
    let next = value + amount;
    if next >= 1.0 {
        0.0
    } else {
        next
    }
}
