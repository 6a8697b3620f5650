//! GLFW platform with OpenGL contexts
//!
//! Foreground surfaces are the window's default framebuffer. Background
//! surfaces render into an offscreen framebuffer; presenting uploads the
//! read-back pixels into a texture and blits it to the window.

use std::any::Any;
use std::rc::Rc;

use glfw::Context as _;
use glow::{HasContext, PixelPackData, PixelUnpackData};

use crate::input::KeyCode;
use crate::render::api::GraphicsDevice;
use crate::render::backends::gl::GlowDevice;
use crate::window::platform::{
    NativeWindow, Platform, SurfaceBackend, SurfaceRect, WindowEvent, WindowSizing, WindowRequest,
};
use crate::window::surface::SurfaceMode;
use crate::window::InitError;

/// Size used for maximized windows when the monitor cannot be queried
const FALLBACK_SIZE: (u32, u32) = (640, 480);

/// The GLFW library
#[derive(Default)]
pub struct GlfwPlatform {
    glfw: Option<glfw::Glfw>,
}

impl GlfwPlatform {
    /// Platform not yet initialized
    pub fn new() -> Self {
        Self::default()
    }

    fn primary_monitor_size(glfw: &mut glfw::Glfw) -> (u32, u32) {
        glfw.with_primary_monitor(|_, monitor| {
            monitor
                .and_then(|monitor| monitor.get_video_mode())
                .map_or(FALLBACK_SIZE, |mode| (mode.width, mode.height))
        })
    }
}

impl Platform for GlfwPlatform {
    type Window = GlfwWindow;

    fn init(&mut self) -> Result<(), InitError> {
        if self.glfw.is_some() {
            return Ok(());
        }
        let glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|error| InitError::PlatformInit(format!("{error:?}")))?;
        self.glfw = Some(glfw);
        Ok(())
    }

    fn terminate(&mut self) {
        if self.glfw.take().is_some() {
            log::info!("GLFW released");
        }
    }

    fn is_initialized(&self) -> bool {
        self.glfw.is_some()
    }

    fn create_window(&mut self, request: &WindowRequest) -> Result<GlfwWindow, InitError> {
        let glfw = self.glfw.as_mut().ok_or(InitError::PlatformNotInitialized)?;

        glfw.default_window_hints();
        glfw.window_hint(glfw::WindowHint::ContextVersion(3, 0));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let title = request.title.as_str();
        let (width, height) = request.sizing.resolve(Self::primary_monitor_size(glfw));
        let created = match request.sizing {
            WindowSizing::Fixed { .. } => glfw.create_window(width, height, title, glfw::WindowMode::Windowed),
            WindowSizing::Maximized => {
                glfw.window_hint(glfw::WindowHint::Maximized(true));
                glfw.create_window(width, height, title, glfw::WindowMode::Windowed)
            }
            WindowSizing::Fullscreen { .. } => glfw.with_primary_monitor(|glfw, monitor| {
                let mode = monitor.map_or(glfw::WindowMode::Windowed, |monitor| glfw::WindowMode::FullScreen(monitor));
                glfw.create_window(width, height, title, mode)
            }),
        };
        let (mut window, events) =
            created.ok_or_else(|| InitError::WindowCreation(format!("GLFW refused \"{title}\"")))?;

        window.set_pos_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_focus_polling(true);
        window.set_iconify_polling(true);
        window.set_maximize_polling(true);
        window.set_close_polling(true);
        window.set_key_polling(true);

        Ok(GlfwWindow {
            window,
            events,
            gl: None,
            device: None,
            offscreen: None,
        })
    }

    fn pump_events(&mut self) -> bool {
        if let Some(glfw) = self.glfw.as_mut() {
            glfw.poll_events();
        }
        false
    }
}

/// Offscreen render target plus the texture used to present it
struct Offscreen {
    framebuffer: glow::Framebuffer,
    color: glow::Renderbuffer,
    depth: glow::Renderbuffer,
    present_framebuffer: glow::Framebuffer,
    present_texture: glow::Texture,
    width: i32,
    height: i32,
}

impl Offscreen {
    fn new(gl: &glow::Context, width: u32, height: u32) -> Result<Self, String> {
        let (width, height) = (width as i32, height as i32);
        unsafe {
            let framebuffer = gl.create_framebuffer()?;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));

            let color = gl.create_renderbuffer()?;
            gl.bind_renderbuffer(glow::RENDERBUFFER, Some(color));
            gl.renderbuffer_storage(glow::RENDERBUFFER, glow::RGBA8, width, height);
            gl.framebuffer_renderbuffer(glow::FRAMEBUFFER, glow::COLOR_ATTACHMENT0, glow::RENDERBUFFER, Some(color));

            let depth = gl.create_renderbuffer()?;
            gl.bind_renderbuffer(glow::RENDERBUFFER, Some(depth));
            gl.renderbuffer_storage(glow::RENDERBUFFER, glow::DEPTH_COMPONENT16, width, height);
            gl.framebuffer_renderbuffer(glow::FRAMEBUFFER, glow::DEPTH_ATTACHMENT, glow::RENDERBUFFER, Some(depth));
            gl.bind_renderbuffer(glow::RENDERBUFFER, None);

            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);

            let present_texture = gl.create_texture()?;
            gl.bind_texture(glow::TEXTURE_2D, Some(present_texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width,
                height,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(None),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);

            let present_framebuffer = gl.create_framebuffer()?;
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(present_framebuffer));
            gl.framebuffer_texture_2d(
                glow::READ_FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(present_texture),
                0,
            );

            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));

            let offscreen = Self {
                framebuffer,
                color,
                depth,
                present_framebuffer,
                present_texture,
                width,
                height,
            };
            if status != glow::FRAMEBUFFER_COMPLETE {
                offscreen.delete(gl);
                return Err(format!("offscreen framebuffer incomplete: 0x{status:x}"));
            }
            Ok(offscreen)
        }
    }

    fn bind(&self, gl: &glow::Context) {
        unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.framebuffer)) };
    }

    fn delete(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.delete_framebuffer(self.present_framebuffer);
            gl.delete_texture(self.present_texture);
            gl.delete_framebuffer(self.framebuffer);
            gl.delete_renderbuffer(self.depth);
            gl.delete_renderbuffer(self.color);
        }
    }
}

/// A GLFW window with its OpenGL context
pub struct GlfwWindow {
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    gl: Option<Rc<glow::Context>>,
    device: Option<Rc<GlowDevice>>,
    offscreen: Option<Offscreen>,
}

impl GlfwWindow {
    /// Underlying GLFW window
    pub fn glfw_window(&self) -> &glfw::PWindow {
        &self.window
    }

    /// Underlying GLFW window, mutably
    pub fn glfw_window_mut(&mut self) -> &mut glfw::PWindow {
        &mut self.window
    }

    fn context_error() -> InitError {
        InitError::Context("no OpenGL context".to_string())
    }

    fn drop_offscreen(&mut self) {
        if let (Some(offscreen), Some(gl)) = (self.offscreen.take(), self.gl.as_ref()) {
            offscreen.delete(gl);
        }
    }
}

impl SurfaceBackend for GlfwWindow {
    fn create_context(&mut self) -> Result<(), InitError> {
        self.window.make_current();
        let window = &mut self.window;
        let gl = unsafe { glow::Context::from_loader_function(|name| window.get_proc_address(name) as *const _) };
        let gl = Rc::new(gl);
        self.device = Some(Rc::new(GlowDevice::new(Rc::clone(&gl))));
        self.gl = Some(gl);
        Ok(())
    }

    fn destroy_context(&mut self) {
        self.window.make_current();
        self.drop_offscreen();
        self.device = None;
        self.gl = None;
        glfw::make_context_current(None);
    }

    fn create_surface(&mut self, mode: SurfaceMode, rect: SurfaceRect) -> Result<(), InitError> {
        match mode {
            SurfaceMode::Foreground => {
                // The default framebuffer always covers the client area.
                log::debug!("Foreground surface at ({}, {})", rect.x, rect.y);
                Ok(())
            }
            SurfaceMode::Background => {
                self.window.make_current();
                let gl = self.gl.as_ref().ok_or_else(Self::context_error)?;
                let offscreen = Offscreen::new(gl, rect.width, rect.height).map_err(InitError::Surface)?;
                self.offscreen = Some(offscreen);
                Ok(())
            }
        }
    }

    fn destroy_surface(&mut self, mode: SurfaceMode) {
        if mode == SurfaceMode::Background {
            self.window.make_current();
            self.drop_offscreen();
        }
    }

    fn make_current(&mut self) -> Result<(), InitError> {
        self.window.make_current();
        let gl = self.gl.as_ref().ok_or_else(Self::context_error)?;
        match &self.offscreen {
            Some(offscreen) => offscreen.bind(gl),
            None => unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, None) },
        }
        Ok(())
    }

    fn release_current(&mut self) {
        glfw::make_context_current(None);
    }

    fn swap(&mut self) {
        self.window.swap_buffers();
    }

    fn read_pixels(&mut self, width: u32, height: u32, out: &mut [u8]) {
        let (Some(gl), Some(offscreen)) = (self.gl.as_ref(), self.offscreen.as_ref()) else {
            return;
        };
        unsafe {
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(offscreen.framebuffer));
            gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            gl.read_pixels(
                0,
                0,
                width as i32,
                height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelPackData::Slice(Some(out)),
            );
        }
    }

    fn present_pixels(&mut self, width: u32, height: u32, pixels: &[u8]) {
        let (Some(gl), Some(offscreen)) = (self.gl.as_ref(), self.offscreen.as_ref()) else {
            return;
        };
        let (width, height) = (
            (width as i32).min(offscreen.width),
            (height as i32).min(offscreen.height),
        );
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(offscreen.present_texture));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                width,
                height,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(pixels)),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);

            // Rows arrive top first; flip while blitting.
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(offscreen.present_framebuffer));
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
            gl.blit_framebuffer(
                0,
                0,
                width,
                height,
                0,
                height,
                width,
                0,
                glow::COLOR_BUFFER_BIT,
                glow::NEAREST,
            );
        }
        self.window.swap_buffers();
        offscreen.bind(gl);
    }

    fn drawable_rect(&self) -> SurfaceRect {
        let (x, y) = self.window.get_pos();
        let (width, height) = self.window.get_framebuffer_size();
        SurfaceRect::new(x, y, width.max(0) as u32, height.max(0) as u32)
    }
}

impl NativeWindow for GlfwWindow {
    fn drain_events(&mut self) -> Vec<WindowEvent> {
        glfw::flush_messages(&self.events)
            .map(|(_, event)| convert_event(event))
            .collect()
    }

    fn graphics_device(&self) -> Option<Rc<dyn GraphicsDevice>> {
        self.device.clone().map(|device| device as Rc<dyn GraphicsDevice>)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for GlfwWindow {
    fn drop(&mut self) {
        self.destroy_context();
    }
}

fn convert_event(event: glfw::WindowEvent) -> WindowEvent {
    match event {
        glfw::WindowEvent::Close => WindowEvent::Close,
        glfw::WindowEvent::FramebufferSize(width, height) => WindowEvent::Resized {
            width: width.max(0) as u32,
            height: height.max(0) as u32,
        },
        glfw::WindowEvent::Pos(x, y) => WindowEvent::Moved { x, y },
        glfw::WindowEvent::Focus(true) => WindowEvent::FocusGained,
        glfw::WindowEvent::Focus(false) => WindowEvent::FocusLost,
        glfw::WindowEvent::Iconify(true) => WindowEvent::Minimized,
        glfw::WindowEvent::Iconify(false) | glfw::WindowEvent::Maximize(false) => WindowEvent::Restored,
        glfw::WindowEvent::Maximize(true) => WindowEvent::Maximized,
        glfw::WindowEvent::Key(key, _, glfw::Action::Press, _) => WindowEvent::Key {
            key: convert_key(key),
            pressed: true,
        },
        glfw::WindowEvent::Key(key, _, glfw::Action::Release, _) => WindowEvent::Key {
            key: convert_key(key),
            pressed: false,
        },
        _ => WindowEvent::Other,
    }
}

fn convert_key(key: glfw::Key) -> KeyCode {
    use glfw::Key;
    match key {
        Key::A => KeyCode::A,
        Key::B => KeyCode::B,
        Key::C => KeyCode::C,
        Key::D => KeyCode::D,
        Key::E => KeyCode::E,
        Key::F => KeyCode::F,
        Key::G => KeyCode::G,
        Key::H => KeyCode::H,
        Key::I => KeyCode::I,
        Key::J => KeyCode::J,
        Key::K => KeyCode::K,
        Key::L => KeyCode::L,
        Key::M => KeyCode::M,
        Key::N => KeyCode::N,
        Key::O => KeyCode::O,
        Key::P => KeyCode::P,
        Key::Q => KeyCode::Q,
        Key::R => KeyCode::R,
        Key::S => KeyCode::S,
        Key::T => KeyCode::T,
        Key::U => KeyCode::U,
        Key::V => KeyCode::V,
        Key::W => KeyCode::W,
        Key::X => KeyCode::X,
        Key::Y => KeyCode::Y,
        Key::Z => KeyCode::Z,
        Key::Space => KeyCode::Space,
        Key::Enter => KeyCode::Enter,
        Key::Escape => KeyCode::Escape,
        Key::Left => KeyCode::Left,
        Key::Right => KeyCode::Right,
        Key::Up => KeyCode::Up,
        Key::Down => KeyCode::Down,
        Key::LeftShift => KeyCode::LeftShift,
        Key::RightShift => KeyCode::RightShift,
        _ => KeyCode::Unknown,
    }
}
