//! Headless platform and recording graphics device
//!
//! [`MockPlatform`] implements the windowing traits without a display. All
//! platform, window and surface calls are appended to a shared journal that a
//! [`MockController`] can inspect; the controller also injects failures and
//! window events. [`RecordingDevice`] implements [`GraphicsDevice`] by
//! recording every call and handing out sequential handles.
//!
//! Both are used by the engine's own tests and are public so integration
//! tests and headless tools can drive full frames.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use crate::foundation::math::Mat4;
use crate::render::api::{
    BufferHandle, ClearFlags, GraphicsDevice, ProgramHandle, ShaderHandle, ShaderStage,
    TextureHandle, VertexAttribute,
};
use crate::window::platform::{
    NativeWindow, Platform, SurfaceBackend, SurfaceRect, WindowEvent, WindowRequest,
};
use crate::window::surface::SurfaceMode;
use crate::window::InitError;

/// One journaled platform, window or surface call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// Platform initialized
    PlatformInit,
    /// Platform terminated
    PlatformTerminate,
    /// Native window opened
    WindowCreated {
        /// Native window index
        window: usize,
        /// Requested window
        request: WindowRequest,
    },
    /// Native window closed
    WindowDestroyed(usize),
    /// Context created
    CreateContext(usize),
    /// Context destroyed
    DestroyContext(usize),
    /// Surface created
    CreateSurface {
        /// Native window index
        window: usize,
        /// Surface mode
        mode: SurfaceMode,
        /// Rectangle passed to the backend
        rect: SurfaceRect,
    },
    /// Surface destroyed
    DestroySurface {
        /// Native window index
        window: usize,
        /// Surface mode
        mode: SurfaceMode,
    },
    /// Context bound
    MakeCurrent(usize),
    /// Context unbound
    ReleaseCurrent(usize),
    /// Foreground swap
    Swap(usize),
    /// Background read-back
    ReadPixels {
        /// Native window index
        window: usize,
        /// Width
        width: u32,
        /// Height
        height: u32,
    },
    /// Background presentation
    PresentPixels {
        /// Native window index
        window: usize,
        /// Width
        width: u32,
        /// Height
        height: u32,
    },
}

#[derive(Debug, Default)]
struct Failures {
    platform_init: bool,
    window: bool,
    context: bool,
    surface: bool,
    make_current: bool,
}

#[derive(Debug)]
struct MockWindowState {
    rect: SurfaceRect,
    events: VecDeque<WindowEvent>,
}

struct MockState {
    journal: Vec<MockCall>,
    initialized: bool,
    failures: Failures,
    maximized_size: (u32, u32),
    created: Vec<usize>,
    windows: HashMap<usize, MockWindowState>,
    quit: bool,
    last_presented: Vec<u8>,
    device: Rc<RecordingDevice>,
}

type SharedState = Rc<RefCell<MockState>>;

/// Windowing platform without a display
pub struct MockPlatform {
    state: SharedState,
}

impl MockPlatform {
    /// Platform plus a controller sharing its state
    pub fn new() -> (Self, MockController) {
        let state = Rc::new(RefCell::new(MockState {
            journal: Vec::new(),
            initialized: false,
            failures: Failures::default(),
            maximized_size: (1024, 768),
            created: Vec::new(),
            windows: HashMap::new(),
            quit: false,
            last_presented: Vec::new(),
            device: Rc::new(RecordingDevice::new()),
        }));
        (
            Self {
                state: Rc::clone(&state),
            },
            MockController { state },
        )
    }
}

impl Platform for MockPlatform {
    type Window = MockWindow;

    fn init(&mut self) -> Result<(), InitError> {
        let mut state = self.state.borrow_mut();
        if state.failures.platform_init {
            return Err(InitError::PlatformInit("injected failure".to_string()));
        }
        state.initialized = true;
        state.journal.push(MockCall::PlatformInit);
        Ok(())
    }

    fn terminate(&mut self) {
        let mut state = self.state.borrow_mut();
        state.initialized = false;
        state.journal.push(MockCall::PlatformTerminate);
    }

    fn is_initialized(&self) -> bool {
        self.state.borrow().initialized
    }

    fn create_window(&mut self, request: &WindowRequest) -> Result<MockWindow, InitError> {
        let mut state = self.state.borrow_mut();
        if !state.initialized {
            return Err(InitError::PlatformNotInitialized);
        }
        if state.failures.window {
            return Err(InitError::WindowCreation("injected failure".to_string()));
        }

        let (width, height) = request.sizing.resolve(state.maximized_size);
        let index = state.created.len();
        state.created.push(index);
        state.windows.insert(
            index,
            MockWindowState {
                rect: SurfaceRect::new(0, 0, width, height),
                events: VecDeque::new(),
            },
        );
        state.journal.push(MockCall::WindowCreated {
            window: index,
            request: request.clone(),
        });

        Ok(MockWindow {
            index,
            state: Rc::clone(&self.state),
        })
    }

    fn pump_events(&mut self) -> bool {
        std::mem::take(&mut self.state.borrow_mut().quit)
    }
}

/// Window created by [`MockPlatform`]
pub struct MockWindow {
    index: usize,
    state: SharedState,
}

impl MockWindow {
    /// Native index, in creation order
    pub fn index(&self) -> usize {
        self.index
    }

    fn record(&self, call: MockCall) {
        self.state.borrow_mut().journal.push(call);
    }
}

impl Drop for MockWindow {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.windows.remove(&self.index);
        state.journal.push(MockCall::WindowDestroyed(self.index));
    }
}

impl SurfaceBackend for MockWindow {
    fn create_context(&mut self) -> Result<(), InitError> {
        if self.state.borrow().failures.context {
            return Err(InitError::Context("injected failure".to_string()));
        }
        self.record(MockCall::CreateContext(self.index));
        Ok(())
    }

    fn destroy_context(&mut self) {
        self.record(MockCall::DestroyContext(self.index));
    }

    fn create_surface(&mut self, mode: SurfaceMode, rect: SurfaceRect) -> Result<(), InitError> {
        if self.state.borrow().failures.surface {
            return Err(InitError::Surface("injected failure".to_string()));
        }
        self.record(MockCall::CreateSurface {
            window: self.index,
            mode,
            rect,
        });
        Ok(())
    }

    fn destroy_surface(&mut self, mode: SurfaceMode) {
        self.record(MockCall::DestroySurface {
            window: self.index,
            mode,
        });
    }

    fn make_current(&mut self) -> Result<(), InitError> {
        if self.state.borrow().failures.make_current {
            return Err(InitError::Context("injected bind failure".to_string()));
        }
        self.record(MockCall::MakeCurrent(self.index));
        Ok(())
    }

    fn release_current(&mut self) {
        self.record(MockCall::ReleaseCurrent(self.index));
    }

    fn swap(&mut self) {
        self.record(MockCall::Swap(self.index));
    }

    /// Fills row `y` (counted from the bottom) with `y` and alpha 0
    fn read_pixels(&mut self, width: u32, height: u32, out: &mut [u8]) {
        let stride = width as usize * 4;
        if stride > 0 {
            for (row, pixels) in out.chunks_exact_mut(stride).enumerate() {
                for pixel in pixels.chunks_exact_mut(4) {
                    let value = row as u8;
                    pixel.copy_from_slice(&[value, value, value, 0]);
                }
            }
        }
        self.record(MockCall::ReadPixels {
            window: self.index,
            width,
            height,
        });
    }

    fn present_pixels(&mut self, width: u32, height: u32, pixels: &[u8]) {
        let mut state = self.state.borrow_mut();
        state.last_presented = pixels.to_vec();
        state.journal.push(MockCall::PresentPixels {
            window: self.index,
            width,
            height,
        });
    }

    fn drawable_rect(&self) -> SurfaceRect {
        self.state
            .borrow()
            .windows
            .get(&self.index)
            .map(|window| window.rect)
            .unwrap_or_default()
    }
}

impl NativeWindow for MockWindow {
    fn drain_events(&mut self) -> Vec<WindowEvent> {
        self.state
            .borrow_mut()
            .windows
            .get_mut(&self.index)
            .map(|window| window.events.drain(..).collect())
            .unwrap_or_default()
    }

    fn graphics_device(&self) -> Option<Rc<dyn GraphicsDevice>> {
        let device: Rc<dyn GraphicsDevice> = self.state.borrow().device.clone();
        Some(device)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Inspects and steers a [`MockPlatform`] and its windows
#[derive(Clone)]
pub struct MockController {
    state: SharedState,
}

impl MockController {
    /// Every call journaled so far
    pub fn journal(&self) -> Vec<MockCall> {
        self.state.borrow().journal.clone()
    }

    /// Forget the journal
    pub fn clear_journal(&self) {
        self.state.borrow_mut().journal.clear();
    }

    /// Whether the platform is initialized
    pub fn platform_initialized(&self) -> bool {
        self.state.borrow().initialized
    }

    /// Number of open native windows
    pub fn live_windows(&self) -> usize {
        self.state.borrow().windows.len()
    }

    /// Native index of the `nth` window ever created
    pub fn window_index(&self, nth: usize) -> usize {
        self.state.borrow().created.get(nth).copied().unwrap_or(usize::MAX)
    }

    /// Size reported for maximized windows
    pub fn set_maximized_size(&self, width: u32, height: u32) {
        self.state.borrow_mut().maximized_size = (width, height);
    }

    /// Fail the next platform initializations
    pub fn fail_platform_init(&self, fail: bool) {
        self.state.borrow_mut().failures.platform_init = fail;
    }

    /// Fail native window creation
    pub fn fail_window(&self, fail: bool) {
        self.state.borrow_mut().failures.window = fail;
    }

    /// Fail context creation
    pub fn fail_context(&self, fail: bool) {
        self.state.borrow_mut().failures.context = fail;
    }

    /// Fail surface creation
    pub fn fail_surface(&self, fail: bool) {
        self.state.borrow_mut().failures.surface = fail;
    }

    /// Fail binding the context
    pub fn fail_make_current(&self, fail: bool) {
        self.state.borrow_mut().failures.make_current = fail;
    }

    /// Queue an event for a window
    pub fn push_event(&self, window: usize, event: WindowEvent) {
        if let Some(window) = self.state.borrow_mut().windows.get_mut(&window) {
            window.events.push_back(event);
        }
    }

    /// Change a window's size and queue the matching resize event
    pub fn resize_window(&self, window: usize, width: u32, height: u32) {
        if let Some(state) = self.state.borrow_mut().windows.get_mut(&window) {
            state.rect.width = width;
            state.rect.height = height;
            state.events.push_back(WindowEvent::Resized { width, height });
        }
    }

    /// Move a window's drawable without queueing an event
    pub fn move_window(&self, window: usize, x: i32, y: i32) {
        if let Some(state) = self.state.borrow_mut().windows.get_mut(&window) {
            state.rect.x = x;
            state.rect.y = y;
        }
    }

    /// Make the next pump report a quit request
    pub fn request_quit(&self) {
        self.state.borrow_mut().quit = true;
    }

    /// Pixels handed to the last background presentation
    pub fn last_presented(&self) -> Vec<u8> {
        self.state.borrow().last_presented.clone()
    }

    /// Device shared by all mock windows
    pub fn device(&self) -> Rc<RecordingDevice> {
        Rc::clone(&self.state.borrow().device)
    }
}

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    /// Shader stage created
    CreateShader(ShaderStage, ShaderHandle),
    /// Shader stage deleted
    DeleteShader(ShaderHandle),
    /// Program created
    CreateProgram(ProgramHandle),
    /// Stage attached
    AttachShader(ProgramHandle, ShaderHandle),
    /// Attribute location bound
    BindAttribute {
        /// Program
        program: ProgramHandle,
        /// Location
        location: u32,
        /// Attribute name
        name: String,
    },
    /// Program linked
    LinkProgram(ProgramHandle),
    /// Program deleted
    DeleteProgram(ProgramHandle),
    /// Program made current
    UseProgram(Option<ProgramHandle>),
    /// Matrix uniform uploaded
    SetUniformMatrix {
        /// Program
        program: ProgramHandle,
        /// Uniform name
        name: String,
        /// Value
        matrix: Mat4,
    },
    /// Vertex buffer created with this many floats
    CreateVertexBuffer(BufferHandle, usize),
    /// Vertex buffer deleted
    DeleteBuffer(BufferHandle),
    /// Vertex attribute bound
    BindVertexAttribute(BufferHandle, VertexAttribute),
    /// Vertex attribute released
    UnbindVertexAttribute(VertexAttribute),
    /// Texture created
    CreateTexture(TextureHandle),
    /// Texture deleted
    DeleteTexture(TextureHandle),
    /// Texture bound or unbound
    BindTexture {
        /// Texture unit
        unit: u32,
        /// Texture
        texture: Option<TextureHandle>,
    },
    /// Triangles drawn
    DrawTriangles {
        /// First vertex
        first: i32,
        /// Vertex count
        count: i32,
    },
    /// Buffers cleared
    Clear(ClearFlags),
    /// Clear colour set
    SetClearColor([f32; 4]),
    /// Viewport and scissor set
    SetViewport {
        /// Width
        width: u32,
        /// Height
        height: u32,
    },
    /// Pipeline state configured
    ConfigurePipelineState,
}

/// [`GraphicsDevice`] that records calls instead of touching a GPU
#[derive(Debug, Default)]
pub struct RecordingDevice {
    calls: RefCell<Vec<DeviceCall>>,
    next_handle: Cell<u32>,
    links: Cell<usize>,
    fail_compile: Cell<Option<ShaderStage>>,
    fail_link: Cell<bool>,
    live_shaders: RefCell<HashSet<ShaderHandle>>,
    live_programs: RefCell<HashSet<ProgramHandle>>,
}

impl RecordingDevice {
    /// Device with an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls recorded so far
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.borrow().clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Number of program links attempted
    pub fn link_count(&self) -> usize {
        self.links.get()
    }

    /// `(first, count)` of every draw, in order
    pub fn draw_calls(&self) -> Vec<(i32, i32)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::DrawTriangles { first, count } => Some((*first, *count)),
                _ => None,
            })
            .collect()
    }

    /// Fail compiling the given stage (or nothing with `None`)
    pub fn fail_compile(&self, stage: Option<ShaderStage>) {
        self.fail_compile.set(stage);
    }

    /// Fail linking
    pub fn fail_link(&self, fail: bool) {
        self.fail_link.set(fail);
    }

    /// Shader stages created and not deleted
    pub fn live_shader_count(&self) -> usize {
        self.live_shaders.borrow().len()
    }

    /// Programs created and not deleted
    pub fn live_program_count(&self) -> usize {
        self.live_programs.borrow().len()
    }

    fn record(&self, call: DeviceCall) {
        self.calls.borrow_mut().push(call);
    }

    fn next(&self) -> u32 {
        let handle = self.next_handle.get() + 1;
        self.next_handle.set(handle);
        handle
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_shader(&self, stage: ShaderStage, _source: &str) -> Result<ShaderHandle, String> {
        if self.fail_compile.get() == Some(stage) {
            return Err(format!("injected {stage:?} compile failure"));
        }
        let shader = ShaderHandle(self.next());
        self.live_shaders.borrow_mut().insert(shader);
        self.record(DeviceCall::CreateShader(stage, shader));
        Ok(shader)
    }

    fn delete_shader(&self, shader: ShaderHandle) {
        self.live_shaders.borrow_mut().remove(&shader);
        self.record(DeviceCall::DeleteShader(shader));
    }

    fn create_program(&self) -> Result<ProgramHandle, String> {
        let program = ProgramHandle(self.next());
        self.live_programs.borrow_mut().insert(program);
        self.record(DeviceCall::CreateProgram(program));
        Ok(program)
    }

    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle) {
        self.record(DeviceCall::AttachShader(program, shader));
    }

    fn bind_attribute_location(&self, program: ProgramHandle, location: u32, name: &str) {
        self.record(DeviceCall::BindAttribute {
            program,
            location,
            name: name.to_string(),
        });
    }

    fn link_program(&self, program: ProgramHandle) -> Result<(), String> {
        self.links.set(self.links.get() + 1);
        self.record(DeviceCall::LinkProgram(program));
        if self.fail_link.get() {
            Err("injected link failure".to_string())
        } else {
            Ok(())
        }
    }

    fn delete_program(&self, program: ProgramHandle) {
        self.live_programs.borrow_mut().remove(&program);
        self.record(DeviceCall::DeleteProgram(program));
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        self.record(DeviceCall::UseProgram(program));
    }

    fn set_uniform_matrix(&self, program: ProgramHandle, name: &str, matrix: &Mat4) {
        self.record(DeviceCall::SetUniformMatrix {
            program,
            name: name.to_string(),
            matrix: *matrix,
        });
    }

    fn create_vertex_buffer(&self, data: &[f32]) -> Result<BufferHandle, String> {
        let buffer = BufferHandle(self.next());
        self.record(DeviceCall::CreateVertexBuffer(buffer, data.len()));
        Ok(buffer)
    }

    fn delete_buffer(&self, buffer: BufferHandle) {
        self.record(DeviceCall::DeleteBuffer(buffer));
    }

    fn bind_vertex_attribute(&self, buffer: BufferHandle, attribute: VertexAttribute) {
        self.record(DeviceCall::BindVertexAttribute(buffer, attribute));
    }

    fn unbind_vertex_attribute(&self, attribute: VertexAttribute) {
        self.record(DeviceCall::UnbindVertexAttribute(attribute));
    }

    fn create_texture_rgba(&self, width: u32, height: u32, pixels: &[u8]) -> Result<TextureHandle, String> {
        if pixels.len() != width as usize * height as usize * 4 {
            return Err(format!("expected {width}x{height} RGBA pixels, got {} bytes", pixels.len()));
        }
        let texture = TextureHandle(self.next());
        self.record(DeviceCall::CreateTexture(texture));
        Ok(texture)
    }

    fn delete_texture(&self, texture: TextureHandle) {
        self.record(DeviceCall::DeleteTexture(texture));
    }

    fn bind_texture(&self, unit: u32, texture: Option<TextureHandle>) {
        self.record(DeviceCall::BindTexture { unit, texture });
    }

    fn draw_triangles(&self, first: i32, count: i32) {
        self.record(DeviceCall::DrawTriangles { first, count });
    }

    fn clear(&self, flags: ClearFlags) {
        self.record(DeviceCall::Clear(flags));
    }

    fn set_clear_color(&self, rgba: [f32; 4]) {
        self.record(DeviceCall::SetClearColor(rgba));
    }

    fn set_viewport(&self, width: u32, height: u32) {
        self.record(DeviceCall::SetViewport { width, height });
    }

    fn configure_pipeline_state(&self) {
        self.record(DeviceCall::ConfigurePipelineState);
    }
}
