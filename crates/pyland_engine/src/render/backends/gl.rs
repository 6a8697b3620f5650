//! OpenGL device on top of `glow`
//!
//! Engine handles are the raw GL object names, so converting between the
//! two is free and no lookup table is needed.

use std::num::NonZeroU32;
use std::rc::Rc;

use glow::{HasContext, PixelUnpackData};

use crate::foundation::math::{as_column_slice, Mat4};
use crate::render::api::{
    BufferHandle, ClearFlags, GraphicsDevice, ProgramHandle, ShaderHandle, ShaderStage,
    TextureHandle, VertexAttribute,
};

macro_rules! gl_handle {
    ($handle:ident, $native:ident, $to_native:ident, $from_native:ident) => {
        fn $to_native(handle: $handle) -> Option<glow::$native> {
            NonZeroU32::new(handle.0).map(glow::$native)
        }

        fn $from_native(native: glow::$native) -> $handle {
            $handle(native.0.get())
        }
    };
}

gl_handle!(ProgramHandle, NativeProgram, native_program, program_handle);
gl_handle!(ShaderHandle, NativeShader, native_shader, shader_handle);
gl_handle!(BufferHandle, NativeBuffer, native_buffer, buffer_handle);
gl_handle!(TextureHandle, NativeTexture, native_texture, texture_handle);

/// [`GraphicsDevice`] backed by a current OpenGL context
pub struct GlowDevice {
    gl: Rc<glow::Context>,
    vertex_array: Option<glow::VertexArray>,
}

impl GlowDevice {
    /// Device on `gl`. The context must be current.
    ///
    /// A single vertex array object stays bound for the device's lifetime;
    /// core profiles refuse attribute pointers without one.
    pub fn new(gl: Rc<glow::Context>) -> Self {
        let vertex_array = unsafe {
            match gl.create_vertex_array() {
                Ok(vao) => {
                    gl.bind_vertex_array(Some(vao));
                    Some(vao)
                }
                Err(error) => {
                    log::warn!("No vertex array object available: {error}");
                    None
                }
            }
        };
        log_driver_info(&gl);
        Self { gl, vertex_array }
    }

    /// Underlying `glow` context
    pub fn gl(&self) -> &Rc<glow::Context> {
        &self.gl
    }
}

impl Drop for GlowDevice {
    fn drop(&mut self) {
        if let Some(vao) = self.vertex_array.take() {
            unsafe {
                self.gl.bind_vertex_array(None);
                self.gl.delete_vertex_array(vao);
            }
        }
    }
}

fn log_driver_info(gl: &glow::Context) {
    unsafe {
        log::info!(
            "OpenGL: {} / {} / {}",
            gl.get_parameter_string(glow::VENDOR),
            gl.get_parameter_string(glow::RENDERER),
            gl.get_parameter_string(glow::VERSION)
        );
        log::info!("GLSL: {}", gl.get_parameter_string(glow::SHADING_LANGUAGE_VERSION));
    }
}

impl GraphicsDevice for GlowDevice {
    fn create_shader(&self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe {
            let shader = self.gl.create_shader(kind)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                let info_log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(info_log);
            }
            Ok(shader_handle(shader))
        }
    }

    fn delete_shader(&self, shader: ShaderHandle) {
        if let Some(shader) = native_shader(shader) {
            unsafe { self.gl.delete_shader(shader) };
        }
    }

    fn create_program(&self) -> Result<ProgramHandle, String> {
        unsafe { self.gl.create_program().map(program_handle) }
    }

    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle) {
        if let (Some(program), Some(shader)) = (native_program(program), native_shader(shader)) {
            unsafe { self.gl.attach_shader(program, shader) };
        }
    }

    fn bind_attribute_location(&self, program: ProgramHandle, location: u32, name: &str) {
        if let Some(program) = native_program(program) {
            unsafe { self.gl.bind_attrib_location(program, location, name) };
        }
    }

    fn link_program(&self, program: ProgramHandle) -> Result<(), String> {
        let native = native_program(program).ok_or_else(|| "null program".to_string())?;
        unsafe {
            self.gl.link_program(native);
            if self.gl.get_program_link_status(native) {
                Ok(())
            } else {
                Err(self.gl.get_program_info_log(native))
            }
        }
    }

    fn delete_program(&self, program: ProgramHandle) {
        if let Some(program) = native_program(program) {
            unsafe { self.gl.delete_program(program) };
        }
    }

    fn use_program(&self, program: Option<ProgramHandle>) {
        unsafe { self.gl.use_program(program.and_then(native_program)) };
    }

    fn set_uniform_matrix(&self, program: ProgramHandle, name: &str, matrix: &Mat4) {
        let Some(program) = native_program(program) else {
            return;
        };
        unsafe {
            match self.gl.get_uniform_location(program, name) {
                Some(location) => {
                    self.gl
                        .uniform_matrix_4_f32_slice(Some(&location), false, as_column_slice(matrix));
                }
                None => log::trace!("Uniform {name} not active"),
            }
        }
    }

    fn create_vertex_buffer(&self, data: &[f32]) -> Result<BufferHandle, String> {
        unsafe {
            let buffer = self.gl.create_buffer()?;
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            self.gl
                .buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(data), glow::STATIC_DRAW);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            Ok(buffer_handle(buffer))
        }
    }

    fn delete_buffer(&self, buffer: BufferHandle) {
        if let Some(buffer) = native_buffer(buffer) {
            unsafe { self.gl.delete_buffer(buffer) };
        }
    }

    fn bind_vertex_attribute(&self, buffer: BufferHandle, attribute: VertexAttribute) {
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, native_buffer(buffer));
            self.gl.enable_vertex_attrib_array(attribute.location);
            self.gl.vertex_attrib_pointer_f32(
                attribute.location,
                attribute.components,
                glow::FLOAT,
                false,
                0,
                0,
            );
        }
    }

    fn unbind_vertex_attribute(&self, attribute: VertexAttribute) {
        unsafe {
            self.gl.disable_vertex_attrib_array(attribute.location);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }

    fn create_texture_rgba(&self, width: u32, height: u32, pixels: &[u8]) -> Result<TextureHandle, String> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(format!(
                "texture {width}x{height} needs {expected} bytes, got {}",
                pixels.len()
            ));
        }
        unsafe {
            let texture = self.gl.create_texture()?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(pixels)),
            );
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            Ok(texture_handle(texture))
        }
    }

    fn delete_texture(&self, texture: TextureHandle) {
        if let Some(texture) = native_texture(texture) {
            unsafe { self.gl.delete_texture(texture) };
        }
    }

    fn bind_texture(&self, unit: u32, texture: Option<TextureHandle>) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl
                .bind_texture(glow::TEXTURE_2D, texture.and_then(native_texture));
        }
    }

    fn draw_triangles(&self, first: i32, count: i32) {
        if count > 0 {
            unsafe { self.gl.draw_arrays(glow::TRIANGLES, first, count) };
        }
    }

    fn clear(&self, flags: ClearFlags) {
        let mut mask = 0;
        if flags.contains(ClearFlags::COLOR) {
            mask |= glow::COLOR_BUFFER_BIT;
        }
        if flags.contains(ClearFlags::DEPTH) {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        if mask != 0 {
            unsafe { self.gl.clear(mask) };
        }
    }

    fn set_clear_color(&self, rgba: [f32; 4]) {
        let [r, g, b, a] = rgba;
        unsafe { self.gl.clear_color(r, g, b, a) };
    }

    fn set_viewport(&self, width: u32, height: u32) {
        unsafe {
            self.gl.viewport(0, 0, width as i32, height as i32);
            self.gl.scissor(0, 0, width as i32, height as i32);
        }
    }

    fn configure_pipeline_state(&self) {
        unsafe {
            self.gl.enable(glow::DEPTH_TEST);
            self.gl.depth_func(glow::LEQUAL);
            self.gl.enable(glow::SCISSOR_TEST);
            self.gl.enable(glow::BLEND);
            self.gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            // The window compositor must not see our alpha.
            self.gl.color_mask(true, true, true, false);
            self.gl.disable(glow::CULL_FACE);
        }
    }
}
