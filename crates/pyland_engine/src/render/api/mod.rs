//! Graphics device abstraction
//!
//! The calls the 2D pipeline needs from a GL-style device, expressed with
//! opaque handles. Every method takes `&self`: devices are shared (`Rc`)
//! between the window that owns the context and the renderers using it.

use bitflags::bitflags;

use crate::foundation::math::Mat4;

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

/// Handle to a single compiled shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u32);

/// Handle to a vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Handle to a 2D texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Fragment shader
    Fragment,
}

bitflags! {
    /// Buffers cleared by [`GraphicsDevice::clear`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        /// Colour buffer
        const COLOR = 0b01;
        /// Depth buffer
        const DEPTH = 0b10;
    }
}

/// Layout of one float vertex attribute stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute location in the program
    pub location: u32,
    /// Floats per vertex
    pub components: i32,
}

impl VertexAttribute {
    /// `a_position`, two floats per vertex
    pub const POSITION: Self = Self {
        location: 0,
        components: 2,
    };

    /// `a_texCoord`, two floats per vertex
    pub const TEX_COORD: Self = Self {
        location: 1,
        components: 2,
    };
}

/// GPU operations used by the renderer
pub trait GraphicsDevice {
    /// Compile one shader stage. On failure the partial shader object is
    /// released and the compiler's info log is returned.
    fn create_shader(&self, stage: ShaderStage, source: &str) -> Result<ShaderHandle, String>;

    /// Delete a shader stage
    fn delete_shader(&self, shader: ShaderHandle);

    /// Create an empty program
    fn create_program(&self) -> Result<ProgramHandle, String>;

    /// Attach a compiled stage to a program
    fn attach_shader(&self, program: ProgramHandle, shader: ShaderHandle);

    /// Bind a named attribute to a location; takes effect at the next link
    fn bind_attribute_location(&self, program: ProgramHandle, location: u32, name: &str);

    /// Link a program, returning the linker's info log on failure
    fn link_program(&self, program: ProgramHandle) -> Result<(), String>;

    /// Delete a program
    fn delete_program(&self, program: ProgramHandle);

    /// Make `program` current, or unbind with `None`
    fn use_program(&self, program: Option<ProgramHandle>);

    /// Upload a 4x4 matrix uniform to the current program
    fn set_uniform_matrix(&self, program: ProgramHandle, name: &str, matrix: &Mat4);

    /// Upload float vertex data into a new buffer
    fn create_vertex_buffer(&self, data: &[f32]) -> Result<BufferHandle, String>;

    /// Delete a vertex buffer
    fn delete_buffer(&self, buffer: BufferHandle);

    /// Bind `buffer` and point `attribute` at it
    fn bind_vertex_attribute(&self, buffer: BufferHandle, attribute: VertexAttribute);

    /// Disable `attribute` and unbind the array buffer
    fn unbind_vertex_attribute(&self, attribute: VertexAttribute);

    /// Create an RGBA8 texture from tightly packed pixels
    fn create_texture_rgba(&self, width: u32, height: u32, pixels: &[u8]) -> Result<TextureHandle, String>;

    /// Delete a texture
    fn delete_texture(&self, texture: TextureHandle);

    /// Bind `texture` to a texture unit, or unbind with `None`
    fn bind_texture(&self, unit: u32, texture: Option<TextureHandle>);

    /// Draw `count` vertices as triangles starting at `first`
    fn draw_triangles(&self, first: i32, count: i32);

    /// Clear the selected buffers
    fn clear(&self, flags: ClearFlags);

    /// Set the clear colour
    fn set_clear_color(&self, rgba: [f32; 4]);

    /// Set viewport and scissor to the full `width` x `height` drawable
    fn set_viewport(&self, width: u32, height: u32);

    /// Fixed 2D pipeline state: depth test (less-or-equal), scissor test,
    /// source-alpha blending, colour writes without alpha, no culling.
    fn configure_pipeline_state(&self);
}
