//! Renderable component: everything needed to issue one draw
//!
//! Layers, sprites, map objects and the GUI overlay each carry a
//! [`RenderableComponent`]. Drawing follows one fixed protocol: bind shader,
//! vertex buffers and textures, upload `mat_projection` / `mat_modelview`,
//! draw, then release in reverse order. [`BoundRenderable`] enforces the
//! release half of that protocol.

use std::sync::Arc;

use crate::foundation::math::Mat4;
use crate::render::api::{BufferHandle, GraphicsDevice, TextureHandle, VertexAttribute};
use crate::render::shader::Shader;
use crate::render::RenderError;

/// Shader, geometry, textures and transforms of one drawable
#[derive(Debug)]
pub struct RenderableComponent {
    shader: Option<Arc<Shader>>,
    vertex_buffer: Option<BufferHandle>,
    texcoord_buffer: Option<BufferHandle>,
    textures: Vec<TextureHandle>,
    num_vertices_render: i32,
    projection: Mat4,
    modelview: Mat4,
}

impl Default for RenderableComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderableComponent {
    /// Empty component with identity transforms
    pub fn new() -> Self {
        Self {
            shader: None,
            vertex_buffer: None,
            texcoord_buffer: None,
            textures: Vec::new(),
            num_vertices_render: 0,
            projection: Mat4::identity(),
            modelview: Mat4::identity(),
        }
    }

    /// Shader used for drawing
    pub fn shader(&self) -> Option<&Arc<Shader>> {
        self.shader.as_ref()
    }

    /// Replace the shader
    pub fn set_shader(&mut self, shader: Option<Arc<Shader>>) {
        self.shader = shader;
    }

    /// Position buffer (`a_position`)
    pub fn vertex_buffer(&self) -> Option<BufferHandle> {
        self.vertex_buffer
    }

    /// Set the position buffer
    pub fn set_vertex_buffer(&mut self, buffer: Option<BufferHandle>) {
        self.vertex_buffer = buffer;
    }

    /// Texture coordinate buffer (`a_texCoord`)
    pub fn texcoord_buffer(&self) -> Option<BufferHandle> {
        self.texcoord_buffer
    }

    /// Set the texture coordinate buffer
    pub fn set_texcoord_buffer(&mut self, buffer: Option<BufferHandle>) {
        self.texcoord_buffer = buffer;
    }

    /// Textures, bound to units `0..n`
    pub fn textures(&self) -> &[TextureHandle] {
        &self.textures
    }

    /// Replace all textures
    pub fn set_textures(&mut self, textures: Vec<TextureHandle>) {
        self.textures = textures;
    }

    /// Number of vertices drawn
    pub fn num_vertices_render(&self) -> i32 {
        self.num_vertices_render
    }

    /// Set the number of vertices drawn
    pub fn set_num_vertices_render(&mut self, count: i32) {
        self.num_vertices_render = count;
    }

    /// Projection matrix
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection
    }

    /// Set the projection matrix
    pub fn set_projection_matrix(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    /// Modelview matrix
    pub fn modelview_matrix(&self) -> &Mat4 {
        &self.modelview
    }

    /// Set the modelview matrix
    pub fn set_modelview_matrix(&mut self, modelview: Mat4) {
        self.modelview = modelview;
    }

    /// Upload 2D positions and texture coordinates (two floats per vertex)
    /// into fresh buffers, replacing and deleting any previous ones.
    pub fn upload_geometry(
        &mut self,
        device: &dyn GraphicsDevice,
        positions: &[f32],
        texcoords: &[f32],
    ) -> Result<(), RenderError> {
        let vertex_buffer = device.create_vertex_buffer(positions).map_err(RenderError::Device)?;
        let texcoord_buffer = match device.create_vertex_buffer(texcoords) {
            Ok(buffer) => buffer,
            Err(message) => {
                device.delete_buffer(vertex_buffer);
                return Err(RenderError::Device(message));
            }
        };

        self.release_geometry(device);
        self.vertex_buffer = Some(vertex_buffer);
        self.texcoord_buffer = Some(texcoord_buffer);
        self.num_vertices_render = (positions.len() / 2) as i32;
        Ok(())
    }

    /// Delete owned vertex buffers
    pub fn release_geometry(&mut self, device: &dyn GraphicsDevice) {
        for buffer in [self.vertex_buffer.take(), self.texcoord_buffer.take()].into_iter().flatten() {
            device.delete_buffer(buffer);
        }
        self.num_vertices_render = 0;
    }

    /// Make the shader's program current; false when there is no shader
    pub fn bind_shader(&self, device: &dyn GraphicsDevice) -> bool {
        match &self.shader {
            Some(shader) => {
                device.use_program(Some(shader.program()));
                true
            }
            None => false,
        }
    }

    /// Unbind the program
    pub fn release_shader(&self, device: &dyn GraphicsDevice) {
        device.use_program(None);
    }

    /// Bind position and texture coordinate buffers
    pub fn bind_vbos(&self, device: &dyn GraphicsDevice) {
        if let Some(buffer) = self.vertex_buffer {
            device.bind_vertex_attribute(buffer, VertexAttribute::POSITION);
        }
        if let Some(buffer) = self.texcoord_buffer {
            device.bind_vertex_attribute(buffer, VertexAttribute::TEX_COORD);
        }
    }

    /// Unbind vertex buffers, reverse of [`Self::bind_vbos`]
    pub fn release_vbos(&self, device: &dyn GraphicsDevice) {
        if self.texcoord_buffer.is_some() {
            device.unbind_vertex_attribute(VertexAttribute::TEX_COORD);
        }
        if self.vertex_buffer.is_some() {
            device.unbind_vertex_attribute(VertexAttribute::POSITION);
        }
    }

    /// Bind textures to consecutive units
    pub fn bind_textures(&self, device: &dyn GraphicsDevice) {
        for (unit, texture) in self.textures.iter().enumerate() {
            device.bind_texture(unit as u32, Some(*texture));
        }
    }

    /// Unbind textures, last unit first
    pub fn release_textures(&self, device: &dyn GraphicsDevice) {
        for unit in (0..self.textures.len()).rev() {
            device.bind_texture(unit as u32, None);
        }
    }

    /// Bind everything for drawing. `None` (nothing bound) without a shader.
    pub fn bind<'a>(&'a self, device: &'a dyn GraphicsDevice) -> Option<BoundRenderable<'a>> {
        if !self.bind_shader(device) {
            return None;
        }
        self.bind_vbos(device);
        self.bind_textures(device);
        Some(BoundRenderable {
            component: self,
            device,
        })
    }
}

/// A renderable with shader, buffers and textures bound
///
/// Dropping it releases textures, buffers and shader, in that order.
pub struct BoundRenderable<'a> {
    component: &'a RenderableComponent,
    device: &'a dyn GraphicsDevice,
}

impl BoundRenderable<'_> {
    /// Upload `mat_projection` and `mat_modelview` to the bound program
    pub fn upload_matrices(&self) {
        if let Some(shader) = &self.component.shader {
            let program = shader.program();
            self.device
                .set_uniform_matrix(program, "mat_projection", &self.component.projection);
            self.device
                .set_uniform_matrix(program, "mat_modelview", &self.component.modelview);
        }
    }

    /// Draw the component's vertices as triangles
    pub fn draw(&self) {
        self.device.draw_triangles(0, self.component.num_vertices_render);
    }
}

impl Drop for BoundRenderable<'_> {
    fn drop(&mut self) {
        self.component.release_textures(self.device);
        self.component.release_vbos(self.device);
        self.component.release_shader(self.device);
    }
}
