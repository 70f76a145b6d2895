// SPDX-License-Identifier: GPL-3.0-only

//! Immediate-mode rasterization seam.
//!
//! The renderer drives the GPU through [`Rasterizer`], a small GL-style
//! interface: programs are compiled once, attribute and uniform locations are
//! looked up once, and per-frame data is re-uploaded before each draw. Every
//! call must happen on the render thread.

pub mod headless;

pub use headless::HeadlessRasterizer;

use crate::errors::RenderResult;

/// Texture handle issued by a rasterizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Linked program handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Vertex or index buffer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Vertex attribute slot within a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttribLocation(pub u32);

/// Uniform slot within a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// f32 vertex data
    Vertex,
    /// u8 indices
    Index,
}

/// Primitive topology for draw calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Triangles,
    TriangleStrip,
}

/// GPU immediate-mode rasterization capability
pub trait Rasterizer {
    fn set_clear_color(&mut self, rgba: [f32; 4]);

    /// Clear the selected buffers of the current target
    fn clear(&mut self, color: bool, depth: bool);

    fn set_viewport(&mut self, width: u32, height: u32);

    /// Texture the camera stream is written into (clamp-to-edge, nearest)
    fn create_external_texture(&mut self) -> RenderResult<TextureId>;

    /// Compile and link a program from shader source
    fn create_program(&mut self, label: &str, source: &str) -> RenderResult<ProgramId>;

    fn attrib_location(&self, program: ProgramId, name: &str) -> RenderResult<AttribLocation>;

    fn uniform_location(&self, program: ProgramId, name: &str) -> RenderResult<UniformLocation>;

    /// Upload a static buffer
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> RenderResult<BufferId>;

    fn set_depth_test(&mut self, enabled: bool);

    fn set_depth_write(&mut self, enabled: bool);

    fn use_program(&mut self, program: ProgramId) -> RenderResult<()>;

    fn bind_external_texture(&mut self, texture: TextureId) -> RenderResult<()>;

    /// Source an attribute from a static vertex buffer
    fn vertex_attrib_buffer(
        &mut self,
        location: AttribLocation,
        buffer: BufferId,
        components: u32,
    ) -> RenderResult<()>;

    /// Source an attribute from per-draw client data
    fn vertex_attrib_data(
        &mut self,
        location: AttribLocation,
        data: &[f32],
        components: u32,
    ) -> RenderResult<()>;

    fn disable_vertex_attrib(&mut self, location: AttribLocation);

    /// Column-major 4×4 matrix uniform
    fn uniform_mat4(&mut self, location: UniformLocation, value: &[f32; 16]) -> RenderResult<()>;

    fn uniform_vec4(&mut self, location: UniformLocation, value: [f32; 4]) -> RenderResult<()>;

    fn draw_arrays(&mut self, primitive: Primitive, count: u32) -> RenderResult<()>;

    fn draw_indexed(
        &mut self,
        primitive: Primitive,
        indices: BufferId,
        count: u32,
    ) -> RenderResult<()>;
}
