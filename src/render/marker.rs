// SPDX-License-Identifier: GPL-3.0-only

//! Anchor marker pass: a 1 × 20 × 1 cm stick standing on the anchor

use crate::constants::{MARKER_HALF_WIDTH_M as W, MARKER_HEIGHT_M as H};
use crate::errors::{RenderError, RenderResult};
use crate::gpu::{
    AttribLocation, BufferId, BufferKind, Primitive, ProgramId, Rasterizer, UniformLocation,
};
use glam::Mat4;
use tracing::debug;

const SHADER: &str = include_str!("marker.wgsl");

/// Prism corners (x, y, z): bottom face at y = 0, top face at y = H
pub const VERTICES: [f32; 24] = [
    -W, 0.0, -W, //
    W, 0.0, -W, //
    W, 0.0, W, //
    -W, 0.0, W, //
    -W, H, -W, //
    W, H, -W, //
    W, H, W, //
    -W, H, W,
];

/// Two triangles per face
pub const INDICES: [u8; 36] = [
    0, 1, 2, 0, 2, 3, // bottom
    4, 5, 6, 4, 6, 7, // top
    0, 1, 5, 0, 5, 4, // front
    1, 2, 6, 1, 6, 5, // right
    2, 3, 7, 2, 7, 6, // back
    3, 0, 4, 3, 4, 7, // left
];

struct Resources {
    program: ProgramId,
    position: AttribLocation,
    mvp: UniformLocation,
    color: UniformLocation,
    vertices: BufferId,
    indices: BufferId,
}

pub struct MarkerRenderer {
    color: [f32; 4],
    resources: Option<Resources>,
}

impl MarkerRenderer {
    pub fn new(color: [f32; 4]) -> Self {
        Self {
            color,
            resources: None,
        }
    }

    pub fn create_on_render_thread(&mut self, gpu: &mut dyn Rasterizer) -> RenderResult<()> {
        let program = gpu.create_program("anchor marker", SHADER)?;
        let position = gpu.attrib_location(program, "a_position")?;
        let mvp = gpu.uniform_location(program, "u_mvp")?;
        let color = gpu.uniform_location(program, "u_color")?;
        let vertices = gpu.create_buffer(BufferKind::Vertex, bytemuck::cast_slice(&VERTICES))?;
        let indices = gpu.create_buffer(BufferKind::Index, &INDICES)?;

        debug!(program = program.0, "Marker pass created");
        self.resources = Some(Resources {
            program,
            position,
            mvp,
            color,
            vertices,
            indices,
        });
        Ok(())
    }

    /// Draw at `model` (anchor pose); depth testing stays as the caller left it
    pub fn draw(
        &self,
        gpu: &mut dyn Rasterizer,
        view: &Mat4,
        projection: &Mat4,
        model: &Mat4,
    ) -> RenderResult<()> {
        let r = self.resources.as_ref().ok_or(RenderError::NotInitialized)?;

        let mvp = *projection * *view * *model;

        gpu.use_program(r.program)?;
        gpu.uniform_mat4(r.mvp, &mvp.to_cols_array())?;
        gpu.uniform_vec4(r.color, self.color)?;
        gpu.vertex_attrib_buffer(r.position, r.vertices, 3)?;
        let drawn = gpu.draw_indexed(Primitive::Triangles, r.indices, INDICES.len() as u32);
        gpu.disable_vertex_attrib(r.position);
        drawn
    }
}
