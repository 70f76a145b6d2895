// SPDX-License-Identifier: GPL-3.0-only

//! Camera background pass
//!
//! Draws a full-viewport quad sampling the camera texture. The quad's UVs are
//! run through the tracking engine's display-to-texture transform every frame,
//! since raw UVs are wrong once the display rotates or the camera image is
//! cropped to the viewport aspect.

use crate::backends::TrackedFrame;
use crate::errors::{RenderError, RenderResult};
use crate::gpu::{AttribLocation, BufferId, BufferKind, Primitive, ProgramId, Rasterizer, TextureId};
use tracing::debug;

const SHADER: &str = include_str!("background.wgsl");

/// Clip-space quad as a triangle strip (x, y, z)
pub const QUAD_COORDS: [f32; 12] = [
    -1.0, -1.0, 0.0, //
    -1.0, 1.0, 0.0, //
    1.0, -1.0, 0.0, //
    1.0, 1.0, 0.0,
];

/// Display UVs matching `QUAD_COORDS` (u, v), v pointing down
pub const QUAD_TEXCOORDS: [f32; 8] = [
    0.0, 1.0, //
    0.0, 0.0, //
    1.0, 1.0, //
    1.0, 0.0,
];

struct Resources {
    texture: TextureId,
    program: ProgramId,
    position: AttribLocation,
    tex_coord: AttribLocation,
    quad: BufferId,
}

#[derive(Default)]
pub struct BackgroundRenderer {
    resources: Option<Resources>,
}

impl BackgroundRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the camera texture, program and quad buffer
    pub fn create_on_render_thread(&mut self, gpu: &mut dyn Rasterizer) -> RenderResult<()> {
        let texture = gpu.create_external_texture()?;
        let program = gpu.create_program("camera background", SHADER)?;
        let position = gpu.attrib_location(program, "a_position")?;
        let tex_coord = gpu.attrib_location(program, "a_tex_coord")?;
        let quad = gpu.create_buffer(BufferKind::Vertex, bytemuck::cast_slice(&QUAD_COORDS))?;

        debug!(texture = texture.0, program = program.0, "Background pass created");
        self.resources = Some(Resources {
            texture,
            program,
            position,
            tex_coord,
            quad,
        });
        Ok(())
    }

    /// Texture the session streams camera images into
    pub fn texture(&self) -> Option<TextureId> {
        self.resources.as_ref().map(|r| r.texture)
    }

    /// Draw the background; leaves depth test and depth writes enabled
    pub fn draw(&self, gpu: &mut dyn Rasterizer, frame: &dyn TrackedFrame) -> RenderResult<()> {
        let r = self.resources.as_ref().ok_or(RenderError::NotInitialized)?;

        let tex_coords = frame.transform_display_uv(&QUAD_TEXCOORDS);

        // The background never occludes and is never occluded
        gpu.set_depth_test(false);
        gpu.set_depth_write(false);

        gpu.bind_external_texture(r.texture)?;
        gpu.use_program(r.program)?;
        gpu.vertex_attrib_buffer(r.position, r.quad, 3)?;
        gpu.vertex_attrib_data(r.tex_coord, &tex_coords, 2)?;
        let drawn = gpu.draw_arrays(Primitive::TriangleStrip, 4);

        gpu.disable_vertex_attrib(r.position);
        gpu.disable_vertex_attrib(r.tex_coord);
        gpu.set_depth_write(true);
        gpu.set_depth_test(true);
        drawn
    }
}
