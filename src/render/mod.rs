// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame drawing: camera background followed by the anchor marker
//!
//! GPU resources are created once on the render thread; each draw re-uploads
//! only the per-frame data (background UVs, marker MVP). The caller clears
//! the color and depth buffers before the first pass of a tick.

pub mod background;
pub mod marker;

pub use background::BackgroundRenderer;
pub use marker::MarkerRenderer;

use crate::backends::TrackedFrame;
use crate::errors::RenderResult;
use crate::gpu::{Rasterizer, TextureId};
use crate::math::Pose;

pub struct FrameRenderer {
    background: BackgroundRenderer,
    marker: MarkerRenderer,
    near: f32,
    far: f32,
}

impl FrameRenderer {
    pub fn new(marker_color: [f32; 4], near: f32, far: f32) -> Self {
        Self {
            background: BackgroundRenderer::new(),
            marker: MarkerRenderer::new(marker_color),
            near,
            far,
        }
    }

    /// Compile programs and upload static geometry
    pub fn create_on_render_thread(&mut self, gpu: &mut dyn Rasterizer) -> RenderResult<()> {
        self.background.create_on_render_thread(gpu)?;
        self.marker.create_on_render_thread(gpu)
    }

    /// Camera texture, once resources exist
    pub fn camera_texture(&self) -> Option<TextureId> {
        self.background.texture()
    }

    pub fn draw_background(
        &self,
        gpu: &mut dyn Rasterizer,
        frame: &dyn TrackedFrame,
    ) -> RenderResult<()> {
        self.background.draw(gpu, frame)
    }

    /// Draw the marker at `anchor` using this frame's camera
    pub fn draw_marker(
        &self,
        gpu: &mut dyn Rasterizer,
        frame: &dyn TrackedFrame,
        anchor: &Pose,
    ) -> RenderResult<()> {
        let projection = frame.projection_matrix(self.near, self.far);
        let view = frame.view_matrix();
        self.marker.draw(gpu, &view, &projection, &anchor.to_mat4())
    }
}
