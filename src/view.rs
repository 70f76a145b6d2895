// SPDX-License-Identifier: GPL-3.0-only

//! AR view: the per-tick driver
//!
//! Owns everything the render thread touches (session lifecycle, renderer,
//! capture pipeline) and exposes the surface callbacks a GPU surface owner
//! invokes. Each tick:
//!
//! 1. clear color and depth
//! 2. bring up the session, or end the tick
//! 3. push pending display geometry
//! 4. bind the camera texture and advance one frame
//! 5. draw the background, then the marker if an anchor exists
//! 6. service pending placeAnchor / captureFrame requests with this frame
//!
//! Nothing raised during a tick escapes it.

use crate::backends::{DisplayRotation, TrackingRuntime, TrackingSession};
use crate::config::Config;
use crate::errors::{AppResult, RenderResult};
use crate::gpu::{Rasterizer, TextureId};
use crate::pipeline::{ArChannel, CapturePipeline, CaptureSettings, ResponseContext};
use crate::render::FrameRenderer;
use crate::session::{SessionLifecycle, SessionPreferences, ViewportTracker};
use crate::storage::ArtifactStore;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Frame drawn and requests serviced
    Rendered,
    /// No ready session (installing, bring-up failed, suspended or disposed)
    SessionUnavailable,
    /// The tick was abandoned after an error
    Failed,
}

pub struct ArView<R: TrackingRuntime> {
    lifecycle: SessionLifecycle<R>,
    viewport: ViewportTracker,
    renderer: FrameRenderer,
    pipeline: CapturePipeline,
    clear_color: [f32; 4],
    /// Session generation that last received display geometry
    seen_generation: u64,
    disposed: bool,
}

impl<R: TrackingRuntime> ArView<R> {
    pub fn new(
        runtime: R,
        config: &Config,
        store: ArtifactStore,
        responder: Arc<dyn ResponseContext>,
    ) -> Self {
        Self {
            lifecycle: SessionLifecycle::new(runtime, SessionPreferences::from(config)),
            viewport: ViewportTracker::new(),
            renderer: FrameRenderer::new(config.marker_color, config.near_plane, config.far_plane),
            pipeline: CapturePipeline::new(store, responder, CaptureSettings::from(config)),
            clear_color: config.clear_color,
            seen_generation: 0,
            disposed: false,
        }
    }

    /// Request-side handle for the method channel
    pub fn channel(&self) -> ArChannel {
        self.pipeline.channel()
    }

    /// Shared viewport state, for display-change notifications from other threads
    pub fn viewport(&self) -> ViewportTracker {
        self.viewport.clone()
    }

    pub fn lifecycle(&self) -> &SessionLifecycle<R> {
        &self.lifecycle
    }

    pub fn pipeline(&self) -> &CapturePipeline {
        &self.pipeline
    }

    /// GPU surface created: set clear color and build GPU resources
    pub fn on_surface_created(&mut self, gpu: &mut dyn Rasterizer) -> RenderResult<()> {
        gpu.set_clear_color(self.clear_color);
        self.renderer.create_on_render_thread(gpu)?;
        info!("AR surface created");
        Ok(())
    }

    /// GPU surface resized
    pub fn on_surface_changed(&mut self, gpu: &mut dyn Rasterizer, width: u32, height: u32) {
        gpu.set_viewport(width, height);
        self.viewport.on_surface_changed(width, height);
        debug!(width, height, "AR surface changed");
    }

    /// Display rotated; may be called from any thread through [`Self::viewport`]
    pub fn on_display_changed(&self, rotation: DisplayRotation) {
        self.viewport.on_display_changed(rotation);
    }

    /// Host paused: release the camera
    pub fn on_pause(&mut self) {
        self.lifecycle.suspend();
    }

    /// Host resumed; a failed resume is retried on every following tick
    pub fn on_resume(&mut self) {
        if let Err(e) = self.lifecycle.resume() {
            warn!(error = %e, "Failed to resume tracking session");
        }
    }

    /// Run one tick
    pub fn on_draw_frame(&mut self, gpu: &mut dyn Rasterizer) -> TickOutcome {
        gpu.clear(true, true);

        if self.disposed {
            return TickOutcome::SessionUnavailable;
        }
        let Some(texture) = self.renderer.camera_texture() else {
            warn!("Draw before surface creation");
            return TickOutcome::Failed;
        };

        if self.lifecycle.ensure_session().is_none() {
            return TickOutcome::SessionUnavailable;
        }

        // a fresh or resumed session has not seen the display geometry yet
        let generation = self.lifecycle.generation();
        if generation != self.seen_generation {
            self.seen_generation = generation;
            self.viewport.invalidate();
        }

        let Some(session) = self.lifecycle.ensure_session() else {
            return TickOutcome::SessionUnavailable;
        };

        match Self::tick(
            session,
            gpu,
            texture,
            &self.viewport,
            &self.renderer,
            &mut self.pipeline,
        ) {
            Ok(()) => TickOutcome::Rendered,
            Err(e) => {
                error!(error = %e, "Exception on draw frame");
                TickOutcome::Failed
            }
        }
    }

    fn tick(
        session: &mut R::Session,
        gpu: &mut dyn Rasterizer,
        texture: TextureId,
        viewport: &ViewportTracker,
        renderer: &FrameRenderer,
        pipeline: &mut CapturePipeline,
    ) -> AppResult<()> {
        viewport.apply_if_dirty(session);
        session.set_camera_texture(texture);

        let mut frame = session.update()?;

        renderer.draw_background(gpu, &*frame)?;
        if let Some(anchor) = pipeline.anchor_pose() {
            renderer.draw_marker(gpu, &*frame, &anchor)?;
        }

        pipeline.service(&mut *frame, viewport.size());
        Ok(())
    }

    /// Resolve outstanding requests and close the session
    ///
    /// Runs on the render thread, between ticks.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.pipeline.shutdown();
        self.lifecycle.close();
        info!("AR view disposed");
    }
}

impl<R: TrackingRuntime> Drop for ArView<R> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::synthetic::{FaultPlan, SyntheticRuntime};
    use crate::gpu::HeadlessRasterizer;
    use crate::pipeline::ImmediateContext;

    fn view(runtime: SyntheticRuntime) -> (ArView<SyntheticRuntime>, HeadlessRasterizer, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("ar-capture-view-{}", uuid::Uuid::new_v4()));
        let config = Config {
            cache_dir: Some(dir.clone()),
            write_manifest: false,
            ..Config::default()
        };
        let store = ArtifactStore::open(config.artifact_dir()).unwrap();
        let mut view = ArView::new(runtime, &config, store, Arc::new(ImmediateContext));
        let mut gpu = HeadlessRasterizer::new();
        view.on_surface_created(&mut gpu).unwrap();
        view.on_surface_changed(&mut gpu, 640, 480);
        (view, gpu, dir)
    }

    #[test]
    fn test_tick_draws_background_only_without_anchor() {
        let (mut view, mut gpu, dir) = view(SyntheticRuntime::new());
        assert_eq!(view.on_draw_frame(&mut gpu), TickOutcome::Rendered);
        assert_eq!(gpu.clear_count(), 1);
        assert_eq!(gpu.draw_calls().len(), 1);
        assert_eq!(gpu.clear_color(), crate::constants::DEFAULT_CLEAR_COLOR);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_install_prompt_skips_frame_work() {
        let runtime = SyntheticRuntime::with_faults(FaultPlan {
            install_prompts: 1,
            ..Default::default()
        });
        let stats = runtime.stats();
        let (mut view, mut gpu, dir) = view(runtime);

        assert_eq!(view.on_draw_frame(&mut gpu), TickOutcome::SessionUnavailable);
        assert_eq!(gpu.clear_count(), 1);
        assert!(gpu.draw_calls().is_empty());
        assert_eq!(stats.frames(), 0);

        assert_eq!(view.on_draw_frame(&mut gpu), TickOutcome::Rendered);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_geometry_pushed_once_per_session() {
        let runtime = SyntheticRuntime::new();
        let stats = runtime.stats();
        let (mut view, mut gpu, dir) = view(runtime);

        for _ in 0..3 {
            view.on_draw_frame(&mut gpu);
        }
        assert_eq!(stats.geometry_pushes(), 1);

        view.on_pause();
        assert_eq!(view.on_draw_frame(&mut gpu), TickOutcome::SessionUnavailable);
        view.on_resume();
        view.on_draw_frame(&mut gpu);
        // resumed session gets the geometry again
        assert_eq!(stats.geometry_pushes(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_marker_drawn_after_anchor_placed() {
        let (mut view, mut gpu, dir) = view(SyntheticRuntime::new());
        let channel = view.channel();
        let _pending = channel.place_anchor();

        view.on_draw_frame(&mut gpu);
        assert!(view.pipeline().has_anchor());
        gpu.take_draw_calls();

        view.on_draw_frame(&mut gpu);
        assert_eq!(gpu.draw_calls().len(), 2);
        assert!(gpu.draw_calls()[1].indexed);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_dispose_stops_ticking() {
        let runtime = SyntheticRuntime::new();
        let stats = runtime.stats();
        let (mut view, mut gpu, dir) = view(runtime);
        view.on_draw_frame(&mut gpu);
        view.dispose();
        assert_eq!(view.on_draw_frame(&mut gpu), TickOutcome::SessionUnavailable);
        assert_eq!(stats.frames(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_draw_before_surface_created_fails_softly() {
        let dir = std::env::temp_dir().join(format!("ar-capture-view-{}", uuid::Uuid::new_v4()));
        let store = ArtifactStore::open(&dir).unwrap();
        let mut view = ArView::new(
            SyntheticRuntime::new(),
            &Config::default(),
            store,
            Arc::new(ImmediateContext),
        );
        let mut gpu = HeadlessRasterizer::new();
        assert_eq!(view.on_draw_frame(&mut gpu), TickOutcome::Failed);
        std::fs::remove_dir_all(&dir).ok();
    }
}
