// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic tracking engine
//!
//! Implements the tracking seam without camera hardware: frames come from a
//! deterministic [`SyntheticScene`], and failures can be injected through a
//! [`FaultHandle`] to exercise the retry and error paths. Counters in
//! [`SyntheticStats`] make anchor leaks and geometry pushes observable from
//! outside the render thread.

pub mod scene;

pub use scene::{FRAME_INTERVAL_NS, SyntheticScene, rotate_uvs};

use super::{
    Anchor, DepthImage, DepthMode, DisplayRotation, HitResult, InstallStatus, SessionConfig,
    TrackedFrame, TrackingRuntime, TrackingSession, TrackingState, YuvImage,
};
use crate::errors::{SessionError, SessionResult};
use crate::gpu::TextureId;
use crate::math::Pose;
use glam::Mat4;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Failures to inject; counters are consumed one per triggering call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Install checks answering `InstallRequested`
    pub install_prompts: u32,
    pub creation_failures: u32,
    pub configure_failures: u32,
    pub resume_failures: u32,
    /// `update` calls failing after the session is resumed
    pub update_failures: u32,
    pub camera_image_failures: u32,
    pub depth_image_failures: u32,
    pub anchor_failures: u32,
    /// Device without raw depth support
    pub depth_unsupported: bool,
}

/// Shared, mutable fault plan
#[derive(Debug, Clone, Default)]
pub struct FaultHandle(Arc<Mutex<FaultPlan>>);

impl FaultHandle {
    pub fn new(plan: FaultPlan) -> Self {
        Self(Arc::new(Mutex::new(plan)))
    }

    /// Modify the plan in place
    pub fn update(&self, f: impl FnOnce(&mut FaultPlan)) {
        if let Ok(mut plan) = self.0.lock() {
            f(&mut plan);
        }
    }

    /// Consume one fault from the selected counter; true if one was pending
    fn take(&self, counter: impl FnOnce(&mut FaultPlan) -> &mut u32) -> bool {
        let Ok(mut plan) = self.0.lock() else {
            return false;
        };
        let remaining = counter(&mut plan);
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }

    fn depth_unsupported(&self) -> bool {
        self.0.lock().map(|plan| plan.depth_unsupported).unwrap_or(false)
    }
}

#[derive(Debug, Default)]
struct StatsInner {
    install_calls: Mutex<Vec<bool>>,
    sessions_created: AtomicUsize,
    frames: AtomicU64,
    anchors_created: AtomicUsize,
    live_anchors: AtomicUsize,
    geometry_pushes: AtomicUsize,
    last_geometry: Mutex<Option<(DisplayRotation, u32, u32)>>,
}

/// Observable counters shared by a runtime and everything it creates
#[derive(Debug, Clone, Default)]
pub struct SyntheticStats(Arc<StatsInner>);

impl SyntheticStats {
    /// `user_requested` flag of every install check, in order
    pub fn install_calls(&self) -> Vec<bool> {
        self.0
            .install_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn sessions_created(&self) -> usize {
        self.0.sessions_created.load(Ordering::SeqCst)
    }

    /// Frames produced by `update()` across all sessions
    pub fn frames(&self) -> u64 {
        self.0.frames.load(Ordering::SeqCst)
    }

    pub fn anchors_created(&self) -> usize {
        self.0.anchors_created.load(Ordering::SeqCst)
    }

    /// Anchors created and not yet detached
    pub fn live_anchors(&self) -> usize {
        self.0.live_anchors.load(Ordering::SeqCst)
    }

    pub fn geometry_pushes(&self) -> usize {
        self.0.geometry_pushes.load(Ordering::SeqCst)
    }

    pub fn last_geometry(&self) -> Option<(DisplayRotation, u32, u32)> {
        self.0.last_geometry.lock().ok().and_then(|g| *g)
    }
}

/// Runtime producing synthetic sessions
#[derive(Debug, Clone, Default)]
pub struct SyntheticRuntime {
    scene: SyntheticScene,
    faults: FaultHandle,
    stats: SyntheticStats,
}

impl SyntheticRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(plan: FaultPlan) -> Self {
        Self {
            faults: FaultHandle::new(plan),
            ..Self::default()
        }
    }

    pub fn with_scene(mut self, scene: SyntheticScene) -> Self {
        self.scene = scene;
        self
    }

    pub fn scene(&self) -> &SyntheticScene {
        &self.scene
    }

    pub fn faults(&self) -> FaultHandle {
        self.faults.clone()
    }

    pub fn stats(&self) -> SyntheticStats {
        self.stats.clone()
    }

    pub fn install_calls(&self) -> Vec<bool> {
        self.stats.install_calls()
    }

    pub fn sessions_created(&self) -> usize {
        self.stats.sessions_created()
    }
}

impl TrackingRuntime for SyntheticRuntime {
    type Session = SyntheticSession;

    fn request_install(&mut self, user_requested: bool) -> SessionResult<InstallStatus> {
        if let Ok(mut calls) = self.stats.0.install_calls.lock() {
            calls.push(user_requested);
        }
        if self.faults.take(|p| &mut p.install_prompts) {
            debug!(user_requested, "Synthetic install prompt");
            return Ok(InstallStatus::InstallRequested);
        }
        Ok(InstallStatus::Installed)
    }

    fn create_session(&mut self) -> SessionResult<SyntheticSession> {
        if self.faults.take(|p| &mut p.creation_failures) {
            return Err(SessionError::CreationFailed("injected failure".into()));
        }
        self.stats.0.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(SyntheticSession {
            scene: self.scene.clone(),
            faults: self.faults.clone(),
            stats: self.stats.clone(),
            config: None,
            resumed: false,
            closed: false,
            geometry: (DisplayRotation::Rotate0, 0, 0),
            texture: None,
            frame_index: 0,
        })
    }
}

pub struct SyntheticSession {
    scene: SyntheticScene,
    faults: FaultHandle,
    stats: SyntheticStats,
    config: Option<SessionConfig>,
    resumed: bool,
    closed: bool,
    geometry: (DisplayRotation, u32, u32),
    texture: Option<TextureId>,
    frame_index: u64,
}

impl SyntheticSession {
    pub fn config(&self) -> Option<SessionConfig> {
        self.config
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }
}

impl TrackingSession for SyntheticSession {
    fn is_depth_mode_supported(&self, mode: DepthMode) -> bool {
        match mode {
            DepthMode::Disabled => true,
            DepthMode::Automatic | DepthMode::RawDepthOnly => !self.faults.depth_unsupported(),
        }
    }

    fn configure(&mut self, config: &SessionConfig) -> SessionResult<()> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if self.faults.take(|p| &mut p.configure_failures) {
            return Err(SessionError::ConfigurationFailed("injected failure".into()));
        }
        if !self.is_depth_mode_supported(config.depth_mode) {
            return Err(SessionError::Unsupported(format!(
                "depth mode {:?}",
                config.depth_mode
            )));
        }
        self.config = Some(*config);
        Ok(())
    }

    fn resume(&mut self) -> SessionResult<()> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if self.faults.take(|p| &mut p.resume_failures) {
            return Err(SessionError::CameraNotAvailable);
        }
        self.config.get_or_insert_with(SessionConfig::default);
        self.resumed = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.resumed = false;
    }

    fn close(&mut self) {
        self.resumed = false;
        self.closed = true;
    }

    fn set_display_geometry(&mut self, rotation: DisplayRotation, width: u32, height: u32) {
        self.geometry = (rotation, width, height);
        self.stats.0.geometry_pushes.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.stats.0.last_geometry.lock() {
            *last = Some(self.geometry);
        }
    }

    fn set_camera_texture(&mut self, texture: TextureId) {
        self.texture = Some(texture);
    }

    fn update(&mut self) -> SessionResult<Box<dyn TrackedFrame + '_>> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if !self.resumed {
            return Err(SessionError::Paused);
        }
        if self.texture.is_none() {
            return Err(SessionError::NotYetAvailable("Camera texture".into()));
        }
        if self.faults.take(|p| &mut p.update_failures) {
            return Err(SessionError::NotYetAvailable("injected frame failure".into()));
        }

        self.frame_index += 1;
        self.stats.0.frames.fetch_add(1, Ordering::SeqCst);
        let camera = self.scene.camera_pose(self.frame_index);
        trace!(frame = self.frame_index, "Synthetic frame");

        Ok(Box::new(SyntheticFrame {
            frame_index: self.frame_index,
            camera,
            session: self,
        }))
    }
}

/// One synthetic frame, borrowing its session for the tick
pub struct SyntheticFrame<'a> {
    session: &'a mut SyntheticSession,
    frame_index: u64,
    camera: Pose,
}

impl SyntheticFrame<'_> {
    fn viewport(&self) -> (u32, u32) {
        let (_, width, height) = self.session.geometry;
        (width, height)
    }
}

impl TrackedFrame for SyntheticFrame<'_> {
    fn timestamp_ns(&self) -> i64 {
        SyntheticScene::timestamp_ns(self.frame_index)
    }

    fn tracking_state(&self) -> TrackingState {
        TrackingState::Tracking
    }

    fn camera_pose(&self) -> Pose {
        self.camera
    }

    fn projection_matrix(&self, near: f32, far: f32) -> Mat4 {
        let aspect = match self.viewport() {
            (w, h) if w > 0 && h > 0 => w as f32 / h as f32,
            _ => {
                let (w, h) = self.session.scene.image_size;
                w as f32 / h as f32
            }
        };
        Mat4::perspective_rh_gl(self.session.scene.vertical_fov, aspect, near, far)
    }

    fn transform_display_uv(&self, uvs: &[f32; 8]) -> [f32; 8] {
        rotate_uvs(self.session.geometry.0, uvs)
    }

    fn hit_test(&self, x: f32, y: f32) -> Vec<HitResult> {
        self.session
            .scene
            .hit_test(&self.camera, x, y, self.viewport())
    }

    fn create_anchor(&mut self, hit: &HitResult) -> SessionResult<Box<dyn Anchor>> {
        if self.session.faults.take(|p| &mut p.anchor_failures) {
            return Err(SessionError::NotYetAvailable("Anchor".into()));
        }
        let stats = self.session.stats.clone();
        stats.0.anchors_created.fetch_add(1, Ordering::SeqCst);
        stats.0.live_anchors.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticAnchor {
            pose: hit.hit_pose,
            stats,
            detached: false,
        }))
    }

    fn acquire_camera_image(&self) -> SessionResult<YuvImage> {
        if self.session.faults.take(|p| &mut p.camera_image_failures) {
            return Err(SessionError::NotYetAvailable("Camera image".into()));
        }
        Ok(self.session.scene.camera_image(self.frame_index))
    }

    fn acquire_raw_depth_image(&self) -> SessionResult<DepthImage> {
        let depth_mode = self.session.config.map(|c| c.depth_mode);
        if depth_mode != Some(DepthMode::RawDepthOnly) {
            return Err(SessionError::Unsupported("Raw depth is not enabled".into()));
        }
        if self.session.faults.take(|p| &mut p.depth_image_failures) {
            return Err(SessionError::NotYetAvailable("Depth image".into()));
        }
        Ok(self.session.scene.depth_image(self.frame_index))
    }
}

pub struct SyntheticAnchor {
    pose: Pose,
    stats: SyntheticStats,
    detached: bool,
}

impl Anchor for SyntheticAnchor {
    fn pose(&self) -> Pose {
        self.pose
    }

    fn tracking_state(&self) -> TrackingState {
        if self.detached {
            TrackingState::Stopped
        } else {
            TrackingState::Tracking
        }
    }

    fn detach(&mut self) {
        if !self.detached {
            self.detached = true;
            self.stats.0.live_anchors.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_session(runtime: &mut SyntheticRuntime) -> SyntheticSession {
        let mut session = runtime.create_session().unwrap();
        session
            .configure(&SessionConfig {
                depth_mode: DepthMode::RawDepthOnly,
                ..Default::default()
            })
            .unwrap();
        session.resume().unwrap();
        session.set_camera_texture(TextureId(1));
        session.set_display_geometry(DisplayRotation::Rotate0, 640, 480);
        session
    }

    #[test]
    fn test_update_requires_resume_and_texture() {
        let mut runtime = SyntheticRuntime::new();
        let mut session = runtime.create_session().unwrap();
        assert_eq!(session.update().err(), Some(SessionError::Paused));
        session.resume().unwrap();
        assert!(matches!(
            session.update().err(),
            Some(SessionError::NotYetAvailable(_))
        ));
        session.set_camera_texture(TextureId(1));
        assert!(session.update().is_ok());
        session.close();
        assert_eq!(session.update().err(), Some(SessionError::Closed));
    }

    #[test]
    fn test_frame_images_share_timestamp() {
        let mut runtime = SyntheticRuntime::new();
        let mut session = ready_session(&mut runtime);
        let frame = session.update().unwrap();
        let color = frame.acquire_camera_image().unwrap();
        let depth = frame.acquire_raw_depth_image().unwrap();
        assert_eq!(color.timestamp_ns, frame.timestamp_ns());
        assert_eq!(depth.timestamp_ns, frame.timestamp_ns());
    }

    #[test]
    fn test_depth_requires_raw_mode() {
        let mut runtime = SyntheticRuntime::new();
        let mut session = runtime.create_session().unwrap();
        session.resume().unwrap();
        session.set_camera_texture(TextureId(1));
        let frame = session.update().unwrap();
        assert!(matches!(
            frame.acquire_raw_depth_image(),
            Err(SessionError::Unsupported(_))
        ));
    }

    #[test]
    fn test_anchor_counting() {
        let mut runtime = SyntheticRuntime::new();
        let stats = runtime.stats();
        let mut session = ready_session(&mut runtime);
        let mut frame = session.update().unwrap();
        let hit = frame.hit_test(320.0, 240.0).remove(0);

        let mut first = frame.create_anchor(&hit).unwrap();
        let _second = frame.create_anchor(&hit).unwrap();
        assert_eq!(stats.live_anchors(), 2);

        first.detach();
        first.detach();
        assert_eq!(stats.live_anchors(), 1);
        assert_eq!(stats.anchors_created(), 2);
        assert_eq!(first.tracking_state(), TrackingState::Stopped);
    }

    #[test]
    fn test_injected_faults_are_consumed() {
        let mut runtime = SyntheticRuntime::new();
        let faults = runtime.faults();
        let mut session = ready_session(&mut runtime);
        faults.update(|p| p.camera_image_failures = 1);

        let frame = session.update().unwrap();
        assert!(frame.acquire_camera_image().is_err());
        assert!(frame.acquire_camera_image().is_ok());
    }

    #[test]
    fn test_unsupported_depth_rejected_by_configure() {
        let mut runtime = SyntheticRuntime::with_faults(FaultPlan {
            depth_unsupported: true,
            ..Default::default()
        });
        let mut session = runtime.create_session().unwrap();
        assert!(!session.is_depth_mode_supported(DepthMode::RawDepthOnly));
        assert!(session.is_depth_mode_supported(DepthMode::Disabled));
        assert!(matches!(
            session.configure(&SessionConfig {
                depth_mode: DepthMode::RawDepthOnly,
                ..Default::default()
            }),
            Err(SessionError::Unsupported(_))
        ));
    }
}
