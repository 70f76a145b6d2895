// SPDX-License-Identifier: GPL-3.0-only

//! Capture-and-pose pipeline
//!
//! Owns the current anchor and services the two request kinds once per tick,
//! using only the frame of that tick:
//!
//! - **placeAnchor**: hit-test the viewport center, accept the first hit on a
//!   detected plane inside its polygon, and replace the current anchor.
//! - **captureFrame**: color image, raw depth and camera-to-anchor pose from
//!   the same frame, persisted as timestamped artifacts.
//!
//! Results are computed here and then dispatched through a
//! [`ResponseContext`] to the requesters.

pub mod channel;
pub mod dispatch;
pub mod slot;

pub use channel::{ArChannel, MethodResponse};
pub use dispatch::{ImmediateContext, ResponseContext, RuntimeContext};
pub use slot::{RequestSlot, SlotState};

use crate::backends::{Anchor, HitResult, TrackedFrame};
use crate::config::Config;
use crate::constants::artifacts;
use crate::errors::CaptureError;
use crate::math::Pose;
use crate::media::{depth_dump, encode_nv21_jpeg, yuv420_to_nv21};
use crate::storage::{self, ArtifactStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reply to a successful capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    /// Absolute path of the JPEG color image
    pub image_path: PathBuf,
    /// Absolute path of the raw depth dump
    pub depth_path: PathBuf,
    /// Camera pose in the anchor's frame, row-major (translation at indices
    /// 3, 7 and 11); all zeros without an anchor
    pub relative_pose: [f64; 16],
    /// Timestamp of the frame everything was taken from
    pub timestamp_ns: i64,
}

/// The two request slots, shared with [`ArChannel`]
#[derive(Debug)]
pub(crate) struct Requests {
    pub(crate) anchor: RequestSlot<bool>,
    pub(crate) capture: RequestSlot<Result<CaptureResult, CaptureError>>,
}

impl Requests {
    fn new() -> Self {
        Self {
            anchor: RequestSlot::new("placeAnchor"),
            capture: RequestSlot::new("captureFrame"),
        }
    }
}

/// Capture tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub jpeg_quality: u8,
    pub write_manifest: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: crate::constants::MAX_JPEG_QUALITY,
            write_manifest: true,
        }
    }
}

impl From<&Config> for CaptureSettings {
    fn from(config: &Config) -> Self {
        Self {
            jpeg_quality: config.jpeg_quality,
            write_manifest: config.write_manifest,
        }
    }
}

pub struct CapturePipeline {
    requests: Arc<Requests>,
    responder: Arc<dyn ResponseContext>,
    store: ArtifactStore,
    settings: CaptureSettings,
    anchor: Option<Box<dyn Anchor>>,
    shut_down: bool,
}

impl CapturePipeline {
    pub fn new(
        store: ArtifactStore,
        responder: Arc<dyn ResponseContext>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            requests: Arc::new(Requests::new()),
            responder,
            store,
            settings,
            anchor: None,
            shut_down: false,
        }
    }

    /// Start with an existing anchor
    pub fn with_anchor(mut self, anchor: Box<dyn Anchor>) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Request-side handle
    pub fn channel(&self) -> ArChannel {
        ArChannel::new(self.requests.clone())
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn anchor_pose(&self) -> Option<Pose> {
        self.anchor.as_ref().map(|anchor| anchor.pose())
    }

    pub fn has_anchor(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn anchor_state(&self) -> SlotState {
        self.requests.anchor.state()
    }

    pub fn capture_state(&self) -> SlotState {
        self.requests.capture.state()
    }

    /// Service pending requests against this tick's frame
    ///
    /// `viewport` is the current surface size; anchors are placed at its center.
    pub fn service(&mut self, frame: &mut dyn TrackedFrame, viewport: (u32, u32)) {
        if let Some(batch) = self.requests.anchor.begin() {
            let placed = self.place_anchor(frame, viewport);
            debug!(placed, waiters = batch.len(), "placeAnchor serviced");
            batch.resolve(self.responder.as_ref(), placed);
            self.requests.anchor.finish();
        }

        if let Some(batch) = self.requests.capture.begin() {
            let result = self.capture(frame);
            if let Err(e) = &result {
                warn!(error = %e, "Capture failed");
            }
            batch.resolve(self.responder.as_ref(), result);
            self.requests.capture.finish();
        }
    }

    /// Place or replace the anchor; false leaves the current one untouched
    fn place_anchor(&mut self, frame: &mut dyn TrackedFrame, viewport: (u32, u32)) -> bool {
        let (width, height) = viewport;
        let (x, y) = (width as f32 / 2.0, height as f32 / 2.0);

        let Some(hit) = frame
            .hit_test(x, y)
            .into_iter()
            .find(HitResult::is_in_plane_polygon)
        else {
            debug!(x, y, "No plane hit inside a polygon at viewport center");
            return false;
        };

        match frame.create_anchor(&hit) {
            Ok(anchor) => {
                if let Some(mut previous) = self.anchor.take() {
                    previous.detach();
                }
                info!(distance = hit.distance, "Anchor placed");
                self.anchor = Some(anchor);
                true
            }
            Err(e) => {
                warn!(error = %e, "Anchor creation failed");
                false
            }
        }
    }

    /// Color, depth and pose from one frame
    fn capture(&self, frame: &dyn TrackedFrame) -> Result<CaptureResult, CaptureError> {
        let color = frame.acquire_camera_image()?;
        let depth = frame.acquire_raw_depth_image()?;

        let nv21 = yuv420_to_nv21(&color)?;
        let jpeg = encode_nv21_jpeg(&nv21, color.width, color.height, self.settings.jpeg_quality)?;

        let millis = storage::unix_millis();
        let image_path = self.store.write_artifact(
            artifacts::COLOR_PREFIX,
            artifacts::COLOR_EXTENSION,
            millis,
            &jpeg,
        )?;
        let depth_path = match self.store.write_artifact(
            artifacts::DEPTH_PREFIX,
            artifacts::DEPTH_EXTENSION,
            millis,
            &depth_dump(&depth),
        ) {
            Ok(path) => path,
            Err(e) => {
                // no half captures on disk
                let _ = std::fs::remove_file(&image_path);
                return Err(e.into());
            }
        };

        let relative_pose = match &self.anchor {
            Some(anchor) => frame
                .camera_pose()
                .relative_to(&anchor.pose())
                .to_row_major_f64(),
            None => [0.0; 16],
        };

        let result = CaptureResult {
            image_path,
            depth_path,
            relative_pose,
            timestamp_ns: frame.timestamp_ns(),
        };

        if self.settings.write_manifest {
            if let Err(e) = self.store.append_manifest(&result) {
                warn!(error = %e, "Failed to update capture manifest");
            }
        }

        info!(
            image = %result.image_path.display(),
            depth = %result.depth_path.display(),
            width = color.width,
            height = color.height,
            depth_width = depth.width,
            depth_height = depth.height,
            anchored = self.anchor.is_some(),
            "Frame captured"
        );
        Ok(result)
    }

    /// Resolve outstanding requests, refuse new ones, detach the anchor
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        let anchors = self.requests.anchor.close();
        if !anchors.is_empty() {
            debug!(waiters = anchors.len(), "Resolving placeAnchor on shutdown");
        }
        anchors.resolve(self.responder.as_ref(), false);

        let captures = self.requests.capture.close();
        if !captures.is_empty() {
            debug!(waiters = captures.len(), "Resolving captureFrame on shutdown");
        }
        captures.resolve(self.responder.as_ref(), Err(CaptureError::Disposed));

        if let Some(mut anchor) = self.anchor.take() {
            anchor.detach();
        }
        info!("Capture pipeline shut down");
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{
        DepthImage, ImagePlane, Plane, Trackable, TrackingState, YuvImage,
    };
    use crate::errors::{SessionError, SessionResult};
    use glam::{Mat4, Quat, Vec2, Vec3};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestAnchor {
        pose: Pose,
        detached: Arc<AtomicUsize>,
    }

    impl Anchor for TestAnchor {
        fn pose(&self) -> Pose {
            self.pose
        }
        fn tracking_state(&self) -> TrackingState {
            TrackingState::Tracking
        }
        fn detach(&mut self) {
            self.detached.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Frame with scripted hits; images carry the frame timestamp
    struct ScriptedFrame {
        camera: Pose,
        hits: Vec<HitResult>,
        detached: Arc<AtomicUsize>,
        fail_color: bool,
    }

    impl ScriptedFrame {
        fn new(camera: Pose, hits: Vec<HitResult>) -> Self {
            Self {
                camera,
                hits,
                detached: Arc::new(AtomicUsize::new(0)),
                fail_color: false,
            }
        }
    }

    impl TrackedFrame for ScriptedFrame {
        fn timestamp_ns(&self) -> i64 {
            1_000
        }
        fn tracking_state(&self) -> TrackingState {
            TrackingState::Tracking
        }
        fn camera_pose(&self) -> Pose {
            self.camera
        }
        fn projection_matrix(&self, _near: f32, _far: f32) -> Mat4 {
            Mat4::IDENTITY
        }
        fn transform_display_uv(&self, uvs: &[f32; 8]) -> [f32; 8] {
            *uvs
        }
        fn hit_test(&self, _x: f32, _y: f32) -> Vec<HitResult> {
            self.hits.clone()
        }
        fn create_anchor(&mut self, hit: &HitResult) -> SessionResult<Box<dyn Anchor>> {
            Ok(Box::new(TestAnchor {
                pose: hit.hit_pose,
                detached: self.detached.clone(),
            }))
        }
        fn acquire_camera_image(&self) -> SessionResult<YuvImage> {
            if self.fail_color {
                return Err(SessionError::NotYetAvailable("Camera image".into()));
            }
            Ok(YuvImage {
                width: 4,
                height: 2,
                planes: [
                    ImagePlane::new(vec![128u8; 8], 4, 1),
                    ImagePlane::new(vec![128u8; 2], 2, 1),
                    ImagePlane::new(vec![128u8; 2], 2, 1),
                ],
                timestamp_ns: 1_000,
            })
        }
        fn acquire_raw_depth_image(&self) -> SessionResult<DepthImage> {
            Ok(DepthImage {
                width: 2,
                height: 1,
                plane: ImagePlane::new(vec![0xE8u8, 0x03, 0xD0, 0x07], 4, 2),
                timestamp_ns: 1_000,
            })
        }
    }

    fn unit_plane() -> Plane {
        Plane {
            center_pose: Pose::IDENTITY,
            polygon: vec![
                Vec2::new(-1.0, -1.0),
                Vec2::new(1.0, -1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(-1.0, 1.0),
            ],
        }
    }

    fn hit(at: Vec3, trackable: Trackable) -> HitResult {
        HitResult {
            hit_pose: Pose::from_translation(at),
            distance: at.length(),
            trackable,
        }
    }

    fn pipeline() -> (CapturePipeline, PathBuf) {
        let dir = std::env::temp_dir().join(format!("ar-capture-pipeline-{}", uuid::Uuid::new_v4()));
        let store = ArtifactStore::open(&dir).unwrap();
        let pipeline = CapturePipeline::new(
            store,
            Arc::new(ImmediateContext),
            CaptureSettings {
                jpeg_quality: 90,
                write_manifest: false,
            },
        );
        (pipeline, dir)
    }

    #[test]
    fn test_rejects_point_and_exterior_hits() {
        let (mut pipeline, dir) = pipeline();
        let mut frame = ScriptedFrame::new(
            Pose::IDENTITY,
            vec![
                hit(Vec3::new(0.0, 0.0, -0.5), Trackable::Point),
                hit(Vec3::new(3.0, 0.0, 0.0), Trackable::Plane(unit_plane())),
            ],
        );

        let mut placed = pipeline.requests.anchor.request();
        pipeline.service(&mut frame, (640, 480));

        assert_eq!(placed.try_recv(), Ok(false));
        assert!(!pipeline.has_anchor());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_first_qualifying_hit_wins() {
        let (mut pipeline, dir) = pipeline();
        let inside = Vec3::new(0.2, 0.0, 0.3);
        let mut frame = ScriptedFrame::new(
            Pose::IDENTITY,
            vec![
                hit(Vec3::new(0.0, 0.0, -0.5), Trackable::DepthPoint),
                hit(inside, Trackable::Plane(unit_plane())),
                hit(Vec3::new(-0.5, 0.0, 0.5), Trackable::Plane(unit_plane())),
            ],
        );

        let mut placed = pipeline.requests.anchor.request();
        pipeline.service(&mut frame, (640, 480));

        assert_eq!(placed.try_recv(), Ok(true));
        assert_eq!(pipeline.anchor_pose().unwrap().translation(), inside);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_replacement_detaches_previous_anchor() {
        let (pipeline, dir) = pipeline();
        let old_detached = Arc::new(AtomicUsize::new(0));
        let mut pipeline = pipeline.with_anchor(Box::new(TestAnchor {
            pose: Pose::IDENTITY,
            detached: old_detached.clone(),
        }));
        let mut frame = ScriptedFrame::new(
            Pose::IDENTITY,
            vec![hit(Vec3::new(0.1, 0.0, 0.1), Trackable::Plane(unit_plane()))],
        );

        let _ = pipeline.requests.anchor.request();
        pipeline.service(&mut frame, (640, 480));
        assert_eq!(old_detached.load(Ordering::SeqCst), 1);
        assert!(pipeline.has_anchor());

        // a miss keeps the new anchor
        frame.hits.clear();
        let mut missed = pipeline.requests.anchor.request();
        pipeline.service(&mut frame, (640, 480));
        assert_eq!(missed.try_recv(), Ok(false));
        assert!(pipeline.has_anchor());
        assert_eq!(frame.detached.load(Ordering::SeqCst), 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_capture_without_anchor_reports_zero_pose() {
        let (mut pipeline, dir) = pipeline();
        let mut frame = ScriptedFrame::new(Pose::from_translation(Vec3::X), Vec::new());

        let mut reply = pipeline.requests.capture.request();
        pipeline.service(&mut frame, (640, 480));

        let result = reply.try_recv().unwrap().unwrap();
        assert_eq!(result.relative_pose, [0.0; 16]);
        assert!(result.image_path.is_absolute());
        assert!(result.image_path.exists());
        assert_eq!(std::fs::read(&result.depth_path).unwrap(), vec![0xE8, 0x03, 0xD0, 0x07]);
        assert_eq!(pipeline.capture_state(), SlotState::Idle);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_capture_pose_relative_to_anchor() {
        let (pipeline, dir) = pipeline();
        let anchor_pose = Pose::new(Quat::from_rotation_y(0.5), Vec3::new(1.0, 0.0, -2.0));
        let mut pipeline = pipeline.with_anchor(Box::new(TestAnchor {
            pose: anchor_pose,
            detached: Arc::new(AtomicUsize::new(0)),
        }));
        let camera = Pose::new(Quat::from_rotation_x(-0.3), Vec3::new(0.0, 1.5, 0.0));
        let mut frame = ScriptedFrame::new(camera, Vec::new());

        let mut reply = pipeline.requests.capture.request();
        pipeline.service(&mut frame, (640, 480));
        let result = reply.try_recv().unwrap().unwrap();

        let expected = anchor_pose.inverse().compose(&camera).to_mat4();
        let got = Mat4::from_cols_array(&result.relative_pose.map(|v| v as f32)).transpose();
        assert!(got.abs_diff_eq(expected, 1e-5));
        // row-major: translation in the last column
        assert_eq!(result.relative_pose[15], 1.0);
        assert!((result.relative_pose[3] as f32 - expected.w_axis.x).abs() < 1e-5);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_capture_failure_is_reported_and_slot_resets() {
        let (mut pipeline, dir) = pipeline();
        let mut frame = ScriptedFrame::new(Pose::IDENTITY, Vec::new());
        frame.fail_color = true;

        let mut reply = pipeline.requests.capture.request();
        pipeline.service(&mut frame, (640, 480));
        let err = reply.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, CaptureError::ImageAcquisition(_)));
        assert_eq!(err.code(), "CAPTURE_FAILED");
        assert_eq!(pipeline.capture_state(), SlotState::Idle);

        frame.fail_color = false;
        let mut retry = pipeline.requests.capture.request();
        pipeline.service(&mut frame, (640, 480));
        assert!(retry.try_recv().unwrap().is_ok());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_idle_tick_touches_nothing() {
        let (mut pipeline, dir) = pipeline();
        let mut frame = ScriptedFrame::new(Pose::IDENTITY, Vec::new());
        pipeline.service(&mut frame, (640, 480));
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_shutdown_resolves_pending_and_detaches() {
        let (pipeline, dir) = pipeline();
        let detached = Arc::new(AtomicUsize::new(0));
        let mut pipeline = pipeline.with_anchor(Box::new(TestAnchor {
            pose: Pose::IDENTITY,
            detached: detached.clone(),
        }));
        let mut anchor_reply = pipeline.requests.anchor.request();
        let mut capture_reply = pipeline.requests.capture.request();

        pipeline.shutdown();
        pipeline.shutdown();

        assert_eq!(anchor_reply.try_recv(), Ok(false));
        assert_eq!(capture_reply.try_recv(), Ok(Err(CaptureError::Disposed)));
        assert_eq!(detached.load(Ordering::SeqCst), 1);
        assert!(!pipeline.has_anchor());
        std::fs::remove_dir_all(&dir).ok();
    }
}
