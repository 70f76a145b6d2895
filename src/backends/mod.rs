// SPDX-License-Identifier: GPL-3.0-only

//! Tracking backend abstraction
//!
//! The tracking engine (camera frames, 6-DoF pose, plane detection, anchors,
//! depth) is an external capability. This module defines the seam it plugs
//! into.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   TrackingRuntime   │  ← install check, session factory
//! └──────────┬──────────┘
//!            │ create_session()
//!            ▼
//! ┌─────────────────────┐
//! │   TrackingSession   │  ← configure / resume / geometry / update
//! └──────────┬──────────┘
//!            │ update()  (once per render tick)
//!            ▼
//! ┌─────────────────────┐
//! │    TrackedFrame     │  ← borrowed for one tick only
//! └─────────────────────┘
//! ```
//!
//! Frames borrow the session mutably, so a frame cannot outlive the tick that
//! produced it and images acquired from it always belong to that tick.

pub mod synthetic;
pub mod types;

pub use types::*;

use crate::errors::SessionResult;
use crate::gpu::TextureId;
use crate::math::Pose;
use glam::Mat4;

/// Entry point of a tracking engine
pub trait TrackingRuntime {
    type Session: TrackingSession;

    /// Ensure the tracking component is installed
    ///
    /// `user_requested` is true only until the first install prompt has been
    /// shown, so a declined prompt is not re-shown every tick.
    fn request_install(&mut self, user_requested: bool) -> SessionResult<InstallStatus>;

    /// Create a new, unconfigured session
    fn create_session(&mut self) -> SessionResult<Self::Session>;
}

/// A live tracking session; owned and used by the render thread only
pub trait TrackingSession {
    /// Capability query; must precede selecting a depth mode
    fn is_depth_mode_supported(&self, mode: DepthMode) -> bool;

    /// Apply a configuration (session must be paused or not yet resumed)
    fn configure(&mut self, config: &SessionConfig) -> SessionResult<()>;

    /// Start or restart the camera
    fn resume(&mut self) -> SessionResult<()>;

    /// Release the camera, keeping tracked state
    fn pause(&mut self);

    /// Release everything; the session is unusable afterwards
    fn close(&mut self);

    /// Inform the engine of the viewport size and display rotation
    fn set_display_geometry(&mut self, rotation: DisplayRotation, width: u32, height: u32);

    /// Texture the engine streams the camera image into
    fn set_camera_texture(&mut self, texture: TextureId);

    /// Advance by one frame
    fn update(&mut self) -> SessionResult<Box<dyn TrackedFrame + '_>>;
}

/// The frame produced by one `update()` call
pub trait TrackedFrame {
    /// Capture timestamp in nanoseconds
    fn timestamp_ns(&self) -> i64;

    fn tracking_state(&self) -> TrackingState;

    /// Camera pose in world space
    fn camera_pose(&self) -> Pose;

    /// World-to-camera transform
    fn view_matrix(&self) -> Mat4 {
        self.camera_pose().inverse().to_mat4()
    }

    /// Projection matching the current display geometry
    fn projection_matrix(&self, near: f32, far: f32) -> Mat4;

    /// Map four normalized display UVs (x, y pairs) to camera texture UVs
    ///
    /// Accounts for display rotation and the crop between the camera image
    /// aspect ratio and the viewport.
    fn transform_display_uv(&self, uvs: &[f32; 8]) -> [f32; 8];

    /// Ray cast from a viewport pixel; results nearest first
    fn hit_test(&self, x: f32, y: f32) -> Vec<HitResult>;

    /// Create an anchor fixed at the hit pose
    fn create_anchor(&mut self, hit: &HitResult) -> SessionResult<Box<dyn Anchor>>;

    /// CPU copy of this frame's camera image
    fn acquire_camera_image(&self) -> SessionResult<YuvImage>;

    /// This frame's raw 16-bit depth image
    fn acquire_raw_depth_image(&self) -> SessionResult<DepthImage>;
}

/// A world-fixed pose maintained by the tracking engine
pub trait Anchor {
    /// Current world pose
    fn pose(&self) -> Pose;

    fn tracking_state(&self) -> TrackingState;

    /// Stop tracking and release engine resources
    fn detach(&mut self);
}
