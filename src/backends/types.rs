// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for tracking backends

use crate::math::{Pose, polygon_contains};
use glam::Vec2;
use std::sync::Arc;

/// Display rotation relative to the device's natural orientation
///
/// Pushed into the tracking session together with the viewport size so the
/// engine can rotate the camera image and UVs to match what is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayRotation {
    /// Natural orientation
    #[default]
    Rotate0,
    /// 90 degrees
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees
    Rotate270,
}

impl DisplayRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => DisplayRotation::Rotate90,
            180 => DisplayRotation::Rotate180,
            270 => DisplayRotation::Rotate270,
            _ => DisplayRotation::Rotate0,
        }
    }

    /// Create rotation from a platform rotation index (0..=3)
    pub fn from_index(index: u32) -> Self {
        Self::from_degrees((index % 4) as i32 * 90)
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            DisplayRotation::Rotate0 => 0,
            DisplayRotation::Rotate90 => 90,
            DisplayRotation::Rotate180 => 180,
            DisplayRotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, DisplayRotation::Rotate90 | DisplayRotation::Rotate270)
    }
}

impl std::fmt::Display for DisplayRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Outcome of asking the runtime to make the tracking component available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    /// Runtime present, sessions can be created
    Installed,
    /// An install flow was started; retry on a later tick
    InstallRequested,
}

/// Whether the engine is currently tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Tracking,
    Paused,
    Stopped,
}

/// Depth capability selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthMode {
    #[default]
    Disabled,
    /// Smoothed depth
    Automatic,
    /// Unsmoothed per-frame depth
    RawDepthOnly,
}

/// Camera focus behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusMode {
    #[default]
    Fixed,
    Auto,
}

/// Session configuration applied before resume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionConfig {
    pub depth_mode: DepthMode,
    pub focus_mode: FocusMode,
}

/// One plane of a planar image
#[derive(Clone)]
pub struct ImagePlane {
    /// Plane bytes starting at the first sample
    pub data: Arc<[u8]>,
    /// Bytes between the starts of two consecutive rows
    pub row_stride: usize,
    /// Bytes between two consecutive samples in a row
    pub pixel_stride: usize,
}

impl ImagePlane {
    pub fn new(data: impl Into<Arc<[u8]>>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data: data.into(),
            row_stride,
            pixel_stride,
        }
    }

    /// Bytes needed to address `rows` × `cols` samples with this plane's strides
    pub fn required_len(&self, cols: usize, rows: usize) -> usize {
        if cols == 0 || rows == 0 {
            return 0;
        }
        (rows - 1) * self.row_stride + (cols - 1) * self.pixel_stride + 1
    }
}

impl std::fmt::Debug for ImagePlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ImagePlane({} bytes, row_stride={}, pixel_stride={})",
            self.data.len(),
            self.row_stride,
            self.pixel_stride
        )
    }
}

/// Camera image in YUV 4:2:0 with three independent planes (Y, U, V)
#[derive(Debug, Clone)]
pub struct YuvImage {
    pub width: u32,
    pub height: u32,
    /// Planes in Y, U (Cb), V (Cr) order
    pub planes: [ImagePlane; 3],
    /// Frame timestamp in nanoseconds
    pub timestamp_ns: i64,
}

impl YuvImage {
    pub fn y_plane(&self) -> &ImagePlane {
        &self.planes[0]
    }

    pub fn u_plane(&self) -> &ImagePlane {
        &self.planes[1]
    }

    pub fn v_plane(&self) -> &ImagePlane {
        &self.planes[2]
    }
}

/// Raw 16-bit depth image (millimeters, native byte order)
#[derive(Debug, Clone)]
pub struct DepthImage {
    pub width: u32,
    pub height: u32,
    pub plane: ImagePlane,
    /// Frame timestamp in nanoseconds
    pub timestamp_ns: i64,
}

/// A detected planar surface
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    /// Plane center; local Y is the plane normal
    pub center_pose: Pose,
    /// Boundary polygon in the plane's local XZ coordinates
    pub polygon: Vec<Vec2>,
}

impl Plane {
    /// Whether `pose` projected onto the plane lies inside the detected polygon
    pub fn is_pose_in_polygon(&self, pose: &Pose) -> bool {
        let local = self
            .center_pose
            .inverse()
            .transform_point(pose.translation());
        polygon_contains(&self.polygon, Vec2::new(local.x, local.z))
    }
}

/// What a hit-test ray struck
#[derive(Debug, Clone, PartialEq)]
pub enum Trackable {
    /// A detected plane
    Plane(Plane),
    /// A single feature point
    Point,
    /// A sample from the depth map
    DepthPoint,
}

/// A single hit-test result; results arrive nearest first
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    pub hit_pose: Pose,
    pub distance: f32,
    pub trackable: Trackable,
}

impl HitResult {
    /// A hit on a plane, inside that plane's polygon
    pub fn is_in_plane_polygon(&self) -> bool {
        match &self.trackable {
            Trackable::Plane(plane) => plane.is_pose_in_polygon(&self.hit_pose),
            Trackable::Point | Trackable::DepthPoint => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(DisplayRotation::from_degrees(-90), DisplayRotation::Rotate270);
        assert_eq!(DisplayRotation::from_degrees(450), DisplayRotation::Rotate90);
        assert_eq!(DisplayRotation::from_index(2), DisplayRotation::Rotate180);
        assert!(DisplayRotation::Rotate270.swaps_dimensions());
        assert!(!DisplayRotation::Rotate180.swaps_dimensions());
    }

    #[test]
    fn test_required_len() {
        let plane = ImagePlane::new(vec![0u8; 16], 8, 2);
        // 3 samples per row, 2 rows: last sample at 8 + 4
        assert_eq!(plane.required_len(3, 2), 13);
        assert_eq!(plane.required_len(0, 2), 0);
    }

    #[test]
    fn test_hit_acceptance() {
        let plane = Plane {
            center_pose: Pose::from_translation(Vec3::new(0.0, 0.0, -1.0)),
            polygon: vec![
                Vec2::new(-0.5, -0.5),
                Vec2::new(0.5, -0.5),
                Vec2::new(0.5, 0.5),
                Vec2::new(-0.5, 0.5),
            ],
        };
        let inside = HitResult {
            hit_pose: Pose::from_translation(Vec3::new(0.2, 0.0, -1.2)),
            distance: 1.0,
            trackable: Trackable::Plane(plane.clone()),
        };
        let outside = HitResult {
            hit_pose: Pose::from_translation(Vec3::new(0.8, 0.0, -1.0)),
            ..inside.clone()
        };
        let point = HitResult {
            trackable: Trackable::Point,
            ..inside.clone()
        };

        assert!(inside.is_in_plane_polygon());
        assert!(!outside.is_in_plane_polygon());
        assert!(!point.is_in_plane_polygon());
    }
}
