// SPDX-License-Identifier: GPL-3.0-only

//! Deterministic scene for the synthetic engine
//!
//! A horizontal floor with one detected square plane on it, watched by a
//! camera orbiting at a fixed height. Everything is a pure function of the
//! frame index, so any frame's pose, images and hit results can be recomputed
//! after the fact.

use crate::backends::{
    DepthImage, DisplayRotation, HitResult, ImagePlane, Plane, Trackable, YuvImage,
};
use crate::math::Pose;
use glam::{Vec2, Vec3};

/// Time between two synthetic frames (30 fps)
pub const FRAME_INTERVAL_NS: i64 = 33_333_333;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticScene {
    /// Center of the detected plane; the floor is the plane y = center.y
    pub plane_center: Vec3,
    /// Half side length of the detected square polygon (meters)
    pub plane_half_extent: f32,
    /// Orbit radius around `look_at` in the XZ plane; must be non-zero
    pub orbit_radius: f32,
    /// Camera height above the floor
    pub orbit_height: f32,
    /// Orbit advance per frame (radians)
    pub orbit_step: f32,
    /// Point the camera looks at
    pub look_at: Vec3,
    /// Vertical field of view (radians)
    pub vertical_fov: f32,
    /// Camera image size
    pub image_size: (u32, u32),
    /// Depth image size
    pub depth_size: (u32, u32),
    /// Extra bytes at the end of every image row
    pub row_padding: usize,
    /// Report a feature-point hit in front of every plane hit
    pub stray_point: bool,
}

impl Default for SyntheticScene {
    fn default() -> Self {
        Self {
            plane_center: Vec3::ZERO,
            plane_half_extent: 1.0,
            orbit_radius: 1.5,
            orbit_height: 1.2,
            orbit_step: 0.01,
            look_at: Vec3::ZERO,
            vertical_fov: 60f32.to_radians(),
            image_size: (64, 48),
            depth_size: (160, 120),
            row_padding: 8,
            stray_point: false,
        }
    }
}

impl SyntheticScene {
    pub fn timestamp_ns(frame_index: u64) -> i64 {
        frame_index as i64 * FRAME_INTERVAL_NS
    }

    pub fn frame_index_for_timestamp(timestamp_ns: i64) -> u64 {
        (timestamp_ns / FRAME_INTERVAL_NS) as u64
    }

    /// World pose of the camera at `frame_index`
    pub fn camera_pose(&self, frame_index: u64) -> Pose {
        let angle = self.orbit_step * frame_index as f32;
        let eye = Vec3::new(
            self.look_at.x + self.orbit_radius * angle.cos(),
            self.plane_center.y + self.orbit_height,
            self.look_at.z + self.orbit_radius * angle.sin(),
        );
        Pose::looking_at(eye, self.look_at, Vec3::Y)
    }

    /// The detected plane
    pub fn plane(&self) -> Plane {
        let e = self.plane_half_extent;
        Plane {
            center_pose: Pose::from_translation(self.plane_center),
            polygon: vec![
                Vec2::new(-e, -e),
                Vec2::new(e, -e),
                Vec2::new(e, e),
                Vec2::new(-e, e),
            ],
        }
    }

    /// World-space ray direction through normalized device coordinates
    fn ray(&self, camera: &Pose, ndc: Vec2, aspect: f32) -> Vec3 {
        let tan = (self.vertical_fov * 0.5).tan();
        let local = Vec3::new(ndc.x * tan * aspect, ndc.y * tan, -1.0);
        camera.transform_vector(local).normalize()
    }

    /// Distance along a unit ray to the floor, if it is hit in front
    fn floor_distance(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        if direction.y.abs() < 1e-6 {
            return None;
        }
        let t = (self.plane_center.y - origin.y) / direction.y;
        (t > 0.0).then_some(t)
    }

    /// Hits for a viewport pixel, nearest first
    pub fn hit_test(&self, camera: &Pose, x: f32, y: f32, viewport: (u32, u32)) -> Vec<HitResult> {
        let (width, height) = viewport;
        if width == 0 || height == 0 {
            return Vec::new();
        }
        let ndc = Vec2::new(
            2.0 * x / width as f32 - 1.0,
            1.0 - 2.0 * y / height as f32,
        );
        let aspect = width as f32 / height as f32;
        let origin = camera.translation();
        let direction = self.ray(camera, ndc, aspect);

        let Some(distance) = self.floor_distance(origin, direction) else {
            return Vec::new();
        };

        let mut hits = Vec::with_capacity(2);
        if self.stray_point {
            let near = distance * 0.5;
            hits.push(HitResult {
                hit_pose: Pose::from_translation(origin + direction * near),
                distance: near,
                trackable: Trackable::Point,
            });
        }
        hits.push(HitResult {
            // plane hits are oriented with +Y along the plane normal
            hit_pose: Pose::from_translation(origin + direction * distance),
            distance,
            trackable: Trackable::Plane(self.plane()),
        });
        hits
    }

    /// Camera image for a frame: three planes with padded rows and
    /// interleaved chroma (pixel stride 2)
    pub fn camera_image(&self, frame_index: u64) -> YuvImage {
        let (width, height) = self.image_size;
        let (w, h) = (width as usize, height as usize);
        let shift = frame_index as usize;

        let y_stride = w + self.row_padding;
        let mut luma = vec![0u8; y_stride * h];
        for row in 0..h {
            for col in 0..w {
                luma[row * y_stride + col] = (16 + (col * 3 + row * 5 + shift) % 220) as u8;
            }
        }

        // U V U V ... per chroma row, both planes views into the same layout
        let uv_stride = w + self.row_padding;
        let mut chroma = vec![0u8; uv_stride * (h / 2)];
        for row in 0..h / 2 {
            for col in 0..w / 2 {
                let offset = row * uv_stride + col * 2;
                chroma[offset] = (96 + (col + shift) % 64) as u8;
                chroma[offset + 1] = (96 + (row + shift) % 64) as u8;
            }
        }

        YuvImage {
            width,
            height,
            planes: [
                ImagePlane::new(luma, y_stride, 1),
                ImagePlane::new(chroma.clone(), uv_stride, 2),
                ImagePlane::new(chroma[1..].to_vec(), uv_stride, 2),
            ],
            timestamp_ns: Self::timestamp_ns(frame_index),
        }
    }

    /// Raw depth for a frame: camera-space Z distance to the floor in
    /// millimeters, 0 where the floor is not visible
    pub fn depth_image(&self, frame_index: u64) -> DepthImage {
        let camera = self.camera_pose(frame_index);
        let (width, height) = self.depth_size;
        let aspect = width as f32 / height as f32;
        let origin = camera.translation();
        let forward = camera.transform_vector(Vec3::NEG_Z);

        let mut samples = Vec::with_capacity(width as usize * height as usize);
        for row in 0..height {
            for col in 0..width {
                let ndc = Vec2::new(
                    (col as f32 + 0.5) / width as f32 * 2.0 - 1.0,
                    1.0 - (row as f32 + 0.5) / height as f32 * 2.0,
                );
                let direction = self.ray(&camera, ndc, aspect);
                let mm = self
                    .floor_distance(origin, direction)
                    .map(|t| (t * direction.dot(forward) * 1000.0).round())
                    .map(|mm| mm.clamp(0.0, u16::MAX as f32) as u16)
                    .unwrap_or(0);
                samples.push(mm);
            }
        }

        let bytes: Vec<u8> = bytemuck::cast_slice(&samples).to_vec();
        DepthImage {
            width,
            height,
            plane: ImagePlane::new(bytes, width as usize * 2, 2),
            timestamp_ns: Self::timestamp_ns(frame_index),
        }
    }
}

/// Rotate normalized display UVs into camera texture UVs
pub fn rotate_uvs(rotation: DisplayRotation, uvs: &[f32; 8]) -> [f32; 8] {
    let mut out = [0.0; 8];
    for (src, dst) in uvs.chunks_exact(2).zip(out.chunks_exact_mut(2)) {
        let (u, v) = (src[0], src[1]);
        let (tu, tv) = match rotation {
            DisplayRotation::Rotate0 => (u, v),
            DisplayRotation::Rotate90 => (v, 1.0 - u),
            DisplayRotation::Rotate180 => (1.0 - u, 1.0 - v),
            DisplayRotation::Rotate270 => (1.0 - v, u),
        };
        dst[0] = tu;
        dst[1] = tv;
    }
    out
}
