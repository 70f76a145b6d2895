// SPDX-License-Identifier: GPL-3.0-only

//! Rigid 6-DoF pose (rotation + translation)

use glam::{Mat4, Quat, Vec3};

/// A rigid transform from a local frame into world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    rotation: Quat,
    translation: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
    };

    pub fn new(rotation: Quat, translation: Vec3) -> Self {
        Self {
            rotation: rotation.normalize(),
            translation,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            rotation: Quat::IDENTITY,
            translation,
        }
    }

    /// Pose located at `eye` whose -Z axis points at `target` (camera convention).
    pub fn looking_at(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        // look_at_rh builds the world-to-camera view; invert it for the camera pose
        let view = Mat4::look_at_rh(eye, target, up);
        let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
        Self::new(rotation, eye)
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    pub fn inverse(&self) -> Self {
        let inv_rotation = self.rotation.inverse();
        Self {
            rotation: inv_rotation,
            translation: -(inv_rotation * self.translation),
        }
    }

    /// `self ∘ other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &Pose) -> Self {
        Self {
            rotation: (self.rotation * other.rotation).normalize(),
            translation: self.rotation * other.translation + self.translation,
        }
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }

    /// Column-major 4×4, the layout shaders and GL-style uniforms expect.
    pub fn to_column_major(&self) -> [f32; 16] {
        self.to_mat4().to_cols_array()
    }

    /// Row-major 4×4 widened to f64, the layout of the capture reply.
    pub fn to_row_major_f64(&self) -> [f64; 16] {
        let rows = self.to_mat4().transpose().to_cols_array();
        rows.map(f64::from)
    }

    /// Pose of `self` expressed in the frame of `reference`.
    pub fn relative_to(&self, reference: &Pose) -> Self {
        reference.inverse().compose(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn assert_vec_close(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-5, "{a:?} != {b:?}");
    }

    #[test]
    fn test_inverse_composes_to_identity() {
        let pose = Pose::new(Quat::from_rotation_y(0.7), Vec3::new(1.0, 2.0, -3.0));
        let identity = pose.compose(&pose.inverse());
        assert_vec_close(identity.translation(), Vec3::ZERO);
        assert!(identity.rotation().abs_diff_eq(Quat::IDENTITY, 1e-5));
    }

    #[test]
    fn test_compose_order() {
        let rotate = Pose::new(Quat::from_rotation_y(FRAC_PI_2), Vec3::ZERO);
        let shift = Pose::from_translation(Vec3::X);
        // shift first, then rotate 90° about Y: +X maps to -Z
        assert_vec_close(rotate.compose(&shift).transform_point(Vec3::ZERO), -Vec3::Z);
        // rotate first, then shift
        assert_vec_close(shift.compose(&rotate).transform_point(Vec3::ZERO), Vec3::X);
    }

    #[test]
    fn test_row_major_layout_has_translation_in_last_column() {
        let pose = Pose::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let m = pose.to_row_major_f64();
        assert_eq!([m[3], m[7], m[11], m[15]], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!([m[12], m[13], m[14]], [0.0, 0.0, 0.0]);

        let c = pose.to_column_major();
        assert_eq!([c[12], c[13], c[14], c[15]], [1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_relative_to() {
        let anchor = Pose::new(Quat::from_rotation_y(FRAC_PI_2), Vec3::new(0.0, 0.0, -1.0));
        let camera = Pose::from_translation(Vec3::new(0.0, 1.0, 0.0));
        let relative = camera.relative_to(&anchor);
        // relative maps camera-local points into anchor space
        let world = camera.transform_point(Vec3::ZERO);
        assert_vec_close(anchor.transform_point(relative.transform_point(Vec3::ZERO)), world);
    }

    #[test]
    fn test_looking_at_faces_target() {
        let pose = Pose::looking_at(Vec3::new(0.0, 1.0, 2.0), Vec3::ZERO, Vec3::Y);
        let forward = pose.transform_vector(-Vec3::Z);
        let expected = (Vec3::ZERO - Vec3::new(0.0, 1.0, 2.0)).normalize();
        assert_vec_close(forward, expected);
    }
}
