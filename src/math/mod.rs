// SPDX-License-Identifier: GPL-3.0-only

//! Geometry helpers shared by the tracking, rendering and capture code

pub mod pose;

pub use pose::Pose;

use glam::Vec2;

/// Even-odd point-in-polygon test on the XZ plane.
///
/// `polygon` vertices are in order (either winding); fewer than three vertices
/// never contain anything.
pub fn polygon_contains(polygon: &[Vec2], point: Vec2) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
