// SPDX-License-Identifier: GPL-3.0-only

//! Colored point cloud reconstruction
//!
//! Rebuilds a session offline from its `captures.json` manifest. Each depth
//! dump is back-projected with pinhole intrinsics derived from an assumed
//! vertical field of view, colored from its JPEG resized to the depth
//! resolution, and moved into the anchor frame by the capture's relative
//! pose. Every capture lands in one merged cloud, written as LAS (or LAZ
//! when the output path ends in `.laz`).

use super::{DepthMap, is_valid_depth};
use crate::constants::{artifacts, reconstruction};
use crate::errors::{AppError, AppResult};
use crate::storage::{self, ManifestEntry};
use glam::{DMat4, DVec3};
use image::RgbImage;
use image::imageops::FilterType;
use las::{Builder, Color, Point, Writer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Pinhole intrinsics in depth-image pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Square pixels, principal point at the image center
    pub fn from_vertical_fov(width: u32, height: u32, fov_degrees: f64) -> Self {
        let focal = height as f64 / (2.0 * (fov_degrees.to_radians() / 2.0).tan());
        Self {
            fx: focal,
            fy: focal,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
        }
    }

    /// Camera-space point for a depth pixel
    ///
    /// Same convention as the tracked camera pose: +Y up, looking down -Z.
    pub fn back_project(&self, x: u32, y: u32, depth_mm: u16) -> DVec3 {
        let z = depth_mm as f64 / 1000.0;
        DVec3::new(
            (x as f64 - self.cx) * z / self.fx,
            -((y as f64 - self.cy) * z / self.fy),
            -z,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColoredPoint {
    pub position: DVec3,
    pub color: [u8; 3],
}

/// Reconstruction settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconstructOptions {
    /// Vertical field of view assumed for every capture (degrees)
    pub vertical_fov_deg: f64,
    /// Voxel edge for thinning the merged cloud; `None` keeps every point
    pub voxel_size: Option<f64>,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            vertical_fov_deg: reconstruction::DEFAULT_VERTICAL_FOV_DEG,
            voxel_size: Some(reconstruction::DEFAULT_VOXEL_SIZE_M),
        }
    }
}

/// Row-major relative pose as a matrix; `None` for the all-zero pose of a
/// capture taken without an anchor
pub fn pose_matrix(relative_pose: &[f64; 16]) -> Option<DMat4> {
    if relative_pose.iter().all(|&v| v == 0.0) {
        return None;
    }
    Some(DMat4::from_cols_array(relative_pose).transpose())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    points: Vec<ColoredPoint>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back-project every valid depth sample, colored from `color`
    ///
    /// `color` is resized to the depth resolution first.
    pub fn from_depth(depth: &DepthMap, color: &RgbImage, intrinsics: &CameraIntrinsics) -> Self {
        let color = if color.dimensions() == (depth.width, depth.height) {
            color.clone()
        } else {
            image::imageops::resize(color, depth.width, depth.height, FilterType::CatmullRom)
        };

        let mut points = Vec::new();
        for y in 0..depth.height {
            for x in 0..depth.width {
                let Some(mm) = depth.get(x, y).filter(|&mm| is_valid_depth(mm)) else {
                    continue;
                };
                let rgb = color.get_pixel_checked(x, y).map_or([128; 3], |p| p.0);
                points.push(ColoredPoint {
                    position: intrinsics.back_project(x, y, mm),
                    color: rgb,
                });
            }
        }
        Self { points }
    }

    pub fn points(&self) -> &[ColoredPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn push(&mut self, point: ColoredPoint) {
        self.points.push(point);
    }

    pub fn extend(&mut self, other: PointCloud) {
        self.points.extend(other.points);
    }

    /// Apply a rigid transform to every point
    pub fn transform(&mut self, matrix: &DMat4) {
        for point in &mut self.points {
            point.position = matrix.transform_point3(point.position);
        }
    }

    /// Axis-aligned bounds as `(min, max)`
    pub fn bounds(&self) -> Option<(DVec3, DVec3)> {
        let first = self.points.first()?.position;
        Some(self.points.iter().fold((first, first), |(min, max), p| {
            (min.min(p.position), max.max(p.position))
        }))
    }

    /// Replace the points in each voxel by their centroid and mean color
    pub fn voxel_downsample(&self, voxel_size: f64) -> PointCloud {
        if voxel_size <= 0.0 {
            return self.clone();
        }

        let mut voxels: BTreeMap<(i64, i64, i64), (DVec3, [u32; 3], u32)> = BTreeMap::new();
        for point in &self.points {
            let cell = (point.position / voxel_size).floor();
            let key = (cell.x as i64, cell.y as i64, cell.z as i64);
            let entry = voxels.entry(key).or_insert((DVec3::ZERO, [0; 3], 0));
            entry.0 += point.position;
            for (sum, channel) in entry.1.iter_mut().zip(point.color) {
                *sum += channel as u32;
            }
            entry.2 += 1;
        }

        let points = voxels
            .into_values()
            .map(|(sum, color, count)| ColoredPoint {
                position: sum / count as f64,
                color: color.map(|c| (c as f64 / count as f64).round() as u8),
            })
            .collect();
        PointCloud { points }
    }

    /// Write the cloud with per-point color
    pub fn write_las(&self, path: &Path) -> AppResult<()> {
        let Some((min, max)) = self.bounds() else {
            return Err(AppError::Export("No valid depth points to export".into()));
        };

        info!(
            point_count = self.len(),
            path = %path.display(),
            "Exporting point cloud"
        );

        let mut builder = Builder::from((1, 4)); // LAS 1.4
        builder.point_format.has_color = true;
        builder.point_format.is_compressed = is_laz(path);

        let scale = reconstruction::LAS_SCALE;
        let center = (min + max) / 2.0;
        builder.transforms = las::Vector {
            x: las::Transform {
                scale,
                offset: center.x,
            },
            y: las::Transform {
                scale,
                offset: center.y,
            },
            z: las::Transform {
                scale,
                offset: center.z,
            },
        };

        let header = builder
            .into_header()
            .map_err(|e| AppError::Export(format!("Failed to build LAS header: {}", e)))?;
        let mut writer = Writer::from_path(path, header)
            .map_err(|e| AppError::Export(format!("Failed to create LAS writer: {}", e)))?;

        for point in &self.points {
            let [r, g, b] = point.color.map(|c| c as u16 * 256);
            writer
                .write_point(Point {
                    x: point.position.x,
                    y: point.position.y,
                    z: point.position.z,
                    color: Some(Color::new(r, g, b)),
                    ..Default::default()
                })
                .map_err(|e| AppError::Export(format!("Failed to write point: {}", e)))?;
        }

        writer
            .close()
            .map_err(|e| AppError::Export(format!("Failed to close LAS file: {}", e)))?;

        debug!(path = %path.display(), "LAS export complete");
        Ok(())
    }
}

fn is_laz(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("laz"))
}

/// Merged cloud of a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionCloud {
    pub cloud: PointCloud,
    /// Captures that contributed points
    pub frames_used: usize,
    /// Captures skipped (missing files, unreadable depth, no anchor pose)
    pub frames_skipped: usize,
}

/// Locate an artifact recorded in the manifest
///
/// Recorded paths are absolute on the capturing device; a copied session
/// directory is searched by file name first.
fn resolve_artifact(session_dir: &Path, recorded: &Path) -> AppResult<PathBuf> {
    if let Some(name) = recorded.file_name() {
        let local = session_dir.join(name);
        if local.exists() {
            return Ok(local);
        }
    }
    if recorded.exists() {
        return Ok(recorded.to_path_buf());
    }
    Err(AppError::Export(format!(
        "Missing artifact {}",
        recorded.display()
    )))
}

/// Points of one capture, in the anchor frame
pub fn capture_cloud(
    session_dir: &Path,
    entry: &ManifestEntry,
    options: &ReconstructOptions,
) -> AppResult<PointCloud> {
    let result = &entry.result;
    let pose = pose_matrix(&result.relative_pose)
        .ok_or_else(|| AppError::Export("Capture has no anchor pose".into()))?;

    let depth = DepthMap::load(&resolve_artifact(session_dir, &result.depth_path)?)?;
    let image_path = resolve_artifact(session_dir, &result.image_path)?;
    let color = image::open(&image_path)
        .map_err(|e| AppError::Export(format!("{}: {}", image_path.display(), e)))?
        .to_rgb8();

    let intrinsics =
        CameraIntrinsics::from_vertical_fov(depth.width, depth.height, options.vertical_fov_deg);
    let mut cloud = PointCloud::from_depth(&depth, &color, &intrinsics);
    cloud.transform(&pose);
    Ok(cloud)
}

/// Merge every capture listed in `<session_dir>/captures.json`
///
/// Captures that cannot be used are logged and skipped.
pub fn reconstruct_session(
    session_dir: &Path,
    options: &ReconstructOptions,
) -> AppResult<SessionCloud> {
    let manifest_path = session_dir.join(artifacts::MANIFEST_FILE);
    let manifest = storage::read_manifest(&manifest_path)?;
    if manifest.is_empty() {
        return Err(AppError::Export(format!(
            "No captures listed in {}",
            manifest_path.display()
        )));
    }
    info!(captures = manifest.len(), "Reconstructing session");

    let mut session = SessionCloud::default();
    for (index, entry) in manifest.iter().enumerate() {
        match capture_cloud(session_dir, entry, options) {
            Ok(cloud) => {
                debug!(index, points = cloud.len(), "Capture back-projected");
                session.cloud.extend(cloud);
                session.frames_used += 1;
            }
            Err(e) => {
                warn!(index, error = %e, "Skipping capture");
                session.frames_skipped += 1;
            }
        }
    }

    if let Some(size) = options.voxel_size {
        let before = session.cloud.len();
        session.cloud = session.cloud.voxel_downsample(size);
        debug!(before, after = session.cloud.len(), voxel_size = size, "Cloud downsampled");
    }
    Ok(session)
}

/// Reconstruct a session and write it to `output`
pub fn export_session(
    session_dir: &Path,
    output: &Path,
    options: &ReconstructOptions,
) -> AppResult<SessionCloud> {
    let session = reconstruct_session(session_dir, options)?;
    session.cloud.write_las(output)?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_map(width: u32, height: u32, samples: &[(u32, u32, u16)]) -> DepthMap {
        let mut map = DepthMap {
            width,
            height,
            samples: vec![0; width as usize * height as usize],
        };
        for &(x, y, mm) in samples {
            map.samples[(y * width + x) as usize] = mm;
        }
        map
    }

    fn scratch() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ar-capture-cloud-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_intrinsics_from_sixty_degree_fov() {
        let k = CameraIntrinsics::from_vertical_fov(160, 120, 60.0);
        let expected = 120.0 / (2.0 * 30f64.to_radians().tan());
        assert!((k.fx - expected).abs() < 1e-9);
        assert_eq!(k.fx, k.fy);
        assert_eq!((k.cx, k.cy), (80.0, 60.0));
    }

    #[test]
    fn test_back_projection() {
        let k = CameraIntrinsics::from_vertical_fov(160, 120, 60.0);
        assert_eq!(k.back_project(80, 60, 2000), DVec3::new(0.0, 0.0, -2.0));

        // right of and below the principal point
        let p = k.back_project(90, 70, 1000);
        assert!((p.x - 10.0 / k.fx).abs() < 1e-12);
        assert!((p.y + 10.0 / k.fy).abs() < 1e-12);
        assert_eq!(p.z, -1.0);
    }

    #[test]
    fn test_invalid_depth_is_dropped() {
        let depth = depth_map(160, 90, &[(0, 0, 6000), (1, 0, 5000), (2, 0, 1)]);
        let color = RgbImage::from_pixel(160, 90, image::Rgb([10, 20, 30]));
        let k = CameraIntrinsics::from_vertical_fov(160, 90, 60.0);

        let cloud = PointCloud::from_depth(&depth, &color, &k);
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.points()[0].position.z, -5.0);
        assert_eq!(cloud.points()[1].position.z, -0.001);
    }

    #[test]
    fn test_color_resized_to_depth_resolution() {
        let depth = depth_map(160, 90, &[(159, 89, 1000)]);
        let color = RgbImage::from_pixel(16, 9, image::Rgb([200, 100, 50]));
        let k = CameraIntrinsics::from_vertical_fov(160, 90, 60.0);

        let cloud = PointCloud::from_depth(&depth, &color, &k);
        assert_eq!(cloud.points()[0].color, [200, 100, 50]);
    }

    #[test]
    fn test_pose_transform_is_row_major() {
        #[rustfmt::skip]
        let pose = [
            1.0, 0.0, 0.0, 0.5,
            0.0, 1.0, 0.0, 1.0,
            0.0, 0.0, 1.0, -2.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        let matrix = pose_matrix(&pose).unwrap();
        let mut cloud = PointCloud::new();
        cloud.push(ColoredPoint {
            position: DVec3::new(0.0, 0.0, -1.0),
            color: [0; 3],
        });
        cloud.transform(&matrix);
        assert_eq!(cloud.points()[0].position, DVec3::new(0.5, 1.0, -3.0));

        assert!(pose_matrix(&[0.0; 16]).is_none());
    }

    #[test]
    fn test_voxel_downsample_averages_cells() {
        let mut cloud = PointCloud::new();
        for (position, color) in [
            (DVec3::new(0.001, 0.001, 0.001), [0, 0, 0]),
            (DVec3::new(0.003, 0.003, 0.003), [100, 50, 10]),
            (DVec3::new(1.0, 1.0, 1.0), [255, 255, 255]),
        ] {
            cloud.push(ColoredPoint { position, color });
        }

        let thinned = cloud.voxel_downsample(0.005);
        assert_eq!(thinned.len(), 2);
        let merged = thinned.points()[0];
        assert!((merged.position - DVec3::splat(0.002)).length() < 1e-12);
        assert_eq!(merged.color, [50, 25, 5]);

        assert_eq!(cloud.voxel_downsample(0.0), cloud);
    }

    #[test]
    fn test_write_las_round_trip() {
        let dir = scratch();
        let path = dir.join("cloud.las");
        let mut cloud = PointCloud::new();
        cloud.push(ColoredPoint {
            position: DVec3::new(0.1, 0.2, -1.0),
            color: [255, 0, 0],
        });
        cloud.push(ColoredPoint {
            position: DVec3::new(-0.3, 0.0, -2.5),
            color: [0, 0, 255],
        });
        cloud.write_las(&path).unwrap();

        let mut reader = las::Reader::from_path(&path).unwrap();
        assert_eq!(reader.header().number_of_points(), 2);
        let points: Vec<Point> = reader.points().map(|p| p.unwrap()).collect();
        assert!((points[1].x + 0.3).abs() < 1e-3);
        assert!((points[1].z + 2.5).abs() < 1e-3);
        assert_eq!(points[0].color, Some(Color::new(255 * 256, 0, 0)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_cloud_not_written() {
        let dir = scratch();
        let path = dir.join("empty.las");
        assert!(matches!(
            PointCloud::new().write_las(&path),
            Err(AppError::Export(_))
        ));
        assert!(!path.exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_session_rejected() {
        let dir = scratch();
        assert!(matches!(
            reconstruct_session(&dir, &ReconstructOptions::default()),
            Err(AppError::Export(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }
}
