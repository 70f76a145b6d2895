// SPDX-License-Identifier: GPL-3.0-only

//! Raw depth dump inspection
//!
//! Depth dumps carry no header: just 16-bit millimeter samples in native byte
//! order. The resolution is recovered by matching the sample count against
//! the resolutions depth sensors commonly produce, falling back to a 4:3
//! estimate for anything else.

pub mod point_cloud;

pub use point_cloud::{CameraIntrinsics, ColoredPoint, PointCloud, ReconstructOptions};

use crate::constants::{COMMON_DEPTH_RESOLUTIONS, DEPTH_MAX_VALID_MM};
use crate::errors::{AppError, AppResult};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// A decoded depth dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthMap {
    pub width: u32,
    pub height: u32,
    /// Row-major millimeter samples
    pub samples: Vec<u16>,
}

impl DepthMap {
    /// Decode a headerless dump, guessing its resolution
    pub fn from_bytes(bytes: &[u8]) -> AppResult<Self> {
        if bytes.len() % 2 != 0 {
            return Err(AppError::Other(format!(
                "Depth dump has odd length {}; expected 16-bit samples",
                bytes.len()
            )));
        }
        let samples: Vec<u16> = bytemuck::pod_collect_to_vec(bytes);
        let (width, height) = guess_resolution(samples.len()).ok_or_else(|| {
            AppError::Other(format!(
                "Could not guess resolution for {} pixels",
                samples.len()
            ))
        })?;
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Read and decode a dump from disk
    pub fn load(path: &Path) -> AppResult<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| AppError::Storage(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(&bytes)
    }

    /// Sample at pixel `(x, y)`
    pub fn get(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

/// Summary of one depth dump
#[derive(Debug, Clone, PartialEq)]
pub struct DepthStats {
    pub width: u32,
    pub height: u32,
    /// Samples in range (non-zero, at most 5 m)
    pub valid: usize,
    pub min_mm: u16,
    pub max_mm: u16,
    pub mean_mm: f64,
    pub median_mm: f64,
    /// Population standard deviation
    pub std_dev_mm: f64,
}

impl DepthStats {
    /// Statistics over the valid samples of `map`
    pub fn from_map(map: &DepthMap) -> Self {
        let mut valid: Vec<u16> = map
            .samples
            .iter()
            .copied()
            .filter(|&mm| is_valid_depth(mm))
            .collect();
        valid.sort_unstable();

        let count = valid.len();
        let (min_mm, max_mm) = match (valid.first(), valid.last()) {
            (Some(&min), Some(&max)) => (min, max),
            _ => (0, 0),
        };

        let (mean_mm, median_mm, std_dev_mm) = if count == 0 {
            (0.0, 0.0, 0.0)
        } else {
            let mean = valid.iter().map(|&mm| mm as f64).sum::<f64>() / count as f64;
            let median = if count % 2 == 1 {
                valid[count / 2] as f64
            } else {
                (valid[count / 2 - 1] as f64 + valid[count / 2] as f64) / 2.0
            };
            let variance = valid
                .iter()
                .map(|&mm| {
                    let d = mm as f64 - mean;
                    d * d
                })
                .sum::<f64>()
                / count as f64;
            (mean, median, variance.sqrt())
        };

        Self {
            width: map.width,
            height: map.height,
            valid: count,
            min_mm,
            max_mm,
            mean_mm,
            median_mm,
            std_dev_mm,
        }
    }

    pub fn total(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Fraction of valid samples in 0.0..=1.0
    pub fn coverage(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.valid as f64 / total as f64,
        }
    }
}

impl fmt::Display for DepthStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Resolution: {}x{}", self.width, self.height)?;
        writeln!(
            f,
            "Valid pixels: {} / {} ({:.1}%)",
            self.valid,
            self.total(),
            self.coverage() * 100.0
        )?;
        if self.valid > 0 {
            writeln!(
                f,
                "Range: {:.3} m to {:.3} m",
                self.min_mm as f64 / 1000.0,
                self.max_mm as f64 / 1000.0
            )?;
            write!(
                f,
                "Mean: {:.3} m, median: {:.3} m, std dev: {:.3} m",
                self.mean_mm / 1000.0,
                self.median_mm / 1000.0,
                self.std_dev_mm / 1000.0
            )
        } else {
            write!(f, "Range: no valid samples")
        }
    }
}

/// Resolution for a dump of `pixels` samples
///
/// Known sensor resolutions win; otherwise a 4:3 frame is assumed and
/// accepted only if it accounts for every sample.
pub fn guess_resolution(pixels: usize) -> Option<(u32, u32)> {
    if let Some(known) = COMMON_DEPTH_RESOLUTIONS
        .iter()
        .copied()
        .find(|&(w, h)| w as usize * h as usize == pixels)
    {
        return Some(known);
    }

    let height = ((3 * pixels) as f64 / 4.0).sqrt() as usize;
    if height == 0 {
        return None;
    }
    let width = pixels / height;
    if width * height != pixels {
        return None;
    }
    warn!(pixels, width, height, "Unknown depth resolution, assuming 4:3");
    Some((u32::try_from(width).ok()?, u32::try_from(height).ok()?))
}

/// A depth sample counts if it is non-zero and within range
pub fn is_valid_depth(mm: u16) -> bool {
    mm != 0 && mm <= DEPTH_MAX_VALID_MM
}

/// Inspect an in-memory depth dump
pub fn inspect_bytes(bytes: &[u8]) -> AppResult<DepthStats> {
    let map = DepthMap::from_bytes(bytes)?;
    let stats = DepthStats::from_map(&map);
    debug!(
        width = stats.width,
        height = stats.height,
        valid = stats.valid,
        "Depth dump inspected"
    );
    Ok(stats)
}

/// Inspect a depth dump on disk
pub fn inspect(path: &Path) -> AppResult<DepthStats> {
    let map = DepthMap::load(path)?;
    Ok(DepthStats::from_map(&map))
}
