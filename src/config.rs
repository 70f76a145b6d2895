// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON at `<config dir>/ar-capture/config.json`. Every field has a
//! default, so a partial file only overrides what it names.

use crate::constants;
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Application directory name under the platform config/cache roots
const APP_DIR: &str = "ar-capture";

/// Configuration file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    /// Directory for captured artifacts (defaults to the platform cache dir)
    pub cache_dir: Option<PathBuf>,
    /// JPEG quality for color captures (1-100)
    pub jpeg_quality: u8,
    /// Near clip plane in meters
    pub near_plane: f32,
    /// Far clip plane in meters
    pub far_plane: f32,
    /// Color buffer clear color (RGBA)
    pub clear_color: [f32; 4],
    /// Anchor marker color (RGBA)
    pub marker_color: [f32; 4],
    /// Request raw depth when the device supports it
    pub prefer_raw_depth: bool,
    /// Continuous auto-focus instead of fixed focus
    pub auto_focus: bool,
    /// Append every successful capture to `captures.json`
    pub write_manifest: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: None,
            jpeg_quality: constants::MAX_JPEG_QUALITY,
            near_plane: constants::DEFAULT_NEAR_PLANE,
            far_plane: constants::DEFAULT_FAR_PLANE,
            clear_color: constants::DEFAULT_CLEAR_COLOR,
            marker_color: constants::DEFAULT_MARKER_COLOR,
            prefer_raw_depth: true,
            auto_focus: true,
            write_manifest: true,
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from an explicit path; a missing file yields the defaults
    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write to an explicit path, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> AppResult<()> {
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(AppError::Config(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if !(self.near_plane > 0.0 && self.far_plane > self.near_plane) {
            return Err(AppError::Config(format!(
                "clip planes must satisfy 0 < near < far, got near={} far={}",
                self.near_plane, self.far_plane
            )));
        }
        Ok(())
    }

    /// Resolved artifact directory
    pub fn artifact_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR)
        })
    }
}
