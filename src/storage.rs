// SPDX-License-Identifier: GPL-3.0-only

//! Capture artifact storage
//!
//! Artifacts land in one flat directory, named `<prefix>_<unix-millis>.<ext>`.
//! Successful captures can also be appended to a `captures.json` manifest so
//! an offline tool can pick up the whole session.

use crate::constants::artifacts;
use crate::errors::{AppError, AppResult};
use crate::pipeline::CaptureResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One manifest record
///
/// `relativePose` is stored row-major: translation sits at indices 3, 7 and
/// 11. Readers expecting a column-major matrix must transpose it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    #[serde(flatten)]
    pub result: CaptureResult,
    /// RFC 3339 wall-clock time of the capture
    pub captured_at: String,
}

/// Directory holding capture artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Open (and create) the artifact directory
    ///
    /// The stored path is absolute so every reported artifact path is too.
    pub fn open(dir: impl AsRef<Path>) -> AppResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| AppError::Storage(format!("{}: {}", dir.display(), e)))?;
        let dir = std::fs::canonicalize(dir)
            .map_err(|e| AppError::Storage(format!("{}: {}", dir.display(), e)))?;
        debug!(dir = %dir.display(), "Artifact store opened");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(artifacts::MANIFEST_FILE)
    }

    /// Timestamped artifact path; a numeric suffix is added if the name is taken
    pub fn artifact_path(&self, prefix: &str, extension: &str, millis: i64) -> PathBuf {
        let path = self.dir.join(format!("{}_{}.{}", prefix, millis, extension));
        if !path.exists() {
            return path;
        }
        (1u32..)
            .map(|n| {
                self.dir
                    .join(format!("{}_{}_{}.{}", prefix, millis, n, extension))
            })
            .find(|candidate| !candidate.exists())
            .unwrap_or(path)
    }

    /// Write `data` under a fresh timestamped name and return the path
    pub fn write_artifact(
        &self,
        prefix: &str,
        extension: &str,
        millis: i64,
        data: &[u8],
    ) -> std::io::Result<PathBuf> {
        let path = self.artifact_path(prefix, extension, millis);
        std::fs::write(&path, data)?;
        debug!(path = %path.display(), size = data.len(), "Artifact written");
        Ok(path)
    }

    /// Read all manifest entries; a missing manifest is empty
    pub fn read_manifest(&self) -> AppResult<Vec<ManifestEntry>> {
        read_manifest(&self.manifest_path())
    }

    /// Append one capture to the manifest
    pub fn append_manifest(&self, result: &CaptureResult) -> AppResult<()> {
        let path = self.manifest_path();
        let mut entries = match read_manifest(&path) {
            Ok(entries) => entries,
            Err(e) => {
                // Keep the unreadable file for inspection and start over
                warn!(path = %path.display(), error = %e, "Manifest unreadable, starting a new one");
                let backup = path.with_extension("json.bak");
                std::fs::rename(&path, &backup)?;
                Vec::new()
            }
        };

        entries.push(ManifestEntry {
            result: result.clone(),
            captured_at: chrono::Local::now().to_rfc3339(),
        });

        let text = serde_json::to_string_pretty(&entries)
            .map_err(|e| AppError::Storage(format!("manifest serialization: {}", e)))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &path)?;

        info!(path = %path.display(), count = entries.len(), "Manifest updated");
        Ok(())
    }
}

/// Read a manifest file
pub fn read_manifest(path: &Path) -> AppResult<Vec<ManifestEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| AppError::Storage(format!("{}: {}", path.display(), e)))
}

/// Current time as Unix milliseconds
pub fn unix_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
