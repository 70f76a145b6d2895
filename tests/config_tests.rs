// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use ar_capture::Config;
use ar_capture::errors::AppError;

fn scratch_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("ar-capture-config-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(
        config.jpeg_quality, 100,
        "Captures should be encoded at maximum quality by default"
    );
    assert!(config.prefer_raw_depth, "Raw depth should be preferred");
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = scratch_dir();
    let config = Config::load_from(&dir.join("absent.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_partial_file_overrides_only_named_fields() {
    let dir = scratch_dir();
    let path = dir.join("config.json");
    std::fs::write(&path, r#"{ "jpeg_quality": 90, "write_manifest": false }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.jpeg_quality, 90);
    assert!(!config.write_manifest);
    assert_eq!(config.far_plane, Config::default().far_plane);
}

#[test]
fn test_save_and_reload() {
    let dir = scratch_dir();
    let path = dir.join("nested").join("config.json");
    let mut config = Config::default();
    config.cache_dir = Some(dir.join("artifacts"));
    config.marker_color = [1.0, 0.0, 0.0, 1.0];

    config.save_to(&path).unwrap();
    assert_eq!(Config::load_from(&path).unwrap(), config);
    assert_eq!(config.artifact_dir(), dir.join("artifacts"));
}

#[test]
fn test_invalid_values_rejected() {
    let dir = scratch_dir();
    let path = dir.join("config.json");
    std::fs::write(&path, r#"{ "near_plane": 5.0, "far_plane": 1.0 }"#).unwrap();
    assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));

    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));
}
