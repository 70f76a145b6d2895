// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use ar_capture::constants::{self, artifacts, methods};

#[test]
fn test_method_names_match_channel_protocol() {
    assert_eq!(methods::PLACE_ANCHOR, "placeAnchor");
    assert_eq!(methods::CAPTURE_FRAME, "captureFrame");
    assert_eq!(constants::CHANNEL_NAME, "com.example.app/ar");
}

#[test]
fn test_artifact_names() {
    assert_eq!(artifacts::COLOR_EXTENSION, "jpg");
    assert_eq!(artifacts::DEPTH_EXTENSION, "bin");
    assert_ne!(artifacts::COLOR_PREFIX, artifacts::DEPTH_PREFIX);
}

#[test]
fn test_clip_planes_ordered() {
    assert!(constants::DEFAULT_NEAR_PLANE > 0.0);
    assert!(constants::DEFAULT_FAR_PLANE > constants::DEFAULT_NEAR_PLANE);
}
