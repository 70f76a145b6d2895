// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Method channel the application shell talks to
pub const CHANNEL_NAME: &str = "com.example.app/ar";

/// Platform view type registered with the shell
pub const VIEW_TYPE: &str = "ar_view";

/// Method-channel operation names
pub mod methods {
    pub const PLACE_ANCHOR: &str = "placeAnchor";
    pub const CAPTURE_FRAME: &str = "captureFrame";
}

/// Artifact naming
pub mod artifacts {
    /// Color image filename prefix (`rgb_<millis>.jpg`)
    pub const COLOR_PREFIX: &str = "rgb";
    /// Color image extension
    pub const COLOR_EXTENSION: &str = "jpg";
    /// Depth dump filename prefix (`depth_<millis>.bin`)
    pub const DEPTH_PREFIX: &str = "depth";
    /// Depth dump extension
    pub const DEPTH_EXTENSION: &str = "bin";
    /// Session manifest consumed by offline reconstruction tools
    pub const MANIFEST_FILE: &str = "captures.json";
    /// Default point cloud written next to the manifest
    pub const POINT_CLOUD_FILE: &str = "point_cloud.las";
}

/// Default clip planes for the camera projection (meters)
pub const DEFAULT_NEAR_PLANE: f32 = 0.1;
pub const DEFAULT_FAR_PLANE: f32 = 100.0;

/// Maximum JPEG quality, used for captures by default
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Background clear color (dark gray)
pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

/// Marker color (opaque green)
pub const DEFAULT_MARKER_COLOR: [f32; 4] = [0.0, 1.0, 0.0, 1.0];

/// Marker half-extent along X and Z (1 cm wide prism)
pub const MARKER_HALF_WIDTH_M: f32 = 0.005;

/// Marker height along Y (20 cm tall prism)
pub const MARKER_HEIGHT_M: f32 = 0.2;

/// Render loop cadence (60 Hz display refresh)
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// Depth readings above this many millimeters are treated as invalid
pub const DEPTH_MAX_VALID_MM: u16 = 5000;

/// Depth resolutions commonly produced by mobile depth APIs
pub const COMMON_DEPTH_RESOLUTIONS: [(u32, u32); 6] = [
    (160, 120),
    (160, 90),
    (640, 360),
    (640, 480),
    (1280, 720),
    (192, 144),
];

/// Offline point cloud reconstruction
pub mod reconstruction {
    /// Vertical field of view assumed for depth back-projection (degrees)
    pub const DEFAULT_VERTICAL_FOV_DEG: f64 = 60.0;
    /// Voxel edge used to thin merged clouds (meters)
    pub const DEFAULT_VOXEL_SIZE_M: f64 = 0.005;
    /// LAS coordinate precision (1 mm)
    pub const LAS_SCALE: f64 = 0.001;
}
