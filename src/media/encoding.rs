// SPDX-License-Identifier: GPL-3.0-only

//! Capture artifact encoding

use crate::backends::DepthImage;
use crate::errors::CaptureError;
use image::RgbImage;
use tracing::debug;

use super::yuv::nv21_to_rgb;

/// Encode an RGB image as JPEG
///
/// Quality is clamped into 1..=100.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = Vec::new();
    {
        let mut cursor = std::io::Cursor::new(&mut buffer);
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
            &mut cursor,
            quality.clamp(1, 100),
        );

        encoder
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| CaptureError::Encoding(format!("JPEG encoding failed: {}", e)))?;
    }

    debug!(
        width = image.width(),
        height = image.height(),
        quality,
        size = buffer.len(),
        "JPEG encoded"
    );
    Ok(buffer)
}

/// Encode an NV21 buffer as JPEG
pub fn encode_nv21_jpeg(
    nv21: &[u8],
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Vec<u8>, CaptureError> {
    let rgb = nv21_to_rgb(nv21, width, height)?;
    encode_jpeg(&rgb, quality)
}

/// Raw depth dump: the first plane's bytes as delivered, no header
pub fn depth_dump(depth: &DepthImage) -> Vec<u8> {
    depth.plane.data.to_vec()
}
