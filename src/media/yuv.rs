// SPDX-License-Identifier: GPL-3.0-only

//! Planar YUV 4:2:0 → NV21 conversion
//!
//! Camera images arrive as three independent planes, each with its own row
//! stride and pixel stride (chroma is often interleaved in memory with a pixel
//! stride of 2, or padded at row ends). JPEG encoding wants one contiguous
//! buffer, so this module repacks them as NV21:
//!
//! ```text
//! Y Y Y Y ... (width × height, row by row)
//! V U V U ... ((width/2) × (height/2) pairs)
//! ```

use crate::backends::{ImagePlane, YuvImage};
use crate::errors::CaptureError;
use image::RgbImage;
use std::fmt;

/// Malformed input to the converter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// 4:2:0 subsampling needs even width and height
    OddDimensions { width: u32, height: u32 },
    /// A plane holds fewer bytes than its declared geometry addresses
    PlaneTooShort {
        plane: &'static str,
        needed: usize,
        actual: usize,
    },
    /// Pixel stride of zero
    InvalidStride { plane: &'static str },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::OddDimensions { width, height } => {
                write!(f, "YUV 4:2:0 requires even dimensions, got {}x{}", width, height)
            }
            ConversionError::PlaneTooShort {
                plane,
                needed,
                actual,
            } => write!(
                f,
                "{} plane too short: needs {} bytes, has {}",
                plane, needed, actual
            ),
            ConversionError::InvalidStride { plane } => {
                write!(f, "{} plane has a zero pixel stride", plane)
            }
        }
    }
}

impl std::error::Error for ConversionError {}

impl From<ConversionError> for CaptureError {
    fn from(err: ConversionError) -> Self {
        CaptureError::Conversion(err.to_string())
    }
}

/// Output length of an NV21 buffer for the given dimensions
pub fn nv21_len(width: u32, height: u32) -> usize {
    let (w, h) = (width as usize, height as usize);
    w * h + 2 * (w / 2) * (h / 2)
}

fn check_plane(
    name: &'static str,
    plane: &ImagePlane,
    cols: usize,
    rows: usize,
) -> Result<(), ConversionError> {
    if plane.pixel_stride == 0 {
        return Err(ConversionError::InvalidStride { plane: name });
    }
    let needed = plane.required_len(cols, rows);
    if plane.data.len() < needed {
        return Err(ConversionError::PlaneTooShort {
            plane: name,
            needed,
            actual: plane.data.len(),
        });
    }
    Ok(())
}

/// Repack a three-plane YUV 4:2:0 image into NV21
///
/// Every plane's row stride and pixel stride are honored independently.
/// Width and height must be even.
pub fn yuv420_to_nv21(image: &YuvImage) -> Result<Vec<u8>, ConversionError> {
    if image.width % 2 != 0 || image.height % 2 != 0 {
        return Err(ConversionError::OddDimensions {
            width: image.width,
            height: image.height,
        });
    }

    let width = image.width as usize;
    let height = image.height as usize;
    let chroma_width = width / 2;
    let chroma_height = height / 2;

    let y = image.y_plane();
    let u = image.u_plane();
    let v = image.v_plane();
    check_plane("Y", y, width, height)?;
    check_plane("U", u, chroma_width, chroma_height)?;
    check_plane("V", v, chroma_width, chroma_height)?;

    let mut nv21 = Vec::with_capacity(nv21_len(image.width, image.height));

    for row in 0..height {
        let start = row * y.row_stride;
        if y.pixel_stride == 1 {
            nv21.extend_from_slice(&y.data[start..start + width]);
        } else {
            nv21.extend((0..width).map(|col| y.data[start + col * y.pixel_stride]));
        }
    }

    for row in 0..chroma_height {
        let v_row = row * v.row_stride;
        let u_row = row * u.row_stride;
        for col in 0..chroma_width {
            nv21.push(v.data[v_row + col * v.pixel_stride]);
            nv21.push(u.data[u_row + col * u.pixel_stride]);
        }
    }

    Ok(nv21)
}

/// Convert an NV21 buffer to packed RGB (BT.601, limited range)
pub fn nv21_to_rgb(nv21: &[u8], width: u32, height: u32) -> Result<RgbImage, ConversionError> {
    if width % 2 != 0 || height % 2 != 0 {
        return Err(ConversionError::OddDimensions { width, height });
    }
    let needed = nv21_len(width, height);
    if nv21.len() < needed {
        return Err(ConversionError::PlaneTooShort {
            plane: "NV21",
            needed,
            actual: nv21.len(),
        });
    }

    let w = width as usize;
    let h = height as usize;
    let (y_plane, vu_plane) = nv21.split_at(w * h);
    let mut rgb_data = vec![0u8; w * h * 3];

    for y_idx in 0..h {
        let vu_row_start = (y_idx / 2) * w;
        let rgb_row_start = y_idx * w * 3;

        // Pixels in pairs share one chroma sample
        for x_idx in (0..w).step_by(2) {
            let vu_offset = vu_row_start + x_idx;
            let v = vu_plane[vu_offset] as i32 - 128;
            let u = vu_plane[vu_offset + 1] as i32 - 128;

            let r_v = (179 * v) >> 7;
            let g_u = (44 * u) >> 7;
            let g_v = (91 * v) >> 7;
            let b_u = (227 * u) >> 7;

            for dx in 0..2 {
                let luma = ((y_plane[y_idx * w + x_idx + dx] as i32 - 16) * 149) >> 7;
                let offset = rgb_row_start + (x_idx + dx) * 3;
                rgb_data[offset] = (luma + r_v).clamp(0, 255) as u8;
                rgb_data[offset + 1] = (luma - g_u - g_v).clamp(0, 255) as u8;
                rgb_data[offset + 2] = (luma + b_u).clamp(0, 255) as u8;
            }
        }
    }

    // Length is exact, so from_raw cannot fail
    RgbImage::from_raw(width, height, rgb_data).ok_or(ConversionError::PlaneTooShort {
        plane: "RGB",
        needed: w * h * 3,
        actual: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: u32, height: u32, y: ImagePlane, u: ImagePlane, v: ImagePlane) -> YuvImage {
        YuvImage {
            width,
            height,
            planes: [y, u, v],
            timestamp_ns: 0,
        }
    }

    #[test]
    fn test_tightly_packed_example() {
        let y = ImagePlane::new((1u8..=8).collect::<Vec<_>>(), 4, 1);
        let u = ImagePlane::new(vec![9u8, 10], 2, 1);
        let v = ImagePlane::new(vec![11u8, 12], 2, 1);

        let out = yuv420_to_nv21(&image(4, 2, y, u, v)).unwrap();
        assert_eq!(out.len(), 12);
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7, 8, 11, 9, 12, 10]);
    }

    #[test]
    fn test_interleaved_chroma_with_row_padding() {
        // 4x4 image; luma rows padded to 6 bytes; chroma planes are views of
        // one interleaved UV buffer (pixel stride 2) with 6-byte rows.
        let mut y_data = Vec::new();
        for row in 0..4u8 {
            y_data.extend_from_slice(&[row * 4, row * 4 + 1, row * 4 + 2, row * 4 + 3, 0xEE, 0xEE]);
        }
        // U0 V0 U1 V1 pad pad | U2 V2 U3 V3 pad pad
        let uv = [100u8, 200, 101, 201, 0xEE, 0xEE, 102, 202, 103, 203, 0xEE, 0xEE];
        let u = ImagePlane::new(uv[..11].to_vec(), 6, 2);
        let v = ImagePlane::new(uv[1..].to_vec(), 6, 2);

        let out = yuv420_to_nv21(&image(4, 4, ImagePlane::new(y_data, 6, 1), u, v)).unwrap();
        assert_eq!(out.len(), nv21_len(4, 4));
        assert_eq!(&out[..16], &(0u8..16).collect::<Vec<_>>()[..]);
        assert_eq!(&out[16..], &[200, 100, 201, 101, 202, 102, 203, 103]);
        assert!(!out.contains(&0xEE));
    }

    #[test]
    fn test_odd_dimensions_rejected() {
        let plane = ImagePlane::new(vec![0u8; 64], 8, 1);
        let result = yuv420_to_nv21(&image(3, 2, plane.clone(), plane.clone(), plane));
        assert_eq!(
            result,
            Err(ConversionError::OddDimensions {
                width: 3,
                height: 2
            })
        );
    }

    #[test]
    fn test_short_plane_rejected() {
        let y = ImagePlane::new(vec![0u8; 8], 4, 1);
        let u = ImagePlane::new(vec![0u8; 1], 2, 1);
        let v = ImagePlane::new(vec![0u8; 2], 2, 1);
        assert!(matches!(
            yuv420_to_nv21(&image(4, 2, y, u, v)),
            Err(ConversionError::PlaneTooShort { plane: "U", .. })
        ));
    }

    #[test]
    fn test_nv21_to_rgb_neutral_gray() {
        let (w, h) = (4, 2);
        let mut nv21 = vec![128u8; nv21_len(w, h)];
        nv21[..8].fill(126);
        let rgb = nv21_to_rgb(&nv21, w, h).unwrap();
        assert_eq!(rgb.dimensions(), (4, 2));
        for pixel in rgb.pixels() {
            // neutral chroma: all channels equal
            assert_eq!(pixel[0], pixel[1]);
            assert_eq!(pixel[1], pixel[2]);
        }
    }

    #[test]
    fn test_nv21_to_rgb_red_dominant() {
        let (w, h) = (2, 2);
        let mut nv21 = vec![81u8; 4];
        nv21.extend_from_slice(&[240, 90]); // V high, U low → red
        let rgb = nv21_to_rgb(&nv21, w, h).unwrap();
        let p = rgb.get_pixel(0, 0);
        assert!(p[0] > 200 && p[1] < 60 && p[2] < 60, "{:?}", p);
    }
}
