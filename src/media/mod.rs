// SPDX-License-Identifier: GPL-3.0-only

//! Media processing for frame capture
//!
//! # Color Space Conversion
//!
//! Camera images arrive as three-plane YUV 4:2:0 with arbitrary strides. The
//! [`yuv`] module repacks them as contiguous NV21 and converts NV21 to RGB
//! (BT.601 integer arithmetic).
//!
//! # Encoding
//!
//! The [`encoding`] module produces the persisted artifacts: JPEG color
//! images and headerless depth dumps.

pub mod encoding;
pub mod yuv;

pub use encoding::{depth_dump, encode_jpeg, encode_nv21_jpeg};
pub use yuv::{ConversionError, nv21_len, nv21_to_rgb, yuv420_to_nv21};
