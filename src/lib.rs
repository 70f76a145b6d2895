// SPDX-License-Identifier: GPL-3.0-only

//! AR capture - camera view bridge with anchor placement and synchronized capture
//!
//! Renders a live tracked camera feed, lets a caller place a single world
//! anchor at the viewport center, and captures color + raw depth + pose
//! triples from the same tracked frame.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Tracking engine abstraction and the synthetic engine
//! - [`session`]: Session bring-up and display geometry tracking
//! - [`render`]: Camera background and anchor marker passes
//! - [`gpu`]: Rasterization seam and the headless rasterizer
//! - [`pipeline`]: Request slots, method channel and the capture pipeline
//! - [`media`]: YUV to NV21 conversion and JPEG encoding
//! - [`storage`]: Artifact files and the `captures.json` manifest
//! - [`depth`]: Depth dump inspection and point cloud reconstruction
//! - [`view`]: Per-tick driver tying everything together
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let mut view = ArView::new(runtime, &config, store, responder);
//! let channel = view.channel();
//! // render thread: view.on_draw_frame(&mut gpu) once per display refresh
//! // any thread:    channel.capture_frame().await
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod depth;
pub mod errors;
pub mod gpu;
pub mod math;
pub mod media;
pub mod pipeline;
pub mod render;
pub mod render_loop;
pub mod session;
pub mod storage;
pub mod view;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AppError, AppResult, CaptureError};
pub use pipeline::{ArChannel, CaptureResult, MethodResponse};
pub use view::{ArView, TickOutcome};
