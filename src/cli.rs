// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Running a synthetic AR session end to end (anchor + captures)
//! - Inspecting raw depth dumps
//! - Reconstructing a captured session as a colored point cloud

use ar_capture::backends::DisplayRotation;
use ar_capture::backends::synthetic::SyntheticRuntime;
use ar_capture::constants::{self, methods};
use ar_capture::gpu::HeadlessRasterizer;
use ar_capture::pipeline::{MethodResponse, RuntimeContext};
use ar_capture::render_loop::{LoopAction, RenderLoopController};
use ar_capture::session::ViewportTracker;
use ar_capture::storage::ArtifactStore;
use ar_capture::view::{ArView, TickOutcome};
use ar_capture::depth::point_cloud::{self, ReconstructOptions};
use ar_capture::{Config, depth};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Options for `simulate`
pub struct SimulateOptions {
    pub captures: u32,
    pub interval: Duration,
    pub output: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub rotation: i32,
}

/// Run a synthetic session: place an anchor, then take captures
pub fn simulate(options: SimulateOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    if let Some(output) = options.output {
        config.cache_dir = Some(output);
    }
    let store = ArtifactStore::open(config.artifact_dir())?;
    println!("Output directory: {}", store.dir().display());

    let runtime = tokio::runtime::Runtime::new()?;
    let responder = Arc::new(RuntimeContext::new(runtime.handle().clone()));

    // The view lives on the render thread; only its handles come back
    let (handles_tx, handles_rx) = futures::channel::oneshot::channel();
    let (width, height) = (options.width, options.height);
    let manifest_path = store.manifest_path();

    let mut controller = RenderLoopController::start_with_init(
        "ar-render",
        constants::DEFAULT_FRAME_INTERVAL,
        move || {
            let mut gpu = HeadlessRasterizer::new();
            let mut view = ArView::new(SyntheticRuntime::new(), &config, store, responder);
            view.on_surface_created(&mut gpu)
                .map_err(|e| format!("Surface creation failed: {}", e))?;
            view.on_surface_changed(&mut gpu, width, height);
            let _ = handles_tx.send((view.channel(), view.viewport()));
            Ok((view, gpu))
        },
        |(view, gpu): &mut (ArView<SyntheticRuntime>, HeadlessRasterizer)| {
            if view.on_draw_frame(gpu) == TickOutcome::Failed {
                tracing::debug!("Tick failed");
            }
            // keep recorded draw calls from piling up
            gpu.take_draw_calls();
            LoopAction::Continue
        },
    );

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let outcome = runtime.block_on(async {
        let (channel, viewport): (_, ViewportTracker) = handles_rx
            .await
            .map_err(|_| "Render loop failed to start")?;

        if options.rotation != 0 {
            // rotation notifications arrive off the render thread
            viewport.on_display_changed(DisplayRotation::from_degrees(options.rotation));
        }

        let placed = channel.place_anchor().await;
        if placed {
            println!("Anchor placed at viewport center");
        } else {
            println!("No plane at viewport center; captures carry a zero pose");
        }

        let mut taken = 0u32;
        for index in 0..options.captures {
            if stop_flag.load(Ordering::SeqCst) {
                println!();
                println!("Stopping early...");
                break;
            }

            match channel.handle_method_call(methods::CAPTURE_FRAME).await {
                MethodResponse::Success { value } => {
                    taken += 1;
                    println!(
                        "[{}] {}",
                        index + 1,
                        value["imagePath"].as_str().unwrap_or("?")
                    );
                    println!("    {}", value["depthPath"].as_str().unwrap_or("?"));
                }
                MethodResponse::Error { code, message } => {
                    eprintln!("[{}] {}: {}", index + 1, code, message);
                }
                MethodResponse::NotImplemented => {
                    return Err("captureFrame not implemented".into());
                }
            }

            tokio::time::sleep(options.interval).await;
        }
        Ok::<u32, Box<dyn std::error::Error>>(taken)
    });

    controller.stop();
    let taken = outcome?;

    println!();
    println!("Captured {} frame(s)", taken);
    if manifest_path.exists() {
        println!("Manifest: {}", manifest_path.display());
    }
    Ok(())
}

/// Print statistics for a raw depth dump
pub fn depth_info(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let stats = depth::inspect(path)?;
    println!("{}", path.display());
    println!("{}", stats);
    Ok(())
}

/// Options for `point-cloud`
pub struct PointCloudOptions {
    pub session: PathBuf,
    pub output: Option<PathBuf>,
    pub fov_degrees: f64,
    pub voxel_size: f64,
}

/// Merge every capture of a session into one LAS/LAZ point cloud
pub fn point_cloud(options: PointCloudOptions) -> Result<(), Box<dyn std::error::Error>> {
    let output = options
        .output
        .unwrap_or_else(|| options.session.join(constants::artifacts::POINT_CLOUD_FILE));
    let reconstruct = ReconstructOptions {
        vertical_fov_deg: options.fov_degrees,
        voxel_size: (options.voxel_size > 0.0).then_some(options.voxel_size),
    };

    println!("Session: {}", options.session.display());
    let session = point_cloud::export_session(&options.session, &output, &reconstruct)?;

    println!(
        "Merged {} capture(s), skipped {}",
        session.frames_used, session.frames_skipped
    );
    println!("Points: {}", session.cloud.len());
    println!("Saved: {}", output.display());
    Ok(())
}
