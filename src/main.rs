// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

mod cli;

#[derive(Parser)]
#[command(name = "ar-capture")]
#[command(about = "AR capture bridge: anchor placement and RGB + depth + pose capture")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session against the synthetic tracking engine
    Simulate {
        /// Number of frames to capture
        #[arg(short, long, default_value = "3")]
        captures: u32,

        /// Delay between captures in milliseconds
        #[arg(short, long, default_value = "100")]
        interval_ms: u64,

        /// Output directory (default: <cache dir>/ar-capture)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Viewport width in pixels
        #[arg(long, default_value = "1080")]
        width: u32,

        /// Viewport height in pixels
        #[arg(long, default_value = "1920")]
        height: u32,

        /// Display rotation in degrees (0, 90, 180, 270)
        #[arg(short, long, default_value = "0")]
        rotation: i32,
    },

    /// Print statistics for a raw depth dump
    DepthInfo {
        /// Path to a depth_<millis>.bin file
        file: PathBuf,
    },

    /// Merge a captured session into a colored point cloud
    PointCloud {
        /// Session directory containing captures.json
        session: PathBuf,

        /// Output file, .las or .laz (default: <session>/point_cloud.las)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Vertical field of view assumed for the depth camera, in degrees
        #[arg(long, default_value = "60")]
        fov: f64,

        /// Voxel size in meters for thinning the cloud (0 keeps every point)
        #[arg(long, default_value = "0.005")]
        voxel_size: f64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=ar_capture=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            captures,
            interval_ms,
            output,
            width,
            height,
            rotation,
        } => cli::simulate(cli::SimulateOptions {
            captures,
            interval: Duration::from_millis(interval_ms),
            output,
            width,
            height,
            rotation,
        }),
        Commands::DepthInfo { file } => cli::depth_info(&file),
        Commands::PointCloud {
            session,
            output,
            fov,
            voxel_size,
        } => cli::point_cloud(cli::PointCloudOptions {
            session,
            output,
            fov_degrees: fov,
            voxel_size,
        }),
    }
}
