//! Pose Forecast
//!
//! Command-line harness around the quaternion pose-prediction model:
//! builds a model, synthesizes a deterministic seed motion, and runs
//! forward evaluation or an autoregressive rollout.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod motion;

/// Quaternion pose sequence forecaster
#[derive(Parser)]
#[command(name = "pose-forecast")]
#[command(about = "Recurrent quaternion pose-prediction demo harness")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an autoregressive rollout from a synthesized seed motion
    Rollout {
        /// Number of skeleton joints
        #[arg(short, long, default_value = "32")]
        joints: usize,

        /// Auxiliary output channels next to the joint rotations
        #[arg(short, long, default_value = "0")]
        outputs: usize,

        /// GRU hidden width
        #[arg(long, default_value = "256")]
        hidden: usize,

        /// Number of stacked GRU layers
        #[arg(long, default_value = "2")]
        layers: usize,

        /// Independent sequences in the batch
        #[arg(short, long, default_value = "2")]
        batch: usize,

        /// Seed frames fed to the model before prediction starts
        #[arg(short, long, default_value = "50")]
        prefix: usize,

        /// Frames to predict autoregressively
        #[arg(long, default_value = "25")]
        horizon: usize,

        /// Predict velocity deltas composed onto the last known rotation
        #[arg(long)]
        velocities: bool,
    },

    /// Convert a synthesized rotation sequence to Euler angles
    Euler {
        /// Rotation order (xyz, yzx, zxy, xzy, yxz, zyx)
        #[arg(short = 'r', long, default_value = "zyx")]
        order: String,

        /// Clamp margin for the asin branch near gimbal lock
        #[arg(short, long, default_value = "1e-6")]
        epsilon: f32,

        /// Number of frames to synthesize
        #[arg(short, long, default_value = "8")]
        frames: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Rollout {
            joints,
            outputs,
            hidden,
            layers,
            batch,
            prefix,
            horizon,
            velocities,
        } => commands::rollout::run(
            joints, outputs, hidden, layers, batch, prefix, horizon, velocities,
        ),
        Commands::Euler {
            order,
            epsilon,
            frames,
        } => commands::euler::run(&order, epsilon, frames),
    }
}
