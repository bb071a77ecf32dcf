//! Euler command - converts a synthesized rotation sequence to Euler angles.

use anyhow::Result;
use burn::backend::NdArray;
use burn::backend::ndarray::NdArrayDevice;
use quaternion::{EulerOrder, qeuler};
use tracing::info;

use crate::motion::seed_motion;

type Backend = NdArray;

/// Runs the euler command.
///
/// # Errors
///
/// Returns an error if `order` is not one of the six recognized rotation
/// orders.
pub fn run(order: &str, epsilon: f32, frames: usize) -> Result<()> {
    let order: EulerOrder = order.parse()?;
    anyhow::ensure!(frames > 0, "need at least one frame to convert");

    let device = NdArrayDevice::default();
    let joints = 3;
    let motion = seed_motion::<Backend>(1, frames, joints, 0, &device);

    let quats = motion.reshape([frames, joints, 4]);
    let angles = qeuler(quats, order, epsilon);

    info!(
        %order,
        epsilon = f64::from(epsilon),
        frames,
        "Converted rotation sequence to Euler angles"
    );

    let data: Vec<f32> = angles
        .into_data()
        .to_vec()
        .map_err(|error| anyhow::anyhow!("failed to read angle data: {error:?}"))?;
    for (frame, chunk) in data.chunks_exact(3 * joints).enumerate() {
        let formatted: Vec<String> = chunk
            .chunks_exact(3)
            .map(|joint| format!("({:+.3}, {:+.3}, {:+.3})", joint[0], joint[1], joint[2]))
            .collect();
        info!("frame {frame}: {}", formatted.join(" "));
    }

    Ok(())
}
