//! Rollout command - autoregressive pose prediction from a seed motion.

use std::time::Instant;

use anyhow::Result;
use burn::backend::NdArray;
use burn::backend::ndarray::NdArrayDevice;
use pose_model::PoseModelConfig;
use tracing::info;

use crate::motion::seed_motion;

type Backend = NdArray;

/// Runs the rollout command.
///
/// # Errors
///
/// Returns an error if the rollout parameters are invalid.
#[allow(clippy::too_many_arguments)]
pub fn run(
    joints: usize,
    outputs: usize,
    hidden: usize,
    layers: usize,
    batch: usize,
    prefix: usize,
    horizon: usize,
    velocities: bool,
) -> Result<()> {
    anyhow::ensure!(prefix > 0, "the seed motion needs at least one frame");

    let device = NdArrayDevice::default();
    let config = PoseModelConfig::new(joints)
        .with_num_outputs(outputs)
        .with_hidden_size(hidden)
        .with_num_layers(layers)
        .with_model_velocities(velocities);

    info!(
        joints,
        outputs,
        hidden,
        layers,
        velocities,
        "Building model ({} -> {} channels)",
        config.input_size(),
        config.output_size()
    );
    let model = config.init::<Backend>(&device);

    let seed = seed_motion::<Backend>(batch, prefix, joints, outputs, &device);
    info!(batch, prefix, "Synthesized seed motion");

    let started = Instant::now();
    let frames = model.predict(seed, horizon)?;
    let elapsed = started.elapsed();

    let dims = frames.dims();
    let data: Vec<f32> = frames
        .into_data()
        .to_vec()
        .map_err(|error| anyhow::anyhow!("failed to read prediction data: {error:?}"))?;

    // Worst unit-norm deviation over every joint of every predicted frame.
    let mut max_deviation = 0.0f32;
    for frame in data.chunks_exact(dims[2]) {
        for quat in frame[..4 * joints].chunks_exact(4) {
            let norm: f32 = quat.iter().map(|c| c * c).sum::<f32>().sqrt();
            max_deviation = max_deviation.max((norm - 1.0).abs());
        }
    }

    info!(
        frames = horizon,
        per_frame_ms = elapsed.as_secs_f64() * 1000.0 / horizon as f64,
        "Rollout complete in {:.1} ms",
        elapsed.as_secs_f64() * 1000.0
    );
    info!(
        max_deviation = f64::from(max_deviation),
        "Unit-norm check on predicted rotations"
    );

    Ok(())
}
