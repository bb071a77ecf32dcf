//! Pose prediction network: GRU stack plus quaternion output head.

use burn::module::Param;
use burn::nn::{LeakyRelu, LeakyReluConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::Distribution;
use quaternion::{qmul, qnormalize};
use tracing::debug;

use crate::gru::GruStack;

/// Configuration for the pose prediction model.
///
/// Per-frame feature vectors are laid out as `4 * num_joints` rotation
/// channels (one quaternion per joint), then `num_outputs` auxiliary
/// channels reproduced in the output, then `num_controls` control channels
/// consumed but not reproduced. The layout is immutable after `init`: the
/// control encoder exists if and only if `num_controls > 0`.
#[derive(Config, Debug)]
pub struct PoseModelConfig {
    /// Number of skeleton joints.
    pub num_joints: usize,
    /// Auxiliary channels carried through the network next to the rotations.
    #[config(default = 0)]
    pub num_outputs: usize,
    /// Control-only input channels (consumed, not predicted).
    #[config(default = 0)]
    pub num_controls: usize,
    /// GRU hidden width.
    #[config(default = 1000)]
    pub hidden_size: usize,
    /// Number of stacked GRU layers.
    #[config(default = 2)]
    pub num_layers: usize,
    /// Width of the control feed-forward block.
    #[config(default = 30)]
    pub control_hidden: usize,
    /// When set, the rotation head predicts a delta composed onto the most
    /// recent input rotation instead of an absolute orientation.
    #[config(default = false)]
    pub model_velocities: bool,
}

impl PoseModelConfig {
    /// Width of one input frame: `4 * J + O + C`.
    pub fn input_size(&self) -> usize {
        4 * self.num_joints + self.num_outputs + self.num_controls
    }

    /// Width of one output frame: `4 * J + O`.
    pub fn output_size(&self) -> usize {
        4 * self.num_joints + self.num_outputs
    }

    /// Initializes the model on the given device.
    pub fn init<B: Backend>(&self, device: &B::Device) -> PoseModel<B> {
        assert!(self.num_joints > 0, "the model needs at least one joint");

        let controls = (self.num_controls > 0).then(|| {
            ControlEncoder::new(self.num_controls, self.control_hidden, device)
        });
        let rnn_input = 4 * self.num_joints
            + self.num_outputs
            + controls.as_ref().map_or(0, |_| self.control_hidden);

        let rnn = GruStack::new(rnn_input, self.hidden_size, self.num_layers, device);
        let output = LinearConfig::new(self.hidden_size, self.output_size()).init(device);

        // Learned initial state, broadcast across the batch at t = 0.
        let h0 = Param::from_tensor(Tensor::random(
            [self.num_layers, 1, self.hidden_size],
            Distribution::Normal(0.0, 0.01),
            device,
        ));

        PoseModel {
            controls,
            rnn,
            output,
            h0,
            num_joints: self.num_joints,
            num_outputs: self.num_outputs,
            num_controls: self.num_controls,
            hidden_size: self.hidden_size,
            num_layers: self.num_layers,
            model_velocities: self.model_velocities,
        }
    }
}

/// Two-layer projection applied to the control channels before the
/// recurrence.
#[derive(Module, Debug)]
pub struct ControlEncoder<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    activation: LeakyRelu,
}

impl<B: Backend> ControlEncoder<B> {
    fn new(num_controls: usize, hidden: usize, device: &B::Device) -> Self {
        Self {
            fc1: LinearConfig::new(num_controls, hidden).init(device),
            fc2: LinearConfig::new(hidden, hidden).init(device),
            activation: LeakyReluConfig::new().with_negative_slope(0.05).init(),
        }
    }

    fn forward(&self, controls: Tensor<B, 3>) -> Tensor<B, 3> {
        let hidden = self.activation.forward(self.fc1.forward(controls));
        self.activation.forward(self.fc2.forward(hidden))
    }
}

/// Result of one forward evaluation.
#[derive(Debug, Clone)]
pub struct Prediction<B: Backend> {
    /// Predicted frames, `(batch, out_time, 4 * J + O)`; every quaternion
    /// block is unit length.
    pub frames: Tensor<B, 3>,
    /// Updated recurrent state, `(layers, batch, hidden)`, for the caller
    /// to thread into the next call.
    pub state: Tensor<B, 3>,
    /// Raw projected rotation block before the velocity residual and
    /// renormalization, for external regularization losses. Present only
    /// when requested.
    pub prenorm: Option<Tensor<B, 3>>,
}

/// Recurrent pose forecaster.
///
/// Consumes time-ordered frames of joint quaternions plus auxiliary and
/// control channels, and predicts the next frame (or one frame per input
/// step). The forward pass is pure: identical inputs, state, and
/// parameters produce identical outputs, and the model never retains state
/// between calls.
#[derive(Module, Debug)]
pub struct PoseModel<B: Backend> {
    controls: Option<ControlEncoder<B>>,
    rnn: GruStack<B>,
    output: Linear<B>,
    h0: Param<Tensor<B, 3>>,
    num_joints: usize,
    num_outputs: usize,
    num_controls: usize,
    hidden_size: usize,
    num_layers: usize,
    model_velocities: bool,
}

impl<B: Backend> PoseModel<B> {
    pub fn input_size(&self) -> usize {
        4 * self.num_joints + self.num_outputs + self.num_controls
    }

    pub fn output_size(&self) -> usize {
        4 * self.num_joints + self.num_outputs
    }

    pub fn num_controls(&self) -> usize {
        self.num_controls
    }

    /// The learned initial state broadcast across a batch.
    pub fn initial_state(&self, batch: usize) -> Tensor<B, 3> {
        self.h0
            .val()
            .expand([self.num_layers, batch, self.hidden_size])
    }

    /// Forward evaluation.
    ///
    /// `input` is `(batch, time, 4 * J + O + C)`. When `state` is `None`
    /// the learned initial state is broadcast across the batch; otherwise
    /// the caller-supplied `(layers, batch, hidden)` state is threaded in
    /// unchanged. With `return_all` every timestep is projected to an
    /// output frame; otherwise only the final timestep is (output time
    /// dimension 1). With `return_prenorm` the raw projected rotation
    /// block is exposed on the result.
    ///
    /// In velocity mode each predicted quaternion is a relative rotation,
    /// composed onto the input quaternion of the matching joint and
    /// timestep before renormalization. Renormalization itself always
    /// runs: neither the projection nor the composition lands exactly on
    /// the unit sphere.
    ///
    /// # Panics
    ///
    /// Panics if the input width is not `4 * J + O + C` or a supplied
    /// state is not `(layers, batch, hidden)`.
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        state: Option<Tensor<B, 3>>,
        return_all: bool,
        return_prenorm: bool,
    ) -> Prediction<B> {
        let [batch, steps, width] = input.dims();
        assert_eq!(
            width,
            self.input_size(),
            "input frames must have 4 * J + O + C = {} channels, got {width}",
            self.input_size()
        );

        let rotation_width = 4 * self.num_joints;
        let known_width = rotation_width + self.num_outputs;
        let original = input.clone();

        // Control channels go through the feed-forward block; rotation and
        // auxiliary channels pass into the recurrence unchanged.
        let features = match &self.controls {
            Some(encoder) => {
                let encoded =
                    encoder.forward(input.clone().narrow(2, known_width, self.num_controls));
                Tensor::cat(vec![input.narrow(2, 0, known_width), encoded], 2)
            }
            None => input,
        };

        let state = state.unwrap_or_else(|| self.initial_state(batch));
        let (hidden, new_state) = self.rnn.forward(features, state);

        let (projected, reference) = if return_all {
            (self.output.forward(hidden), original)
        } else {
            (
                self.output.forward(hidden.narrow(1, steps - 1, 1)),
                original.narrow(1, steps - 1, 1),
            )
        };
        let out_steps = projected.dims()[1];

        let rotations = projected.clone().narrow(2, 0, rotation_width);
        let prenorm = return_prenorm.then(|| rotations.clone());

        let quats = batch * out_steps * self.num_joints;
        let flat: Tensor<B, 2> = rotations.reshape([quats, 4]);
        let composed = if self.model_velocities {
            let previous: Tensor<B, 2> = reference
                .narrow(2, 0, rotation_width)
                .reshape([quats, 4]);
            qmul(flat, previous)
        } else {
            flat
        };
        let normalized: Tensor<B, 3> =
            qnormalize(composed).reshape([batch, out_steps, rotation_width]);

        let frames = if self.num_outputs > 0 {
            Tensor::cat(
                vec![normalized, projected.narrow(2, rotation_width, self.num_outputs)],
                2,
            )
        } else {
            normalized
        };

        Prediction {
            frames,
            state: new_state,
            prenorm,
        }
    }

    /// Autoregressive rollout: primes the recurrent state on `prefix`,
    /// then feeds each predicted frame back as the next input until
    /// `horizon` frames have been produced.
    ///
    /// Returns `(batch, horizon, 4 * J + O)`.
    ///
    /// # Errors
    ///
    /// Fails when the model consumes control channels (predicted frames
    /// carry none to feed back) or when `horizon` is zero.
    pub fn predict(
        &self,
        prefix: Tensor<B, 3>,
        horizon: usize,
    ) -> anyhow::Result<Tensor<B, 3>> {
        if self.num_controls > 0 {
            anyhow::bail!(
                "autoregressive rollout needs a control-free model, this one consumes {} control channels",
                self.num_controls
            );
        }
        if horizon == 0 {
            anyhow::bail!("rollout horizon must be at least one frame");
        }

        debug!(horizon, prefix_frames = prefix.dims()[1], "starting rollout");

        let primed = self.forward(prefix, None, false, false);
        let mut state = primed.state;
        let mut frame = primed.frames;

        let mut frames = Vec::with_capacity(horizon);
        frames.push(frame.clone());
        for _ in 1..horizon {
            let next = self.forward(frame, Some(state), false, false);
            state = next.state;
            frame = next.frames;
            frames.push(frame.clone());
        }

        Ok(Tensor::cat(frames, 1))
    }
}
