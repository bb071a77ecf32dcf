//! Gated recurrent units with caller-owned state.
//!
//! Burn's bundled `Gru` keeps its sequence loop and state internal; the
//! pose model needs the opposite contract: a `(layers, batch, hidden)`
//! state tensor passed in and handed back on every call, so a longer
//! sequence can be fed in chunks. The cell here processes one timestep and
//! the stack owns the time loop and the per-layer state bookkeeping.

use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;

/// One GRU layer, stepped a single timestep at a time.
///
/// The three gates are computed from two packed projections (input and
/// hidden each map to `3 * hidden`), then split, which keeps the step at
/// one matmul per side.
#[derive(Module, Debug)]
pub struct GruCell<B: Backend> {
    input_gates: Linear<B>,
    hidden_gates: Linear<B>,
    hidden_size: usize,
}

impl<B: Backend> GruCell<B> {
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        Self {
            input_gates: LinearConfig::new(input_size, 3 * hidden_size).init(device),
            hidden_gates: LinearConfig::new(hidden_size, 3 * hidden_size).init(device),
            hidden_size,
        }
    }

    /// Advances the cell by one timestep.
    ///
    /// `input` is `(batch, input_size)`, `state` is `(batch, hidden)`;
    /// returns the new `(batch, hidden)` state, which is also the cell
    /// output for that timestep.
    pub fn step(&self, input: Tensor<B, 2>, state: Tensor<B, 2>) -> Tensor<B, 2> {
        let h = self.hidden_size;

        let from_input = self.input_gates.forward(input);
        let from_hidden = self.hidden_gates.forward(state.clone());

        let reset = sigmoid(
            from_input.clone().narrow(1, 0, h) + from_hidden.clone().narrow(1, 0, h),
        );
        let update = sigmoid(
            from_input.clone().narrow(1, h, h) + from_hidden.clone().narrow(1, h, h),
        );
        let candidate =
            (from_input.narrow(1, 2 * h, h) + reset * from_hidden.narrow(1, 2 * h, h)).tanh();

        // h' = (1 - z) * n + z * h
        candidate.clone() + update * (state - candidate)
    }
}

/// A stack of GRU layers run over a batched time sequence.
#[derive(Module, Debug)]
pub struct GruStack<B: Backend> {
    layers: Vec<GruCell<B>>,
    hidden_size: usize,
}

impl<B: Backend> GruStack<B> {
    /// Builds `num_layers` cells; the first consumes `input_size` features,
    /// the rest consume the hidden output of the layer below.
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        device: &B::Device,
    ) -> Self {
        assert!(num_layers > 0, "a GRU stack needs at least one layer");

        let layers = (0..num_layers)
            .map(|layer| {
                let width = if layer == 0 { input_size } else { hidden_size };
                GruCell::new(width, hidden_size, device)
            })
            .collect();

        Self {
            layers,
            hidden_size,
        }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Runs the stack over `input` of shape `(batch, time, features)` with
    /// an initial state of shape `(layers, batch, hidden)`.
    ///
    /// Returns the top layer's per-timestep output `(batch, time, hidden)`
    /// and the updated state, every layer's final hidden vector.
    ///
    /// # Panics
    ///
    /// Panics if the state shape does not match `(layers, batch, hidden)`.
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        state: Tensor<B, 3>,
    ) -> (Tensor<B, 3>, Tensor<B, 3>) {
        let [batch, steps, _] = input.dims();
        assert_eq!(
            state.dims(),
            [self.layers.len(), batch, self.hidden_size],
            "recurrent state must be (layers, batch, hidden)"
        );

        let mut final_states = Vec::with_capacity(self.layers.len());
        let mut sequence = input;

        for (layer, cell) in self.layers.iter().enumerate() {
            let width = sequence.dims()[2];
            let mut hidden: Tensor<B, 2> =
                state.clone().narrow(0, layer, 1).reshape([batch, self.hidden_size]);

            let mut outputs = Vec::with_capacity(steps);
            for step in 0..steps {
                let frame: Tensor<B, 2> =
                    sequence.clone().narrow(1, step, 1).reshape([batch, width]);
                hidden = cell.step(frame, hidden);
                outputs.push(hidden.clone());
            }

            final_states.push(hidden);
            sequence = Tensor::stack(outputs, 1);
        }

        (sequence, Tensor::stack(final_states, 0))
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::backend::ndarray::NdArrayDevice;

    use super::*;

    type TestBackend = NdArray;

    fn ramp_input(batch: usize, steps: usize, width: usize) -> Tensor<TestBackend, 3> {
        let device = NdArrayDevice::default();
        let data: Vec<f32> = (0..batch * steps * width)
            .map(|i| (i as f32 * 0.13).sin())
            .collect();
        Tensor::<TestBackend, 1>::from_floats(data.as_slice(), &device).reshape([
            batch, steps, width,
        ])
    }

    fn to_vec(tensor: Tensor<TestBackend, 3>) -> Vec<f32> {
        tensor.into_data().to_vec().expect("f32 tensor data")
    }

    #[test]
    fn test_cell_step_shape() {
        let device = NdArrayDevice::default();
        let cell = GruCell::<TestBackend>::new(6, 8, &device);

        let input = Tensor::zeros([4, 6], &device);
        let state = Tensor::zeros([4, 8], &device);
        assert_eq!(cell.step(input, state).dims(), [4, 8]);
    }

    #[test]
    fn test_stack_shapes() {
        let device = NdArrayDevice::default();
        let stack = GruStack::<TestBackend>::new(5, 12, 2, &device);

        let state = Tensor::zeros([2, 3, 12], &device);
        let (output, new_state) = stack.forward(ramp_input(3, 7, 5), state);

        assert_eq!(output.dims(), [3, 7, 12]);
        assert_eq!(new_state.dims(), [2, 3, 12]);
    }

    #[test]
    fn test_chunked_sequence_matches_full_sequence() {
        // A caller may thread state across chunks of a longer sequence;
        // the result must match feeding the sequence at once.
        let device = NdArrayDevice::default();
        let stack = GruStack::<TestBackend>::new(4, 10, 2, &device);
        let input = ramp_input(2, 6, 4);
        let zero_state = Tensor::zeros([2, 2, 10], &device);

        let (full_out, full_state) = stack.forward(input.clone(), zero_state.clone());

        let (head_out, mid_state) = stack.forward(input.clone().narrow(1, 0, 3), zero_state);
        let (tail_out, end_state) = stack.forward(input.narrow(1, 3, 3), mid_state);
        let chunked_out: Tensor<TestBackend, 3> = Tensor::cat(vec![head_out, tail_out], 1);

        for (a, b) in to_vec(full_out).iter().zip(to_vec(chunked_out)) {
            assert!((a - b).abs() < 1e-6);
        }
        for (a, b) in to_vec(full_state).iter().zip(to_vec(end_state)) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    #[should_panic(expected = "(layers, batch, hidden)")]
    fn test_stack_rejects_bad_state_shape() {
        let device = NdArrayDevice::default();
        let stack = GruStack::<TestBackend>::new(4, 10, 2, &device);
        let state = Tensor::zeros([1, 2, 10], &device);
        let _ = stack.forward(ramp_input(2, 3, 4), state);
    }
}
