//! Deterministic synthetic seed motion.
//!
//! Each joint spins at a constant angular velocity about a fixed axis, so
//! the sequence is smooth, fully reproducible, and trivially unit-norm:
//! a reasonable stand-in for mocap frames in a demo harness.

use burn::prelude::*;

/// Fixed-seed LCG, enough randomness to pick per-joint rotation axes
/// without pulling in an RNG crate.
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(12345),
        }
    }

    fn next_f32(&mut self) -> f32 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        ((self.state >> 33) as f32) / ((1u64 << 31) as f32)
    }
}

/// Per-joint rotation axis and angular velocity.
struct JointSpin {
    axis: [f32; 3],
    velocity: f32,
}

fn joint_spins(joints: usize, seed: u64) -> Vec<JointSpin> {
    let mut rng = Lcg::new(seed);
    (0..joints)
        .map(|_| {
            let raw = [
                rng.next_f32() - 0.5,
                rng.next_f32() - 0.5,
                rng.next_f32() - 0.5,
            ];
            let norm = raw.iter().map(|c| c * c).sum::<f32>().sqrt().max(1e-6);
            JointSpin {
                axis: [raw[0] / norm, raw[1] / norm, raw[2] / norm],
                velocity: 0.02 + 0.1 * rng.next_f32(),
            }
        })
        .collect()
}

/// Synthesizes `(batch, frames, 4 * joints + extra)` seed motion. Batch
/// elements differ by a phase offset; the `extra` channels are constant.
pub fn seed_motion<B: Backend>(
    batch: usize,
    frames: usize,
    joints: usize,
    extra: usize,
    device: &B::Device,
) -> Tensor<B, 3> {
    let spins = joint_spins(joints, 42);
    let width = 4 * joints + extra;

    let mut data = Vec::with_capacity(batch * frames * width);
    for b in 0..batch {
        let phase = b as f32 * 0.7;
        for t in 0..frames {
            for spin in &spins {
                let half = (phase + spin.velocity * t as f32) / 2.0;
                let (sin, cos) = half.sin_cos();
                data.extend_from_slice(&[
                    cos,
                    sin * spin.axis[0],
                    sin * spin.axis[1],
                    sin * spin.axis[2],
                ]);
            }
            data.extend(std::iter::repeat(0.0).take(extra));
        }
    }

    Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([batch, frames, width])
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::backend::ndarray::NdArrayDevice;

    use super::*;

    #[test]
    fn test_seed_motion_is_unit_norm() {
        let device = NdArrayDevice::default();
        let motion = seed_motion::<NdArray>(2, 5, 3, 1, &device);
        assert_eq!(motion.dims(), [2, 5, 13]);

        let data: Vec<f32> = motion.into_data().to_vec().expect("f32 tensor data");
        for frame in data.chunks_exact(13) {
            for quat in frame[..12].chunks_exact(4) {
                let norm: f32 = quat.iter().map(|c| c * c).sum::<f32>().sqrt();
                assert!((norm - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_seed_motion_is_reproducible() {
        let device = NdArrayDevice::default();
        let first: Vec<f32> = seed_motion::<NdArray>(1, 4, 2, 0, &device)
            .into_data()
            .to_vec()
            .expect("f32 tensor data");
        let second: Vec<f32> = seed_motion::<NdArray>(1, 4, 2, 0, &device)
            .into_data()
            .to_vec()
            .expect("f32 tensor data");
        assert_eq!(first, second);
    }
}
