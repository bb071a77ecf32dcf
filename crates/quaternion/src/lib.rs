//! Batched quaternion algebra for pose sequences.
//!
//! This crate provides the rotation math used by the pose prediction model:
//! Hamilton products, vector rotation, Euler-angle extraction, and unit
//! renormalization. All operations are batched: tensors may carry arbitrary
//! leading dimensions as long as the trailing dimension holds the quaternion
//! (4) or vector (3) components. Quaternions are stored as `(w, x, y, z)`.
//!
//! Shape violations are programmer errors and panic immediately; numerical
//! edge cases (gimbal lock, degenerate norms) are clamped instead.

use burn::prelude::*;

mod euler;

pub use euler::{EulerOrder, qeuler};

/// Norm floor used by [`qnormalize`]. A rotation block that degenerates to
/// the zero vector divides by this instead of zero, so downstream frames see
/// finite values rather than NaN.
const MIN_NORM: f32 = 1e-12;

/// Collapses all leading dimensions, leaving `(N, trailing)`.
fn flatten<B: Backend, const D: usize>(tensor: Tensor<B, D>, trailing: usize) -> Tensor<B, 2> {
    let dims = tensor.dims();
    let rows: usize = dims[..D - 1].iter().product();
    tensor.reshape([rows, trailing])
}

/// Restores the leading dimensions captured before a [`flatten`] call,
/// with a possibly different trailing dimension.
fn restore<B: Backend, const D: usize>(
    tensor: Tensor<B, 2>,
    mut dims: [usize; D],
    trailing: usize,
) -> Tensor<B, D> {
    dims[D - 1] = trailing;
    tensor.reshape(dims)
}

/// Extracts component `index` of a flattened `(N, C)` tensor as `(N, 1)`.
fn component<B: Backend>(tensor: &Tensor<B, 2>, index: usize) -> Tensor<B, 2> {
    tensor.clone().narrow(1, index, 1)
}

/// Row-wise cross product of two `(N, 3)` tensors.
fn cross<B: Backend>(a: &Tensor<B, 2>, b: &Tensor<B, 2>) -> Tensor<B, 2> {
    let (a0, a1, a2) = (component(a, 0), component(a, 1), component(a, 2));
    let (b0, b1, b2) = (component(b, 0), component(b, 1), component(b, 2));

    Tensor::cat(
        vec![
            a1.clone() * b2.clone() - a2.clone() * b1.clone(),
            a2 * b0.clone() - a0.clone() * b2,
            a0 * b1 - a1 * b0,
        ],
        1,
    )
}

/// Multiplies quaternion batch `q` by quaternion batch `r` (Hamilton
/// product, non-commutative).
///
/// Both inputs must have identical shape with a trailing dimension of 4.
/// The output keeps that shape. No normalization is performed; composing
/// two approximately-unit quaternions drifts off the unit sphere and the
/// caller is expected to renormalize with [`qnormalize`].
///
/// # Panics
///
/// Panics if either trailing dimension is not 4 or the shapes differ.
pub fn qmul<B: Backend, const D: usize>(q: Tensor<B, D>, r: Tensor<B, D>) -> Tensor<B, D> {
    let dims = q.dims();
    assert_eq!(
        dims[D - 1],
        4,
        "qmul expects a trailing dimension of 4, got {:?}",
        dims
    );
    assert_eq!(
        r.dims(),
        dims,
        "qmul operands must share one shape, got {:?} and {:?}",
        dims,
        r.dims()
    );

    let q = flatten(q, 4);
    let r = flatten(r, 4);

    let (qw, qx, qy, qz) = (
        component(&q, 0),
        component(&q, 1),
        component(&q, 2),
        component(&q, 3),
    );
    let (rw, rx, ry, rz) = (
        component(&r, 0),
        component(&r, 1),
        component(&r, 2),
        component(&r, 3),
    );

    let w = rw.clone() * qw.clone() - rx.clone() * qx.clone() - ry.clone() * qy.clone()
        - rz.clone() * qz.clone();
    let x = rw.clone() * qx.clone() + rx.clone() * qw.clone() - ry.clone() * qz.clone()
        + rz.clone() * qy.clone();
    let y = rw.clone() * qy.clone() + rx.clone() * qz.clone() + ry.clone() * qw.clone()
        - rz.clone() * qx.clone();
    let z = rw * qz + ry * qx - rx * qy + rz * qw;

    restore(Tensor::cat(vec![w, x, y, z], 1), dims, 4)
}

/// Rotates vector batch `v` by quaternion batch `q`.
///
/// Uses the double-cross-product expansion `v + 2 * (q_w * uv + uuv)`
/// instead of building rotation matrices. `q` must be unit-length for the
/// result to be a rotation; that is a caller precondition and is not
/// checked here.
///
/// # Panics
///
/// Panics if `q` does not end in 4 components, `v` does not end in 3, or
/// their leading shapes differ.
pub fn qrot<B: Backend, const D: usize>(q: Tensor<B, D>, v: Tensor<B, D>) -> Tensor<B, D> {
    let q_dims = q.dims();
    let v_dims = v.dims();
    assert_eq!(
        q_dims[D - 1],
        4,
        "qrot expects quaternions with a trailing dimension of 4, got {:?}",
        q_dims
    );
    assert_eq!(
        v_dims[D - 1],
        3,
        "qrot expects vectors with a trailing dimension of 3, got {:?}",
        v_dims
    );
    assert_eq!(
        q_dims[..D - 1],
        v_dims[..D - 1],
        "qrot quaternion/vector leading shapes must match, got {:?} and {:?}",
        q_dims,
        v_dims
    );

    let q = flatten(q, 4);
    let v = flatten(v, 3);

    let qw = component(&q, 0);
    let qvec = q.narrow(1, 1, 3);

    let uv = cross(&qvec, &v);
    let uuv = cross(&qvec, &uv);

    let rotated = v + (uv * qw + uuv).mul_scalar(2.0);
    restore(rotated, v_dims, 3)
}

/// Rescales every quaternion in the batch to unit L2 norm.
///
/// The divisor is clamped to a small positive floor, so a degenerate
/// all-zero quaternion produces finite output instead of NaN.
///
/// # Panics
///
/// Panics if the trailing dimension is not 4.
pub fn qnormalize<B: Backend, const D: usize>(q: Tensor<B, D>) -> Tensor<B, D> {
    let dims = q.dims();
    assert_eq!(
        dims[D - 1],
        4,
        "qnormalize expects a trailing dimension of 4, got {:?}",
        dims
    );

    let flat = flatten(q, 4);
    let norm = (flat.clone() * flat.clone())
        .sum_dim(1)
        .sqrt()
        .clamp_min(MIN_NORM);

    restore(flat / norm, dims, 4)
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::backend::ndarray::NdArrayDevice;

    use super::*;

    type TestBackend = NdArray;

    fn tensor_2d(rows: &[[f32; 4]]) -> Tensor<TestBackend, 2> {
        let device = NdArrayDevice::default();
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Tensor::<TestBackend, 1>::from_floats(flat.as_slice(), &device).reshape([rows.len(), 4])
    }

    fn to_vec(tensor: Tensor<TestBackend, 2>) -> Vec<f32> {
        tensor
            .into_data()
            .to_vec()
            .expect("tensor data should be f32")
    }

    fn assert_close(actual: &[f32], expected: &[f32], tolerance: f32) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!(
                (a - e).abs() < tolerance,
                "expected {expected:?}, got {actual:?}"
            );
        }
    }

    #[test]
    fn test_qmul_identity() {
        let identity = tensor_2d(&[[1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]]);
        let q = tensor_2d(&[
            [0.5, 0.5, 0.5, 0.5],
            [0.182_574, 0.365_148, 0.547_723, 0.730_297],
        ]);
        let original = to_vec(q.clone());

        let left = to_vec(qmul(q.clone(), identity.clone()));
        let right = to_vec(qmul(identity, q));

        assert_close(&left, &original, 1e-6);
        assert_close(&right, &original, 1e-6);
    }

    #[test]
    fn test_qmul_is_not_commutative() {
        let i = tensor_2d(&[[0.0, 1.0, 0.0, 0.0]]);
        let j = tensor_2d(&[[0.0, 0.0, 1.0, 0.0]]);

        let ij = to_vec(qmul(i.clone(), j.clone()));
        let ji = to_vec(qmul(j, i));

        assert_close(&ij, &[0.0, 0.0, 0.0, 1.0], 1e-6);
        assert_close(&ji, &[0.0, 0.0, 0.0, -1.0], 1e-6);
    }

    #[test]
    fn test_qmul_preserves_leading_shape() {
        let device = NdArrayDevice::default();
        let q = Tensor::<TestBackend, 1>::from_floats([1.0, 0.0, 0.0, 0.0].repeat(6).as_slice(), &device)
            .reshape([2, 3, 4]);
        let product = qmul(q.clone(), q);
        assert_eq!(product.dims(), [2, 3, 4]);
    }

    #[test]
    fn test_qrot_quarter_turn_about_z() {
        let device = NdArrayDevice::default();
        let half = std::f32::consts::FRAC_PI_4;
        let q = tensor_2d(&[[half.cos(), 0.0, 0.0, half.sin()]]);
        let v = Tensor::<TestBackend, 1>::from_floats([1.0, 0.0, 0.0], &device).reshape([1, 3]);

        let rotated = to_vec(qrot(q, v));
        assert_close(&rotated, &[0.0, 1.0, 0.0], 1e-6);
    }

    #[test]
    fn test_qrot_preserves_norm() {
        let device = NdArrayDevice::default();
        let q = qnormalize(tensor_2d(&[
            [0.9, 0.1, -0.3, 0.2],
            [0.2, -0.7, 0.4, 0.5],
            [1.0, 0.0, 0.0, 0.0],
        ]));
        let v = Tensor::<TestBackend, 1>::from_floats(
            [0.3, -1.2, 2.5, 0.0, 0.0, 4.0, 1.0, 1.0, 1.0].as_slice(),
            &device,
        )
        .reshape([3, 3]);

        let rotated = qrot(q, v.clone());
        for (row_in, row_out) in to_vec(v.reshape([3, 3]))
            .chunks_exact(3)
            .zip(to_vec(rotated).chunks_exact(3))
        {
            let norm_in: f32 = row_in.iter().map(|c| c * c).sum::<f32>().sqrt();
            let norm_out: f32 = row_out.iter().map(|c| c * c).sum::<f32>().sqrt();
            assert!((norm_in - norm_out).abs() < 1e-5);
        }
    }

    #[test]
    #[should_panic(expected = "trailing dimension of 4")]
    fn test_qmul_rejects_bad_trailing_dimension() {
        let device = NdArrayDevice::default();
        let bad =
            Tensor::<TestBackend, 1>::from_floats([0.0, 0.0, 1.0], &device).reshape([1, 3]);
        let _ = qmul(bad.clone(), bad);
    }

    #[test]
    #[should_panic(expected = "leading shapes must match")]
    fn test_qrot_rejects_mismatched_batches() {
        let device = NdArrayDevice::default();
        let q = tensor_2d(&[[1.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]]);
        let v = Tensor::<TestBackend, 1>::from_floats([1.0, 0.0, 0.0], &device).reshape([1, 3]);
        let _ = qrot(q, v);
    }

    #[test]
    fn test_qnormalize_unit_output() {
        let q = tensor_2d(&[[2.0, 0.0, 0.0, 0.0], [0.3, -0.1, 0.8, 0.4]]);
        let normalized = to_vec(qnormalize(q));

        for quat in normalized.chunks_exact(4) {
            let norm: f32 = quat.iter().map(|c| c * c).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_qnormalize_zero_quaternion_is_finite() {
        let q = tensor_2d(&[[0.0, 0.0, 0.0, 0.0]]);
        let normalized = to_vec(qnormalize(q));
        assert!(normalized.iter().all(|c| c.is_finite()));
    }
}
