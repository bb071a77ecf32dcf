//! Quaternion to Euler-angle extraction.

use std::fmt;
use std::str::FromStr;

use burn::prelude::*;

use crate::{flatten, restore};

/// Axis convention for Euler-angle extraction.
///
/// Each order maps to a distinct closed-form combination of `atan2` and a
/// clamped `asin`; the orders are not reducible to one shared formula
/// because the axis ordering changes which pair of terms feeds which
/// trigonometric identity. Keeping the set closed makes an unrecognized
/// order unrepresentable past the parsing boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EulerOrder {
    XYZ,
    YZX,
    ZXY,
    XZY,
    YXZ,
    ZYX,
}

impl EulerOrder {
    /// All six recognized orders.
    pub const ALL: [Self; 6] = [
        Self::XYZ,
        Self::YZX,
        Self::ZXY,
        Self::XZY,
        Self::YXZ,
        Self::ZYX,
    ];

    const fn as_str(self) -> &'static str {
        match self {
            Self::XYZ => "xyz",
            Self::YZX => "yzx",
            Self::ZXY => "zxy",
            Self::XZY => "xzy",
            Self::YXZ => "yxz",
            Self::ZYX => "zyx",
        }
    }
}

impl fmt::Display for EulerOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EulerOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xyz" => Ok(Self::XYZ),
            "yzx" => Ok(Self::YZX),
            "zxy" => Ok(Self::ZXY),
            "xzy" => Ok(Self::XZY),
            "yxz" => Ok(Self::YXZ),
            "zyx" => Ok(Self::ZYX),
            other => Err(anyhow::anyhow!(
                "unrecognized Euler order {other:?}, expected one of xyz, yzx, zxy, xzy, yxz, zyx"
            )),
        }
    }
}

/// `asin` with its argument clamped to `[-1 + epsilon, 1 - epsilon]`.
///
/// The clamp guards against floating-point overshoot past the valid domain
/// near gimbal lock; `epsilon` trades numeric safety against precision at
/// the pole and is chosen by the caller.
fn asin_clamped(value: f32, epsilon: f32) -> f32 {
    value.clamp(-1.0 + epsilon, 1.0 - epsilon).asin()
}

/// Extracts the Euler angles of one quaternion under `order`.
fn angles(q: [f32; 4], order: EulerOrder, epsilon: f32) -> [f32; 3] {
    let [q0, q1, q2, q3] = q;

    match order {
        EulerOrder::XYZ => [
            (2.0 * (q0 * q1 - q2 * q3)).atan2(1.0 - 2.0 * (q1 * q1 + q2 * q2)),
            asin_clamped(2.0 * (q1 * q3 + q0 * q2), epsilon),
            (2.0 * (q0 * q3 - q1 * q2)).atan2(1.0 - 2.0 * (q2 * q2 + q3 * q3)),
        ],
        EulerOrder::YZX => [
            (2.0 * (q0 * q1 - q2 * q3)).atan2(1.0 - 2.0 * (q1 * q1 + q3 * q3)),
            (2.0 * (q0 * q2 - q1 * q3)).atan2(1.0 - 2.0 * (q2 * q2 + q3 * q3)),
            asin_clamped(2.0 * (q1 * q2 + q0 * q3), epsilon),
        ],
        EulerOrder::ZXY => [
            asin_clamped(2.0 * (q0 * q1 + q2 * q3), epsilon),
            (2.0 * (q0 * q2 - q1 * q3)).atan2(1.0 - 2.0 * (q1 * q1 + q2 * q2)),
            (2.0 * (q0 * q3 - q1 * q2)).atan2(1.0 - 2.0 * (q1 * q1 + q3 * q3)),
        ],
        EulerOrder::XZY => [
            (2.0 * (q0 * q1 + q2 * q3)).atan2(1.0 - 2.0 * (q1 * q1 + q3 * q3)),
            (2.0 * (q0 * q2 + q1 * q3)).atan2(1.0 - 2.0 * (q2 * q2 + q3 * q3)),
            asin_clamped(2.0 * (q0 * q3 - q1 * q2), epsilon),
        ],
        EulerOrder::YXZ => [
            asin_clamped(2.0 * (q0 * q1 - q2 * q3), epsilon),
            (2.0 * (q1 * q3 + q0 * q2)).atan2(1.0 - 2.0 * (q1 * q1 + q2 * q2)),
            (2.0 * (q1 * q2 + q0 * q3)).atan2(1.0 - 2.0 * (q1 * q1 + q3 * q3)),
        ],
        EulerOrder::ZYX => [
            (2.0 * (q0 * q1 + q2 * q3)).atan2(1.0 - 2.0 * (q1 * q1 + q2 * q2)),
            asin_clamped(2.0 * (q0 * q2 - q1 * q3), epsilon),
            (2.0 * (q0 * q3 + q1 * q2)).atan2(1.0 - 2.0 * (q2 * q2 + q3 * q3)),
        ],
    }
}

/// Converts a quaternion batch to Euler angles (radians) under `order`.
///
/// The trailing dimension shrinks from 4 to 3; leading dimensions are
/// preserved. The `asin` branch of each order is clamped by `epsilon`
/// (pass 0 to disable the guard). Angle extraction sits outside the
/// differentiable path: it is an evaluation-time conversion, computed
/// element-wise on host data and rebuilt on the source device.
///
/// # Panics
///
/// Panics if the trailing dimension is not 4.
pub fn qeuler<B: Backend, const D: usize>(
    q: Tensor<B, D>,
    order: EulerOrder,
    epsilon: f32,
) -> Tensor<B, D> {
    let dims = q.dims();
    assert_eq!(
        dims[D - 1],
        4,
        "qeuler expects a trailing dimension of 4, got {:?}",
        dims
    );

    let device = q.device();
    let flat = flatten(q, 4);
    let rows = flat.dims()[0];
    let data: Vec<f32> = flat
        .into_data()
        .convert::<f32>()
        .to_vec()
        .expect("quaternion data converts to f32");

    let mut output = Vec::with_capacity(rows * 3);
    for quat in data.chunks_exact(4) {
        output.extend_from_slice(&angles([quat[0], quat[1], quat[2], quat[3]], order, epsilon));
    }

    let flat_angles =
        Tensor::<B, 1>::from_floats(output.as_slice(), &device).reshape([rows, 3]);
    restore(flat_angles, dims, 3)
}
