//! Float vectors to fixed-precision integer lattices and back
//!
//! Quantization is the "did it move enough to resend" test: two poses whose
//! quantized values are equal are indistinguishable on the wire.

use crate::{CodecError, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Validated quantization step
///
/// Construction rejects zero, negative and non-finite steps, so a
/// `Precision` in hand is always usable on the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Precision(f32);

impl Precision {
    /// One centimeter, assuming meters
    pub const CENTIMETER: Precision = Precision(0.01);

    pub fn new(step: f32) -> Result<Self> {
        if step.is_finite() && step > 0.0 {
            Ok(Self(step))
        } else {
            Err(CodecError::InvalidPrecision(step))
        }
    }

    /// The step size
    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self::CENTIMETER
    }
}

impl TryFrom<f32> for Precision {
    type Error = CodecError;

    fn try_from(step: f32) -> Result<Self> {
        Self::new(step)
    }
}

impl From<Precision> for f32 {
    fn from(precision: Precision) -> Self {
        precision.0
    }
}

/// A 3-vector on an integer lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QuantizedVec3 {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl QuantizedVec3 {
    pub const ZERO: QuantizedVec3 = QuantizedVec3 { x: 0, y: 0, z: 0 };

    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Component-wise `self - rhs`, wrapping on overflow
    pub fn wrapping_sub(self, rhs: QuantizedVec3) -> QuantizedVec3 {
        QuantizedVec3 {
            x: self.x.wrapping_sub(rhs.x),
            y: self.y.wrapping_sub(rhs.y),
            z: self.z.wrapping_sub(rhs.z),
        }
    }

    /// Component-wise `self + rhs`, wrapping on overflow
    pub fn wrapping_add(self, rhs: QuantizedVec3) -> QuantizedVec3 {
        QuantizedVec3 {
            x: self.x.wrapping_add(rhs.x),
            y: self.y.wrapping_add(rhs.y),
            z: self.z.wrapping_add(rhs.z),
        }
    }
}

/// `round(component / precision)` per axis
///
/// Values beyond the `i64` range saturate.
pub fn quantize(vector: Vec3, precision: Precision) -> QuantizedVec3 {
    let step = f64::from(precision.get());
    QuantizedVec3 {
        x: (f64::from(vector.x) / step).round() as i64,
        y: (f64::from(vector.y) / step).round() as i64,
        z: (f64::from(vector.z) / step).round() as i64,
    }
}

/// `component * precision` per axis
pub fn dequantize(quantized: QuantizedVec3, precision: Precision) -> Vec3 {
    let step = f64::from(precision.get());
    Vec3::new(
        (quantized.x as f64 * step) as f32,
        (quantized.y as f64 * step) as f32,
        (quantized.z as f64 * step) as f32,
    )
}

/// True iff any axis differs
pub fn has_changed(prev: QuantizedVec3, curr: QuantizedVec3) -> bool {
    prev != curr
}

/// Whether two float vectors land on different lattice points
pub fn quantized_changed(prev: Vec3, curr: Vec3, precision: Precision) -> bool {
    has_changed(quantize(prev, precision), quantize(curr, precision))
}
