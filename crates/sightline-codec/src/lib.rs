//! Sightline Codec - Compact encodings for transform state
//!
//! Everything a sync message is built from:
//!
//! - **Quantization**: floats onto an integer lattice with a fixed step
//! - **Varints**: zig-zag + LEB128 so small numbers of either sign stay short
//! - **Deltas**: quantized vectors written relative to an agreed baseline
//! - **Rotations**: 32-bit "smallest three" quaternions, or raw `f32`
//!
//! ```text
//!   Vec3 ──quantize──▶ QuantizedVec3 ──(current - baseline)──▶ 3 × svarint
//!                                                                  │
//!   Vec3 ◀─dequantize─ QuantizedVec3 ◀──(baseline + delta)──────────┘
//! ```
//!
//! The codecs are pure functions over `bytes::BufMut` writers and
//! `bytes::Buf` readers. They hold no state; the caller owns the baselines.
//!
//! # Example
//!
//! ```rust
//! use glam::Vec3;
//! use sightline_codec::{delta, quantize, Precision, QuantizedVec3};
//!
//! let precision = Precision::new(0.01).unwrap();
//! let baseline = quantize(Vec3::new(10.0, 0.0, 5.0), precision);
//! let current = quantize(Vec3::new(10.05, 0.0, 5.0), precision);
//!
//! let mut buf = Vec::new();
//! delta::encode(&mut buf, baseline, current);
//! assert_eq!(buf.len(), 3);
//!
//! let decoded = delta::decode(&mut buf.as_slice(), baseline).unwrap();
//! assert_eq!(decoded, current);
//! ```

pub mod delta;
mod error;
mod quantize;
pub mod rotation;
pub mod varint;

pub use error::{CodecError, Result};
pub use quantize::{dequantize, has_changed, quantize, quantized_changed, Precision, QuantizedVec3};
pub use rotation::{compress_quaternion, decompress_quaternion};
