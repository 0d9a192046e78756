//! Delta compression of quantized vectors
//!
//! A vector is written as its difference from a baseline both peers agree
//! on. Nothing in the payload identifies the baseline: if encoder and decoder
//! disagree about it, decoding succeeds and silently yields a wrong value.
//! Keeping baselines in lockstep is the caller's job.

use crate::quantize::QuantizedVec3;
use crate::varint::{read_svarint, write_svarint};
use crate::Result;
use bytes::{Buf, BufMut};

/// Write `current - baseline` as three signed varints
pub fn encode(writer: &mut impl BufMut, baseline: QuantizedVec3, current: QuantizedVec3) {
    let delta = current.wrapping_sub(baseline);
    write_svarint(writer, delta.x);
    write_svarint(writer, delta.y);
    write_svarint(writer, delta.z);
}

/// Read a delta and apply it to `baseline`
pub fn decode(reader: &mut impl Buf, baseline: QuantizedVec3) -> Result<QuantizedVec3> {
    let delta = QuantizedVec3 {
        x: read_svarint(reader)?,
        y: read_svarint(reader)?,
        z: read_svarint(reader)?,
    };
    Ok(baseline.wrapping_add(delta))
}

/// Write an absolute quantized vector (a delta from zero)
pub fn encode_absolute(writer: &mut impl BufMut, value: QuantizedVec3) {
    encode(writer, QuantizedVec3::ZERO, value);
}

/// Read an absolute quantized vector
pub fn decode_absolute(reader: &mut impl Buf) -> Result<QuantizedVec3> {
    decode(reader, QuantizedVec3::ZERO)
}
