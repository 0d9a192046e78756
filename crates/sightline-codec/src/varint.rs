//! Variable-length integers
//!
//! Unsigned values use LEB128: 7 payload bits per byte, high bit set on every
//! byte except the last. Signed values are zig-zag mapped first so small
//! magnitudes of either sign stay short (`-64..=63` fits one byte).

use crate::{CodecError, Result};
use bytes::{Buf, BufMut};

/// Longest encoding of a `u64`
pub const MAX_VARINT_LEN: usize = 10;

/// Map a signed value onto the unsigned range, interleaving signs
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Write an unsigned varint
pub fn write_varint(writer: &mut impl BufMut, mut value: u64) {
    while value >= 0x80 {
        writer.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    writer.put_u8(value as u8);
}

/// Read an unsigned varint
pub fn read_varint(reader: &mut impl Buf) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        if !reader.has_remaining() {
            return Err(CodecError::UnexpectedEnd { needed: 1 });
        }
        let byte = reader.get_u8();
        // The tenth byte may only carry the top bit of a u64
        if shift == 63 && byte > 1 {
            return Err(CodecError::VarintOverflow);
        }
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Write a signed varint
pub fn write_svarint(writer: &mut impl BufMut, value: i64) {
    write_varint(writer, zigzag_encode(value));
}

/// Read a signed varint
pub fn read_svarint(reader: &mut impl Buf) -> Result<i64> {
    read_varint(reader).map(zigzag_decode)
}

/// Encoded size of `value` in bytes
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}
