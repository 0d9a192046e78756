//! Rotation and raw float encodings
//!
//! Compressed rotations use "smallest three": a unit quaternion is fully
//! determined by any three of its components, so the largest one is dropped
//! and rebuilt on decode. Since `q` and `-q` are the same rotation, the
//! quaternion is flipped so the dropped component is positive. The three
//! survivors lie in `[-1/√2, 1/√2]` and get 10 bits each.
//!
//! ```text
//!  31 30 29        20 19        10 9          0
//! [idx ][    a      ][     b      ][     c     ]
//! ```

use crate::{CodecError, Result};
use bytes::{Buf, BufMut};
use glam::{Quat, Vec3};
use std::f32::consts::FRAC_1_SQRT_2;

const COMPONENT_BITS: u32 = 10;
const COMPONENT_MAX: u32 = (1 << COMPONENT_BITS) - 1;

/// Size of a compressed rotation on the wire
pub const COMPRESSED_ROTATION_LEN: usize = 4;
/// Size of an uncompressed rotation on the wire
pub const RAW_ROTATION_LEN: usize = 16;
/// Size of a raw `Vec3` on the wire
pub const RAW_VEC3_LEN: usize = 12;

fn encode_component(value: f32) -> u32 {
    let normalized = (value + FRAC_1_SQRT_2) / (2.0 * FRAC_1_SQRT_2);
    let scaled = (normalized * COMPONENT_MAX as f32).round();
    scaled.clamp(0.0, COMPONENT_MAX as f32) as u32
}

fn decode_component(bits: u32) -> f32 {
    let normalized = (bits & COMPONENT_MAX) as f32 / COMPONENT_MAX as f32;
    normalized * 2.0 * FRAC_1_SQRT_2 - FRAC_1_SQRT_2
}

/// Pack a rotation into 32 bits
///
/// Per-component error is at most `1/√2 / 1023`, well under a tenth of a
/// degree for typical orientations.
pub fn compress_quaternion(rotation: Quat) -> u32 {
    let q = rotation.normalize();
    let components = if q.is_finite() {
        q.to_array()
    } else {
        Quat::IDENTITY.to_array()
    };

    let mut largest = 0;
    for i in 1..4 {
        if components[i].abs() > components[largest].abs() {
            largest = i;
        }
    }
    let sign = if components[largest] < 0.0 { -1.0 } else { 1.0 };

    let mut packed = (largest as u32) << 30;
    let mut shift = 2 * COMPONENT_BITS;
    for (i, value) in components.iter().enumerate() {
        if i == largest {
            continue;
        }
        packed |= encode_component(value * sign) << shift;
        shift = shift.saturating_sub(COMPONENT_BITS);
    }
    packed
}

/// Unpack a rotation produced by [`compress_quaternion`]
pub fn decompress_quaternion(packed: u32) -> Quat {
    let largest = (packed >> 30) as usize;
    let a = decode_component(packed >> (2 * COMPONENT_BITS));
    let b = decode_component(packed >> COMPONENT_BITS);
    let c = decode_component(packed);
    let d = (1.0 - a * a - b * b - c * c).max(0.0).sqrt();

    let mut components = [0.0f32; 4];
    let mut small = [a, b, c].into_iter();
    for (i, slot) in components.iter_mut().enumerate() {
        *slot = if i == largest {
            d
        } else {
            small.next().unwrap_or(0.0)
        };
    }

    let q = Quat::from_array(components).normalize();
    if q.is_finite() {
        q
    } else {
        Quat::IDENTITY
    }
}

fn ensure_remaining(reader: &impl Buf, len: usize) -> Result<()> {
    let remaining = reader.remaining();
    if remaining < len {
        return Err(CodecError::UnexpectedEnd {
            needed: len - remaining,
        });
    }
    Ok(())
}

/// Write a compressed rotation as a little-endian `u32`
pub fn write_compressed_rotation(writer: &mut impl BufMut, rotation: Quat) {
    writer.put_u32_le(compress_quaternion(rotation));
}

/// Read a compressed rotation
pub fn read_compressed_rotation(reader: &mut impl Buf) -> Result<Quat> {
    ensure_remaining(&*reader, COMPRESSED_ROTATION_LEN)?;
    Ok(decompress_quaternion(reader.get_u32_le()))
}

/// Write `x, y, z, w` as little-endian `f32`
pub fn write_raw_rotation(writer: &mut impl BufMut, rotation: Quat) {
    for value in rotation.to_array() {
        writer.put_f32_le(value);
    }
}

/// Read four little-endian `f32` as `x, y, z, w`
///
/// Non-finite or zero-length quaternions are rejected; anything else comes
/// back normalized.
pub fn read_raw_rotation(reader: &mut impl Buf) -> Result<Quat> {
    ensure_remaining(&*reader, RAW_ROTATION_LEN)?;
    let x = reader.get_f32_le();
    let y = reader.get_f32_le();
    let z = reader.get_f32_le();
    let w = reader.get_f32_le();
    let rotation = Quat::from_xyzw(x, y, z, w);
    if !rotation.is_finite() || rotation.length_squared() <= f32::EPSILON {
        return Err(CodecError::NonFinite("rotation"));
    }
    if rotation.is_normalized() {
        Ok(rotation)
    } else {
        Ok(rotation.normalize())
    }
}

/// Write a vector as three little-endian `f32`
pub fn write_raw_vec3(writer: &mut impl BufMut, vector: Vec3) {
    writer.put_f32_le(vector.x);
    writer.put_f32_le(vector.y);
    writer.put_f32_le(vector.z);
}

/// Read three little-endian `f32`, rejecting NaN and infinities
pub fn read_raw_vec3(reader: &mut impl Buf) -> Result<Vec3> {
    ensure_remaining(&*reader, RAW_VEC3_LEN)?;
    let x = reader.get_f32_le();
    let y = reader.get_f32_le();
    let z = reader.get_f32_le();
    let vector = Vec3::new(x, y, z);
    if !vector.is_finite() {
        return Err(CodecError::NonFinite("vector"));
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_same_rotation(a: Quat, b: Quat, tolerance: f32) {
        // q and -q are the same rotation
        let dot = a.dot(b).abs();
        assert!(dot >= 1.0 - tolerance, "{:?} vs {:?} (dot {})", a, b, dot);
    }

    // ========================================================================
    // Smallest three
    // ========================================================================

    #[test]
    fn test_identity_round_trip() {
        let packed = compress_quaternion(Quat::IDENTITY);
        assert_eq!(packed >> 30, 3);
        assert_same_rotation(decompress_quaternion(packed), Quat::IDENTITY, 1e-5);
    }

    #[test]
    fn test_arbitrary_rotations_round_trip() {
        let rotations = [
            Quat::from_rotation_y(1.0),
            Quat::from_rotation_x(-2.5),
            Quat::from_euler(glam::EulerRot::XYZ, 0.3, -1.2, 2.9),
            Quat::from_axis_angle(Vec3::new(1.0, 1.0, 0.0).normalize(), 3.0),
        ];
        for rotation in rotations {
            let back = decompress_quaternion(compress_quaternion(rotation));
            assert_same_rotation(back, rotation, 1e-5);
            assert!(back.angle_between(rotation) < 0.01);
        }
    }

    #[test]
    fn test_negative_largest_component_is_flipped() {
        let q = Quat::from_xyzw(0.1, 0.1, 0.1, -0.98).normalize();
        let back = decompress_quaternion(compress_quaternion(q));
        assert!(back.w > 0.0);
        assert_same_rotation(back, q, 1e-5);
    }

    #[test]
    fn test_non_finite_input_falls_back_to_identity() {
        let packed = compress_quaternion(Quat::from_xyzw(f32::NAN, 0.0, 0.0, 1.0));
        assert_same_rotation(decompress_quaternion(packed), Quat::IDENTITY, 1e-5);
    }

    // ========================================================================
    // Raw encodings
    // ========================================================================

    #[test]
    fn test_raw_encodings_are_exact() {
        let mut buf = Vec::new();
        let v = Vec3::new(1.5, -0.25, 1e6);
        let q = Quat::from_rotation_z(0.7);
        write_raw_vec3(&mut buf, v);
        write_raw_rotation(&mut buf, q);
        assert_eq!(buf.len(), RAW_VEC3_LEN + RAW_ROTATION_LEN);

        let mut reader = buf.as_slice();
        assert_eq!(read_raw_vec3(&mut reader), Ok(v));
        assert_eq!(read_raw_rotation(&mut reader), Ok(q));
        assert!(reader.is_empty());
    }

    #[test]
    fn test_raw_rotation_rejects_nan_and_zero() {
        let mut buf = Vec::new();
        write_raw_rotation(&mut buf, Quat::from_xyzw(f32::NAN, 0.0, 0.0, 1.0));
        assert_eq!(
            read_raw_rotation(&mut buf.as_slice()),
            Err(CodecError::NonFinite("rotation"))
        );

        let mut buf = Vec::new();
        write_raw_rotation(&mut buf, Quat::from_xyzw(0.0, 0.0, 0.0, 0.0));
        assert!(read_raw_rotation(&mut buf.as_slice()).is_err());

        let mut buf = Vec::new();
        write_raw_vec3(&mut buf, Vec3::new(0.0, f32::INFINITY, 0.0));
        assert_eq!(
            read_raw_vec3(&mut buf.as_slice()),
            Err(CodecError::NonFinite("vector"))
        );
    }

    #[test]
    fn test_raw_rotation_is_normalized() {
        let mut buf = Vec::new();
        write_raw_rotation(&mut buf, Quat::from_xyzw(0.0, 0.0, 0.0, 3.0));
        let rotation = read_raw_rotation(&mut buf.as_slice()).unwrap();
        assert!(rotation.is_normalized());
        assert!((rotation.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_short_reads_report_missing_bytes() {
        let mut reader: &[u8] = &[0; 5];
        assert_eq!(
            read_raw_vec3(&mut reader),
            Err(CodecError::UnexpectedEnd { needed: 7 })
        );

        let mut reader: &[u8] = &[0; 3];
        assert_eq!(
            read_compressed_rotation(&mut reader),
            Err(CodecError::UnexpectedEnd { needed: 1 })
        );
    }
}
