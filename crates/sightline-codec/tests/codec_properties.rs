//! Property tests for the quantization and delta codecs

use glam::Vec3;
use proptest::prelude::*;
use sightline_codec::{
    compress_quaternion, decompress_quaternion, delta, dequantize, quantize, varint, Precision,
    QuantizedVec3,
};

fn precision() -> impl Strategy<Value = Precision> {
    (0.01f32..10.0).prop_map(|step| Precision::new(step).unwrap())
}

fn position() -> impl Strategy<Value = Vec3> {
    (-1000.0f32..1000.0, -1000.0f32..1000.0, -1000.0f32..1000.0)
        .prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn lattice_point() -> impl Strategy<Value = QuantizedVec3> {
    (any::<i64>(), any::<i64>(), any::<i64>()).prop_map(|(x, y, z)| QuantizedVec3::new(x, y, z))
}

proptest! {
    #[test]
    fn quantize_is_idempotent(v in position(), p in precision()) {
        let once = quantize(v, p);
        let twice = quantize(dequantize(once, p), p);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn dequantize_stays_within_half_a_step(v in position(), p in precision()) {
        let back = dequantize(quantize(v, p), p);
        let error = (back - v).abs().max_element();
        // Half a step plus f32 slack at |v| <= 1000
        prop_assert!(error <= p.get() * 0.5 + 1e-3);
    }

    #[test]
    fn delta_round_trips(baseline in lattice_point(), current in lattice_point()) {
        let mut buf = Vec::new();
        delta::encode(&mut buf, baseline, current);
        let mut reader = buf.as_slice();
        prop_assert_eq!(delta::decode(&mut reader, baseline), Ok(current));
        prop_assert!(reader.is_empty());
    }

    #[test]
    fn svarint_round_trips(value in any::<i64>()) {
        let mut buf = Vec::new();
        varint::write_svarint(&mut buf, value);
        prop_assert_eq!(buf.len(), varint::varint_len(varint::zigzag_encode(value)));
        prop_assert_eq!(varint::read_svarint(&mut buf.as_slice()), Ok(value));
    }

    #[test]
    fn compressed_rotation_stays_close(x in -1.0f32..1.0, y in -1.0f32..1.0, z in -1.0f32..1.0, w in -1.0f32..1.0) {
        let q = glam::Quat::from_xyzw(x, y, z, w);
        prop_assume!(q.length() > 0.1);
        let q = q.normalize();
        let back = decompress_quaternion(compress_quaternion(q));
        prop_assert!(q.dot(back).abs() > 0.9999);
    }
}
