//! Binary serialization for embeddings: little-endian IEEE-754 float32, tightly
//! packed, no header. This is the on-disk BLOB format for the `embedding` columns.

use crate::{VectorError, VectorResult};

/// Serializes a float sequence into its little-endian byte representation.
/// Output length is always `4 * v.len()`.
pub fn serialize(v: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(v.len() * 4);
    for &x in v {
        buf.extend_from_slice(&x.to_le_bytes());
    }
    buf
}

/// Deserializes a byte buffer produced by [`serialize`] back into a float
/// sequence. Fails if `bytes.len()` is not a multiple of 4.
pub fn deserialize(bytes: &[u8]) -> VectorResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(VectorError::MisalignedBuffer { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = chunk.try_into().expect("chunks_exact(4) yields 4 bytes");
            f32::from_le_bytes(arr)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prop_assert_eq;

    #[test]
    fn round_trip_is_exact() {
        let v = vec![1.0_f32, -2.5, 0.0, f32::MIN_POSITIVE, 123456.789];
        let bytes = serialize(&v);
        assert_eq!(bytes.len(), v.len() * 4);
        let back = deserialize(&bytes).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn empty_vector_round_trips() {
        let v: Vec<f32> = vec![];
        let bytes = serialize(&v);
        assert!(bytes.is_empty());
        assert_eq!(deserialize(&bytes).unwrap(), v);
    }

    #[test]
    fn misaligned_buffer_is_rejected() {
        let err = deserialize(&[0u8, 1, 2]).unwrap_err();
        assert_eq!(err, VectorError::MisalignedBuffer { len: 3 });
    }

    #[test]
    fn byte_length_is_four_times_dimension() {
        let v = vec![0.0_f32; 384];
        assert_eq!(serialize(&v).len(), 384 * 4);
    }

    proptest::proptest! {
        #[test]
        fn prop_round_trip(v in proptest::collection::vec(proptest::num::f32::ANY, 0..64)) {
            let v: Vec<f32> = v.into_iter().filter(|x| x.is_finite()).collect();
            let bytes = serialize(&v);
            let back = deserialize(&bytes).unwrap();
            prop_assert_eq!(v, back);
        }
    }
}
