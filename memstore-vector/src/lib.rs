//! Float32 vector codec and similarity metrics.
//!
//! This crate never computes embeddings — it only serializes, deserializes,
//! and compares caller-supplied vectors.

pub mod codec;
pub mod metrics;

pub use codec::{deserialize, serialize};
pub use metrics::{add, cosine_similarity, dot, is_valid, l2_distance, magnitude, normalize, scale, sub};

use thiserror::Error;

/// Errors raised by the codec and metric functions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VectorError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("byte buffer length {len} is not a multiple of 4")]
    MisalignedBuffer { len: usize },

    #[error("vector contains a non-finite element at index {index}")]
    NonFinite { index: usize },
}

pub type VectorResult<T> = Result<T, VectorError>;

/// Validates that `v` has exactly `dimensions` elements.
pub fn validate_dimensions(v: &[f32], dimensions: usize) -> VectorResult<()> {
    if v.len() != dimensions {
        return Err(VectorError::DimensionMismatch {
            expected: dimensions,
            actual: v.len(),
        });
    }
    Ok(())
}
