//! Similarity metrics and vector arithmetic used by the semantic search scan.

use crate::{validate_dimensions, VectorResult};

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> VectorResult<f32> {
    validate_dimensions(b, a.len())?;
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

/// Euclidean norm (magnitude) of a vector.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity. Dimension mismatch fails; a zero-norm operand yields
/// `0.0` rather than `NaN`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> VectorResult<f32> {
    let numerator = dot(a, b)?;
    let denom = magnitude(a) * magnitude(b);
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok(numerator / denom)
}

/// Euclidean distance between two equal-length vectors.
pub fn l2_distance(a: &[f32], b: &[f32]) -> VectorResult<f32> {
    validate_dimensions(b, a.len())?;
    Ok(a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt())
}

/// Normalizes a vector to unit length. A zero vector normalizes to a zero copy.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let mag = magnitude(v);
    if mag == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / mag).collect()
}

/// Elementwise addition of two equal-length vectors.
pub fn add(a: &[f32], b: &[f32]) -> VectorResult<Vec<f32>> {
    validate_dimensions(b, a.len())?;
    Ok(a.iter().zip(b).map(|(x, y)| x + y).collect())
}

/// Elementwise subtraction of two equal-length vectors.
pub fn sub(a: &[f32], b: &[f32]) -> VectorResult<Vec<f32>> {
    validate_dimensions(b, a.len())?;
    Ok(a.iter().zip(b).map(|(x, y)| x - y).collect())
}

/// Scalar multiplication.
pub fn scale(v: &[f32], factor: f32) -> Vec<f32> {
    v.iter().map(|x| x * factor).collect()
}

/// True iff every element is finite (no NaN, no +/-infinity).
pub fn is_valid(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VectorError;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_opposite_vectors_is_negative_one() {
        let v = vec![1.0, 2.0, 3.0];
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();
        let sim = cosine_similarity(&v, &neg).unwrap();
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_is_zero_not_nan_for_zero_vector() {
        let zero = vec![0.0, 0.0, 0.0];
        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&zero, &v).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero).unwrap(), 0.0);
    }

    #[test]
    fn cosine_bounds_hold() {
        let a = vec![0.3, -1.2, 4.5, 0.0];
        let b = vec![2.1, 0.4, -3.3, 1.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((-1.0 - 1e-6..=1.0 + 1e-6).contains(&sim));
    }

    #[test]
    fn dimension_mismatch_is_rejected_everywhere() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert!(matches!(
            cosine_similarity(&a, &b),
            Err(VectorError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(dot(&a, &b).is_err());
        assert!(l2_distance(&a, &b).is_err());
        assert!(add(&a, &b).is_err());
        assert!(sub(&a, &b).is_err());
    }

    #[test]
    fn normalize_zero_vector_returns_zero_copy() {
        let zero = vec![0.0, 0.0, 0.0];
        assert_eq!(normalize(&zero), zero);
    }

    #[test]
    fn normalize_produces_unit_length() {
        let v = vec![3.0, 4.0];
        let n = normalize(&v);
        assert!((magnitude(&n) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn add_sub_are_inverse() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![0.5, -1.0, 2.0];
        let summed = add(&a, &b).unwrap();
        let back = sub(&summed, &b).unwrap();
        for (x, y) in a.iter().zip(back.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn scale_multiplies_every_element() {
        let v = vec![1.0, -2.0, 3.0];
        assert_eq!(scale(&v, 2.0), vec![2.0, -4.0, 6.0]);
    }

    #[test]
    fn is_valid_rejects_nan_and_infinity() {
        assert!(is_valid(&[1.0, 2.0, 3.0]));
        assert!(!is_valid(&[1.0, f32::NAN, 3.0]));
        assert!(!is_valid(&[1.0, f32::INFINITY, 3.0]));
        assert!(!is_valid(&[1.0, f32::NEG_INFINITY, 3.0]));
    }
}
