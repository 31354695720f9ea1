//! Cosine distance between nodes
//!
//! Distances are always computed between node ids; the vectors themselves
//! come from the externally supplied [`VectorSource`]. Callers must not hold
//! graph or node locks across a call, since the fetch may perform I/O.

use std::sync::Arc;

use crate::error::{GossamerError, Result};
use crate::vectors::VectorSource;

/// Cosine distance: `1 - (a.b) / (|a| * |b|)`
///
/// Returns NaN when either vector has zero norm or the dimensions disagree;
/// callers treat NaN as a bad vector.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::NAN;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Computes distances between nodes by fetching their vectors
#[derive(Clone)]
pub struct Distancer {
    source: Arc<dyn VectorSource>,
}

impl Distancer {
    pub fn new(source: Arc<dyn VectorSource>) -> Self {
        Self { source }
    }

    /// Cosine distance between two nodes
    pub fn between(&self, a: u32, b: u32) -> Result<f32> {
        let vec_a = self.fetch_checked(a)?;
        let vec_b = self.fetch_checked(b)?;

        let dist = cosine_distance(&vec_a, &vec_b);
        if dist.is_nan() {
            return Err(GossamerError::bad_vector(
                a,
                format!("NaN distance against id {b}"),
            ));
        }

        Ok(dist)
    }

    fn fetch_checked(&self, id: u32) -> Result<Vec<f32>> {
        let vector = self.source.vector(id)?;
        if vector.is_empty() {
            return Err(GossamerError::bad_vector(id, "zero-length vector"));
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectors::InMemoryVectors;

    #[test]
    fn test_cosine_distance() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_distance(&a, &a) - 0.0).abs() < 1e-6);

        let b = vec![0.0, 1.0, 0.0];
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);

        // Not unit length: norms must be taken into account
        let c = vec![3.0, 0.0, 0.0];
        assert!((cosine_distance(&a, &c) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_norm_is_nan() {
        let zero = vec![0.0, 0.0];
        assert!(cosine_distance(&zero, &[1.0, 0.0]).is_nan());
    }

    #[test]
    fn test_between_symmetric() {
        let source = Arc::new(InMemoryVectors::new());
        source.put(0, vec![1.0, 2.0, 3.0]);
        source.put(1, vec![-2.0, 0.5, 1.0]);
        let distancer = Distancer::new(source);

        let ab = distancer.between(0, 1).unwrap();
        let ba = distancer.between(1, 0).unwrap();
        assert!((ab - ba).abs() < 1e-6);
        assert!(ab >= 0.0);
    }

    #[test]
    fn test_between_missing_vector() {
        let source = Arc::new(InMemoryVectors::new());
        source.put(0, vec![1.0, 0.0]);
        let distancer = Distancer::new(source);

        assert!(matches!(
            distancer.between(0, 9),
            Err(GossamerError::NotFound { id: 9 })
        ));
    }

    #[test]
    fn test_between_zero_vector() {
        let source = Arc::new(InMemoryVectors::new());
        source.put(0, vec![1.0, 0.0]);
        source.put(1, vec![0.0, 0.0]);
        let distancer = Distancer::new(source);

        assert!(matches!(
            distancer.between(0, 1),
            Err(GossamerError::BadVector { .. })
        ));
    }
}
