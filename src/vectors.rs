//! Vector access abstraction
//!
//! The index never stores vectors; it fetches them by node id through
//! [`VectorSource`]. The durable key->vector map is owned by the storage
//! layer, which may cache or batch fetches freely — the index holds no locks
//! across a fetch.

use parking_lot::RwLock;

use crate::error::{GossamerError, Result};

/// Supplier of vectors by dense node id
pub trait VectorSource: Send + Sync {
    /// Fetch the vector for a node id
    fn vector(&self, id: u32) -> Result<Vec<f32>>;
}

/// Simple in-memory vector source backed by a dense arena
///
/// Used by tests and embedders that keep vectors resident; production
/// deployments implement [`VectorSource`] over their own storage.
#[derive(Default)]
pub struct InMemoryVectors {
    vectors: RwLock<Vec<Option<Vec<f32>>>>,
}

impl InMemoryVectors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a vector under the given id, growing the arena as needed
    pub fn put(&self, id: u32, vector: Vec<f32>) {
        let mut vectors = self.vectors.write();
        let idx = id as usize;
        if idx >= vectors.len() {
            vectors.resize(idx + 1, None);
        }
        vectors[idx] = Some(vector);
    }

    /// Number of populated slots
    pub fn len(&self) -> usize {
        self.vectors.read().iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VectorSource for InMemoryVectors {
    fn vector(&self, id: u32) -> Result<Vec<f32>> {
        self.vectors
            .read()
            .get(id as usize)
            .and_then(|v| v.clone())
            .ok_or(GossamerError::NotFound { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_fetch() {
        let source = InMemoryVectors::new();
        source.put(3, vec![1.0, 0.0]);

        assert_eq!(source.vector(3).unwrap(), vec![1.0, 0.0]);
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn test_missing_id() {
        let source = InMemoryVectors::new();
        source.put(0, vec![1.0]);

        assert!(matches!(
            source.vector(5),
            Err(GossamerError::NotFound { id: 5 })
        ));
    }
}
