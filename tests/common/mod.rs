//! Shared test utilities
//!
//! Random and seeded vector generation, brute-force ground truth, recall
//! computation, and index fixtures.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use gossamer::distance::cosine_distance;
use gossamer::{HnswIndex, InMemoryVectors, IndexParams};

/// Generate a random normalized vector
pub fn random_vector(dims: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    let v: Vec<f32> = (0..dims).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect();
    normalize(&v)
}

/// Generate a deterministic normalized vector from a seed
pub fn seeded_vector(dims: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let v: Vec<f32> = (0..dims).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect();
    normalize(&v)
}

/// Normalize a vector to unit length
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// Fresh index over an in-memory vector source
pub fn temp_index(params: IndexParams) -> (TempDir, Arc<InMemoryVectors>, HnswIndex) {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(InMemoryVectors::new());
    let index = HnswIndex::open(dir.path(), "main", params, source.clone()).unwrap();
    (dir, source, index)
}

/// Reopen an index over the same directory and source (recovery path)
pub fn reopen_index(
    root: &Path,
    params: IndexParams,
    source: Arc<InMemoryVectors>,
) -> HnswIndex {
    HnswIndex::open(root, "main", params, source).unwrap()
}

/// Store `count` seeded vectors and insert them all
pub fn populate_seeded(
    source: &InMemoryVectors,
    index: &HnswIndex,
    count: u32,
    dims: usize,
    base_seed: u64,
) {
    for id in 0..count {
        source.put(id, seeded_vector(dims, base_seed + id as u64));
        index.insert(id).unwrap();
    }
}

/// Exact k nearest neighbors of `query` among `dataset`, ascending distance,
/// ties broken by id
pub fn brute_force_knn(query: &[f32], dataset: &[(u32, Vec<f32>)], k: usize) -> Vec<u32> {
    let mut scored: Vec<(u32, f32)> = dataset
        .iter()
        .map(|(id, v)| (*id, cosine_distance(query, v)))
        .collect();

    scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    scored.into_iter().take(k).map(|(id, _)| id).collect()
}

/// Recall@k of `results` against `ground_truth`
pub fn calculate_recall(results: &[u32], ground_truth: &[u32], k: usize) -> f64 {
    let results: std::collections::HashSet<_> = results.iter().take(k).collect();
    let truth: std::collections::HashSet<_> = ground_truth.iter().take(k).collect();

    let hits = results.intersection(&truth).count();
    hits as f64 / k.min(truth.len()) as f64
}
