//! HNSW insert pipeline
//!
//! An insert publishes the node skeleton first, descends the upper layers
//! greedily, then links level by level, trimming any neighbor whose degree
//! overflows. A failed insert may leave the skeleton behind; empty adjacency
//! is a valid state and a retry of the same id is rejected as a duplicate.

use rand::Rng;

use tokio_util::sync::CancellationToken;

use super::search::search_layer;
use super::HnswIndex;
use crate::candidates::{Candidate, CandidateSet};
use crate::error::{GossamerError, Result};

pub(super) fn insert(index: &HnswIndex, id: u32, cancel: &CancellationToken) -> Result<()> {
    let result = run(index, id, cancel);

    // Group-commit point: everything this insert logged goes durable
    // together, regardless of how far it got. An earlier failure takes
    // precedence over a flush failure.
    let flushed = index.commit_log().flush().map_err(GossamerError::from);
    result.and(flushed)
}

fn run(index: &HnswIndex, id: u32, cancel: &CancellationToken) -> Result<()> {
    if index.insert_first(id)? {
        return Ok(());
    }

    let params = index.params();
    let target_level = random_level(params.level_norm());

    // The entry point exists from here on: it is only ever promoted, and
    // insert_first claims it for the first node.
    let (entry, max_layer) = index.entry_state();
    let entry = entry.expect("non-empty graph has an entry point");

    index.upsert_node(id, target_level)?;

    let dist = index.distancer().between(entry, id)?;
    let mut best = Candidate::new(entry, dist);

    // Descend the layers above the new node's level greedily
    for level in (target_level + 1..=max_layer).rev() {
        if cancel.is_cancelled() {
            return Err(GossamerError::Cancelled);
        }
        let found = search_layer(
            index,
            id,
            &CandidateSet::with_entry(best.id, best.dist),
            1,
            level,
            cancel,
        )?;
        if let Some(min) = found.min() {
            best = min;
        }
    }

    // Link at each level from the node's level down to 0, carrying the
    // result set over as the next level's entry points
    let mut results = CandidateSet::with_entry(best.id, best.dist);
    for level in (0..=target_level.min(max_layer)).rev() {
        if cancel.is_cancelled() {
            return Err(GossamerError::Cancelled);
        }

        results = search_layer(index, id, &results, params.ef_construction, level, cancel)?;

        let max_conns = params.max_connections(level);
        let neighbors = select_neighbors_simple(&results, max_conns);

        for &neighbor in &neighbors {
            index.add_link(id, neighbor, level)?;
            index.add_link(neighbor, id, level)?;

            let Some(neighbor_node) = index.get_node(neighbor) else {
                continue;
            };
            let current = neighbor_node.connections_at(level);
            if current.len() <= max_conns {
                continue;
            }

            // Degree overflow: keep the M closest as seen from the neighbor
            let trimmed = select_neighbors_from_ids(index, neighbor, &current, max_conns)?;
            index.replace_links(neighbor, level, trimmed.clone())?;

            // Dropped neighbors stop pointing back, so adjacency stays
            // symmetric at quiescence
            for &dropped in current.iter().filter(|n| !trimmed.contains(n)) {
                if let Some(dropped_node) = index.get_node(dropped) {
                    dropped_node.unlink(level, neighbor, index.commit_log())?;
                }
            }
        }
    }

    if target_level > max_layer {
        index.set_entry(id, target_level)?;
    }

    Ok(())
}

/// Draw a level from the exponential distribution
///
/// `u` is drawn from (0, 1] so the log never sees zero; the floor of
/// `-ln(u) * level_norm` is therefore always >= 0.
fn random_level(level_norm: f64) -> usize {
    let mut rng = rand::thread_rng();
    let u: f64 = 1.0 - rng.gen::<f64>();
    (-u.ln() * level_norm).floor() as usize
}

/// The `max` closest candidates, ascending by distance
fn select_neighbors_simple(results: &CandidateSet, max: usize) -> Vec<u32> {
    results.in_order().take(max).map(|c| c.id).collect()
}

/// Re-rank `ids` by distance from `base` and keep the `max` closest
fn select_neighbors_from_ids(
    index: &HnswIndex,
    base: u32,
    ids: &[u32],
    max: usize,
) -> Result<Vec<u32>> {
    let mut ranked = CandidateSet::new();
    for &id in ids {
        let dist = index.distancer().between(id, base)?;
        ranked.insert(id, dist);
    }
    Ok(select_neighbors_simple(&ranked, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_level_distribution() {
        let level_norm = 1.0 / (16.0f64).ln();
        let mut level_counts = [0usize; 10];

        for _ in 0..10_000 {
            let level = random_level(level_norm);
            if level < 10 {
                level_counts[level] += 1;
            }
        }

        // Exponential decay: most nodes land on level 0
        assert!(level_counts[0] > level_counts[1]);
        assert!(level_counts[1] > level_counts[2]);
    }

    #[test]
    fn test_select_neighbors_simple() {
        let mut results = CandidateSet::new();
        results.insert(5, 0.5);
        results.insert(1, 0.1);
        results.insert(3, 0.3);
        results.insert(7, 0.7);

        assert_eq!(select_neighbors_simple(&results, 2), vec![1, 3]);
        assert_eq!(select_neighbors_simple(&results, 10), vec![1, 3, 5, 7]);
    }
}
