//! Layer search and kNN
//!
//! The beam (`search_layer`) is shared by queries and inserts: queries run
//! it with `ef` at layer 0 after a greedy descent, inserts run it per layer
//! to collect link candidates.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use super::HnswIndex;
use crate::candidates::{Candidate, CandidateSet};
use crate::error::{GossamerError, Result};

/// Greedy best-first search within a single layer
///
/// Expands the closest unexplored candidate until the closest one left is
/// farther than the worst of `ef` results. Distance failures abort the whole
/// operation; the visited set is per call.
pub(super) fn search_layer(
    index: &HnswIndex,
    query: u32,
    entry_points: &CandidateSet,
    ef: usize,
    level: usize,
    cancel: &CancellationToken,
) -> Result<CandidateSet> {
    let mut visited: HashSet<u32> = entry_points.in_order().map(|c| c.id).collect();
    let mut candidates = entry_points.clone();
    let mut results = entry_points.clone();

    while let Some(current) = candidates.pop_min() {
        if cancel.is_cancelled() {
            return Err(GossamerError::Cancelled);
        }

        if let Some(worst) = results.max() {
            if current.dist > worst.dist && results.len() >= ef {
                break;
            }
        }

        // The farthest result stays fixed for this candidate's whole
        // neighbor expansion; admissions do not tighten it mid-loop
        let worst = results.max().map(|c| c.dist);

        let Some(node) = index.get_node(current.id) else {
            continue;
        };

        // Snapshot the adjacency, then compute distances without any lock
        for neighbor in node.connections_at(level) {
            if !visited.insert(neighbor) {
                continue;
            }

            let dist = index
                .distancer()
                .between(neighbor, query)
                .map_err(GossamerError::search)?;

            let admit = match worst {
                Some(worst) => results.len() < ef || dist < worst,
                None => true,
            };
            if admit {
                results.insert(neighbor, dist);
                candidates.insert(neighbor, dist);
                if results.len() > ef {
                    results.pop_max();
                }
            }
        }
    }

    Ok(results)
}

/// k nearest neighbors of `query`, ascending by distance
pub(super) fn knn(
    index: &HnswIndex,
    query: u32,
    k: usize,
    ef: usize,
    cancel: &CancellationToken,
) -> Result<Vec<u32>> {
    let (entry, max_layer) = index.entry_state();
    let Some(entry) = entry else {
        return Ok(Vec::new());
    };

    let dist = index.distancer().between(entry, query)?;
    let mut best = Candidate::new(entry, dist);

    // Greedy descent down to layer 1; layer 0 gets the full beam
    for level in (1..=max_layer).rev() {
        if cancel.is_cancelled() {
            return Err(GossamerError::Cancelled);
        }
        let found = search_layer(
            index,
            query,
            &CandidateSet::with_entry(best.id, best.dist),
            1,
            level,
            cancel,
        )?;
        if let Some(min) = found.min() {
            best = min;
        }
    }

    let found = search_layer(
        index,
        query,
        &CandidateSet::with_entry(best.id, best.dist),
        ef.max(k),
        0,
        cancel,
    )?;

    Ok(found.in_order().take(k).map(|c| c.id).collect())
}
