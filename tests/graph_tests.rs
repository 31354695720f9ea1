//! Graph invariant tests
//!
//! After any sequence of successful inserts the graph must respect the
//! degree bounds, link symmetry, entry-point placement, and contain no
//! self-loops or duplicate links.

mod common;

use common::{populate_seeded, seeded_vector, temp_index};
use gossamer::{GossamerError, IndexParams};
use proptest::prelude::*;

/// Check structural invariants over every populated node
fn assert_invariants(index: &gossamer::HnswIndex, ids: &[u32], params: &IndexParams) {
    let (entry, max_layer) = index.entry_state();

    // Entry property: the entry point lives on the top layer
    let entry = entry.expect("populated graph has an entry point");
    let entry_node = index.get_node(entry).unwrap();
    assert_eq!(
        entry_node.level(),
        max_layer,
        "entry node level must equal max_layer"
    );

    for &id in ids {
        let node = index.get_node(id).unwrap_or_else(|| panic!("node {id} missing"));
        assert!(node.level() <= max_layer);

        for level in node.levels() {
            let connections = node.connections_at(level);

            // Degree bound
            let cap = params.max_connections(level);
            assert!(
                connections.len() <= cap,
                "node {id} level {level}: {} links exceeds cap {cap}",
                connections.len()
            );

            // No self-loops, no duplicates
            assert!(!connections.contains(&id), "node {id} links to itself");
            let mut deduped = connections.clone();
            deduped.sort_unstable();
            deduped.dedup();
            assert_eq!(deduped.len(), connections.len(), "node {id} has duplicate links");

            for &neighbor in &connections {
                let neighbor_node = index
                    .get_node(neighbor)
                    .unwrap_or_else(|| panic!("node {id} links to missing node {neighbor}"));

                // A node appears in no adjacency above its own level
                assert!(
                    neighbor_node.level() >= level,
                    "node {neighbor} (level {}) referenced at level {level}",
                    neighbor_node.level()
                );

                // Symmetry at quiescence
                assert!(
                    neighbor_node.connections_at(level).contains(&id),
                    "link {id} -> {neighbor} at level {level} not reciprocated"
                );
            }
        }
    }
}

#[test]
fn test_invariants_after_sequential_inserts() {
    let params = IndexParams::with_m(4);
    let (_dir, source, index) = temp_index(params.clone());

    populate_seeded(&source, &index, 200, 16, 7);

    let ids: Vec<u32> = (0..200).collect();
    assert_invariants(&index, &ids, &params);
}

#[test]
fn test_degree_trim_with_tiny_m() {
    // m = 2 forces constant trimming
    let mut params = IndexParams::with_m(2);
    params.m_max0 = 2;
    params.ef_construction = 16;
    let (_dir, source, index) = temp_index(params.clone());

    for id in 0..6u32 {
        source.put(id, seeded_vector(8, 100 + id as u64));
        index.insert(id).unwrap();
    }

    for id in 0..6u32 {
        let node = index.get_node(id).unwrap();
        assert!(
            node.connections_at(0).len() <= 2,
            "node {id} exceeds level-0 cap after trim"
        );
    }

    // Trimming keeps the graph symmetric, not just bounded
    let ids: Vec<u32> = (0..6).collect();
    assert_invariants(&index, &ids, &params);
}

#[test]
fn test_max_layer_never_decreases() {
    let params = IndexParams::with_m(4);
    let (_dir, source, index) = temp_index(params);

    let mut previous = 0;
    for id in 0..300u32 {
        source.put(id, seeded_vector(8, 900 + id as u64));
        index.insert(id).unwrap();

        let (_, max_layer) = index.entry_state();
        assert!(max_layer >= previous, "max_layer decreased");
        previous = max_layer;
    }
}

#[test]
fn test_singleton_graph() {
    let (_dir, source, index) = temp_index(IndexParams::default());
    source.put(0, vec![1.0, 0.0, 0.0]);
    index.insert(0).unwrap();

    assert_eq!(index.len(), 1);
    assert_eq!(index.entry_state(), (Some(0), 0));
    assert_eq!(index.knn(0, 1, Some(10)).unwrap(), vec![0]);
}

#[test]
fn test_trivial_pair_symmetric() {
    let (_dir, source, index) = temp_index(IndexParams::default());
    source.put(0, vec![1.0, 0.0]);
    source.put(1, vec![0.0, 1.0]);
    index.insert(0).unwrap();
    index.insert(1).unwrap();

    assert_eq!(index.knn(0, 2, Some(10)).unwrap(), vec![0, 1]);

    let node0 = index.get_node(0).unwrap();
    let node1 = index.get_node(1).unwrap();
    assert!(node0.connections_at(0).contains(&1));
    assert!(node1.connections_at(0).contains(&0));
}

#[test]
fn test_failed_insert_leaves_valid_stub() {
    let params = IndexParams::with_m(4);
    let (_dir, source, index) = temp_index(params.clone());
    populate_seeded(&source, &index, 10, 8, 3);

    // No vector stored under id 50: the insert aborts after publishing
    // the skeleton
    let err = index.insert(50).unwrap_err();
    assert!(matches!(
        err,
        GossamerError::NotFound { .. } | GossamerError::Search { .. }
    ));

    // The stub exists with empty adjacency and its id cannot be reused
    let stub = index.get_node(50).unwrap();
    assert!(stub
        .levels()
        .iter()
        .all(|&l| stub.connections_at(l).is_empty()));
    assert!(matches!(
        index.insert(50),
        Err(GossamerError::DuplicateNode { id: 50 })
    ));

    // The populated part of the graph is unaffected
    let ids: Vec<u32> = (0..10).collect();
    assert_invariants(&index, &ids, &params);
    assert_eq!(index.knn(0, 5, Some(16)).unwrap().len(), 5);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // Invariants hold for arbitrary dataset sizes, dimensions, and M
    #[test]
    fn prop_invariants_hold(
        count in 2u32..60,
        dims in 2usize..24,
        m in 4usize..10,
        seed in 0u64..1_000_000,
    ) {
        let params = IndexParams::with_m(m);
        let (_dir, source, index) = temp_index(params.clone());

        for id in 0..count {
            source.put(id, seeded_vector(dims, seed + id as u64));
            index.insert(id).unwrap();
        }

        let ids: Vec<u32> = (0..count).collect();
        assert_invariants(&index, &ids, &params);

        // Search returns exactly min(k, n) ids when ef >= k
        let results = index.knn(0, 10, Some(32)).unwrap();
        prop_assert_eq!(results.len(), 10.min(count as usize));
    }
}
