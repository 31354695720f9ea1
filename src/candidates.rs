//! Priority-ordered candidate set keyed by distance
//!
//! The beam search keeps two of these per call (candidates to expand and the
//! running result set) and needs min, max, and targeted deletion, all in
//! O(log n). Ties on distance break by ascending id — that tie-break is part
//! of the contract so search results are deterministic for a deterministic
//! distance function.

use std::collections::BTreeSet;

/// A node id paired with its distance to the query
#[derive(Clone, Copy, Debug)]
pub struct Candidate {
    pub id: u32,
    pub dist: f32,
}

impl Candidate {
    pub fn new(id: u32, dist: f32) -> Self {
        Self { id, dist }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.dist.total_cmp(&other.dist).is_eq() && self.id == other.id
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then(self.id.cmp(&other.id))
    }
}

/// Ordered set of candidates, smallest distance first
///
/// Holds at most one entry per id: a second insert of the same `(id, dist)`
/// pair is a no-op. Callers guarantee a single distance per id (the distance
/// function is deterministic).
#[derive(Clone, Debug, Default)]
pub struct CandidateSet {
    entries: BTreeSet<Candidate>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a set with a single entry
    pub fn with_entry(id: u32, dist: f32) -> Self {
        let mut set = Self::new();
        set.insert(id, dist);
        set
    }

    pub fn insert(&mut self, id: u32, dist: f32) {
        self.entries.insert(Candidate::new(id, dist));
    }

    /// Closest entry
    pub fn min(&self) -> Option<Candidate> {
        self.entries.first().copied()
    }

    /// Farthest entry
    pub fn max(&self) -> Option<Candidate> {
        self.entries.last().copied()
    }

    /// Remove and return the closest entry
    pub fn pop_min(&mut self) -> Option<Candidate> {
        self.entries.pop_first()
    }

    /// Remove and return the farthest entry
    pub fn pop_max(&mut self) -> Option<Candidate> {
        self.entries.pop_last()
    }

    /// Remove a specific entry; returns whether it was present
    pub fn delete(&mut self, id: u32, dist: f32) -> bool {
        self.entries.remove(&Candidate::new(id, dist))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enumerate entries from smallest to largest distance
    pub fn in_order(&self) -> impl Iterator<Item = Candidate> + '_ {
        self.entries.iter().copied()
    }
}
