//! Graph node representation
//!
//! Each node carries its own RW-lock over the adjacency map so concurrent
//! inserts only contend on the nodes they actually touch. The commit record
//! for a link mutation is emitted inside that lock, which keeps log order
//! equal to the order mutations become visible.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::commitlog::record::CommitRecord;
use crate::commitlog::CommitLog;
use crate::error::{GossamerError, Result};

/// A node in the HNSW graph
pub struct Node {
    id: u32,
    /// Top layer this node participates in; assigned once at insertion
    level: usize,
    /// Neighbor ids per level, `0..=level`
    connections: RwLock<HashMap<usize, Vec<u32>>>,
}

impl Node {
    pub(crate) fn new(id: u32, level: usize) -> Self {
        Self {
            id,
            level,
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Snapshot of the neighbor list at a level
    ///
    /// Clones under the read lock so callers can compute distances without
    /// holding it.
    pub fn connections_at(&self, level: usize) -> Vec<u32> {
        self.connections
            .read()
            .get(&level)
            .cloned()
            .unwrap_or_default()
    }

    /// Levels that currently have a neighbor list
    pub fn levels(&self) -> Vec<usize> {
        let mut levels: Vec<usize> = self.connections.read().keys().copied().collect();
        levels.sort_unstable();
        levels
    }

    /// Append `target` to this node's list at `level`, logging the mutation
    ///
    /// Idempotent: an already-present target (or a self-link) is skipped
    /// without a record. A failed append leaves the adjacency untouched.
    pub(crate) fn link(&self, level: usize, target: u32, log: &CommitLog) -> Result<()> {
        if target == self.id {
            return Ok(());
        }

        let mut connections = self.connections.write();
        let list = connections.entry(level).or_default();
        if list.contains(&target) {
            return Ok(());
        }

        log.append(&CommitRecord::AddLink {
            node: self.id,
            level: level as u16,
            neighbor: target,
        })
        .map_err(|source| GossamerError::LogAppend { source })?;

        list.push(target);
        Ok(())
    }

    /// Atomically replace this node's list at `level`, logging the mutation
    pub(crate) fn replace(&self, level: usize, neighbors: Vec<u32>, log: &CommitLog) -> Result<()> {
        let mut connections = self.connections.write();

        log.append(&CommitRecord::ReplaceLinks {
            node: self.id,
            level: level as u16,
            neighbors: neighbors.clone(),
        })
        .map_err(|source| GossamerError::LogAppend { source })?;

        connections.insert(level, neighbors);
        Ok(())
    }

    /// Remove `target` from this node's list at `level`
    ///
    /// Logged as a full replacement, since the wire format has no
    /// single-link removal. No-op when the link is absent.
    pub(crate) fn unlink(&self, level: usize, target: u32, log: &CommitLog) -> Result<()> {
        let mut connections = self.connections.write();
        let Some(list) = connections.get_mut(&level) else {
            return Ok(());
        };
        if !list.contains(&target) {
            return Ok(());
        }

        let updated: Vec<u32> = list.iter().copied().filter(|&n| n != target).collect();
        log.append(&CommitRecord::ReplaceLinks {
            node: self.id,
            level: level as u16,
            neighbors: updated.clone(),
        })
        .map_err(|source| GossamerError::LogAppend { source })?;

        *list = updated;
        Ok(())
    }

    /// Replay-path mutations: apply without logging
    pub(crate) fn apply_link(&self, level: usize, target: u32) {
        if target == self.id {
            return;
        }
        let mut connections = self.connections.write();
        let list = connections.entry(level).or_default();
        if !list.contains(&target) {
            list.push(target);
        }
    }

    pub(crate) fn apply_replace(&self, level: usize, neighbors: Vec<u32>) {
        self.connections.write().insert(level, neighbors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log() -> (tempfile::TempDir, CommitLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = CommitLog::open(dir.path()).unwrap();
        (dir, log)
    }

    #[test]
    fn test_link_idempotent() {
        let (_dir, log) = temp_log();
        let node = Node::new(1, 0);

        node.link(0, 2, &log).unwrap();
        node.link(0, 2, &log).unwrap();

        assert_eq!(node.connections_at(0), vec![2]);
    }

    #[test]
    fn test_no_self_loop() {
        let (_dir, log) = temp_log();
        let node = Node::new(1, 0);

        node.link(0, 1, &log).unwrap();
        assert!(node.connections_at(0).is_empty());
    }

    #[test]
    fn test_unlink() {
        let (_dir, log) = temp_log();
        let node = Node::new(1, 0);

        node.link(0, 2, &log).unwrap();
        node.link(0, 3, &log).unwrap();

        node.unlink(0, 2, &log).unwrap();
        assert_eq!(node.connections_at(0), vec![3]);

        // Absent link is a no-op
        node.unlink(0, 9, &log).unwrap();
        assert_eq!(node.connections_at(0), vec![3]);
    }

    #[test]
    fn test_replace() {
        let (_dir, log) = temp_log();
        let node = Node::new(1, 2);

        node.link(1, 2, &log).unwrap();
        node.link(1, 3, &log).unwrap();
        node.replace(1, vec![4, 5], &log).unwrap();

        assert_eq!(node.connections_at(1), vec![4, 5]);
        // Other levels untouched
        assert!(node.connections_at(0).is_empty());
    }
}
