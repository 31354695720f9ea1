//! HNSW (Hierarchical Navigable Small World) index
//!
//! Key properties:
//! - External vector storage: the graph holds ids, vectors are fetched
//!   through [`VectorSource`](crate::vectors::VectorSource)
//! - Every structural mutation is recorded in the commit log in the order
//!   it became visible, so the graph is reconstructable after a restart
//! - One coarse RW-lock over the node arena and entry point, one RW-lock
//!   per node over its adjacency; no lock is held across a vector fetch

pub mod insert;
pub mod node;
pub mod search;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::commitlog::record::CommitRecord;
use crate::commitlog::{replay, CommitLog, ReplaySink};
use crate::config::IndexParams;
use crate::distance::Distancer;
use crate::error::{GossamerError, Result};
use crate::vectors::VectorSource;
use node::Node;

/// HNSW index with external vector storage and a durable commit log
pub struct HnswIndex {
    id: String,
    params: IndexParams,
    core: RwLock<GraphCore>,
    commit_log: CommitLog,
    distancer: Distancer,
}

/// Graph state guarded by the coarse lock
struct GraphCore {
    /// Dense arena: index = node id, absent slots not yet inserted
    nodes: Vec<Option<Arc<Node>>>,
    /// Node at the current top layer; all searches start here
    entry_point: Option<u32>,
    /// Highest level among all nodes; never decreases
    max_layer: usize,
    /// Number of populated slots
    populated: usize,
}

impl GraphCore {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            entry_point: None,
            max_layer: 0,
            populated: 0,
        }
    }

    fn get(&self, id: u32) -> Option<Arc<Node>> {
        self.nodes.get(id as usize).and_then(|slot| slot.clone())
    }

    fn place(&mut self, node: Arc<Node>) {
        let idx = node.id() as usize;
        if idx >= self.nodes.len() {
            self.nodes.resize(idx + 1, None);
        }
        self.nodes[idx] = Some(node);
        self.populated += 1;
    }

    fn remove(&mut self, id: u32) {
        if let Some(slot) = self.nodes.get_mut(id as usize) {
            if slot.take().is_some() {
                self.populated -= 1;
            }
        }
    }
}

/// Per-level node counts, from [`HnswIndex::stats`]
#[derive(Clone, Debug)]
pub struct IndexStats {
    pub node_count: usize,
    pub max_layer: usize,
    pub nodes_per_level: BTreeMap<usize, usize>,
}

impl HnswIndex {
    /// Open or create an index rooted at `root`
    ///
    /// Replays any existing commit log segments under
    /// `<root>/<id>.commitlog.d` before accepting writes.
    pub fn open(
        root: &Path,
        id: impl Into<String>,
        params: IndexParams,
        source: Arc<dyn VectorSource>,
    ) -> Result<Self> {
        Self::open_inner(
            root,
            id.into(),
            params,
            crate::defaults::DEFAULT_SEGMENT_MAX_BYTES,
            source,
        )
    }

    /// Open with a full [`Config`](crate::config::Config), including the
    /// commit log rotation threshold
    pub fn open_with_config(
        root: &Path,
        id: impl Into<String>,
        config: &crate::config::Config,
        source: Arc<dyn VectorSource>,
    ) -> Result<Self> {
        Self::open_inner(
            root,
            id.into(),
            config.index.clone(),
            config.segment_max_bytes,
            source,
        )
    }

    fn open_inner(
        root: &Path,
        id: String,
        params: IndexParams,
        segment_max_bytes: u64,
        source: Arc<dyn VectorSource>,
    ) -> Result<Self> {
        let log_dir = root.join(format!("{id}.commitlog.d"));
        let commit_log = CommitLog::open_with_threshold(&log_dir, segment_max_bytes)?;

        let mut assembler = GraphAssembler {
            core: GraphCore::with_capacity(params.import_limit),
        };
        replay(&log_dir, &mut assembler)?;

        Ok(Self {
            id,
            params,
            core: RwLock::new(assembler.core),
            commit_log,
            distancer: Distancer::new(source),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn params(&self) -> &IndexParams {
        &self.params
    }

    /// Number of nodes in the graph
    pub fn len(&self) -> usize {
        self.core.read().populated
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current `(entry_point, max_layer)` pair
    pub fn entry_state(&self) -> (Option<u32>, usize) {
        let core = self.core.read();
        (core.entry_point, core.max_layer)
    }

    /// Look up a node under the shared lock
    pub fn get_node(&self, id: u32) -> Option<Arc<Node>> {
        self.core.read().get(id)
    }

    /// Insert a vector by id, drawing its level and linking it in
    pub fn insert(&self, id: u32) -> Result<()> {
        self.insert_with_cancel(id, &CancellationToken::new())
    }

    /// Insert with cooperative cancellation between level iterations
    pub fn insert_with_cancel(&self, id: u32, cancel: &CancellationToken) -> Result<()> {
        insert::insert(self, id, cancel)
    }

    /// k nearest neighbors of the node `query`, closest first
    ///
    /// `ef` falls back to the configured search beam width. Returns an empty
    /// vec on an empty graph.
    pub fn knn(&self, query: u32, k: usize, ef: Option<usize>) -> Result<Vec<u32>> {
        self.knn_with_cancel(query, k, ef, &CancellationToken::new())
    }

    /// kNN with cooperative cancellation between level iterations
    pub fn knn_with_cancel(
        &self,
        query: u32,
        k: usize,
        ef: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<Vec<u32>> {
        search::knn(self, query, k, ef.unwrap_or(self.params.ef_search), cancel)
    }

    /// Insert a new node; fails with `DuplicateNode` if the id is populated
    ///
    /// Emits `AddNode` before the node becomes visible; if the append fails
    /// the node is not placed.
    pub fn upsert_node(&self, id: u32, level: usize) -> Result<Arc<Node>> {
        let mut core = self.core.write();
        if core.get(id).is_some() {
            return Err(GossamerError::DuplicateNode { id });
        }

        self.commit_log
            .append(&CommitRecord::AddNode {
                id,
                level: level as u16,
            })
            .map_err(|source| GossamerError::LogAppend { source })?;

        let node = Arc::new(Node::new(id, level));
        core.place(node.clone());
        Ok(node)
    }

    /// Append `neighbor` to `node`'s list at `level` (one side only)
    ///
    /// Idempotent when the link already exists. The symmetric direction is a
    /// second call; cross-node symmetry is an eventual property.
    pub fn add_link(&self, node: u32, neighbor: u32, level: usize) -> Result<()> {
        let node = self
            .get_node(node)
            .ok_or(GossamerError::NotFound { id: node })?;
        node.link(level, neighbor, &self.commit_log)
    }

    /// Atomically replace `node`'s adjacency at `level`
    pub fn replace_links(&self, node: u32, level: usize, neighbors: Vec<u32>) -> Result<()> {
        let node = self
            .get_node(node)
            .ok_or(GossamerError::NotFound { id: node })?;
        node.replace(level, neighbors, &self.commit_log)
    }

    /// Promote `id` to entry point with the new `max_layer`
    ///
    /// Callers pass `level >= max_layer`; a promotion that lost the race to
    /// a higher one is ignored without logging.
    pub fn set_entry(&self, id: u32, level: usize) -> Result<()> {
        let mut core = self.core.write();
        if core.entry_point.is_some() && level < core.max_layer {
            return Ok(());
        }

        self.commit_log
            .append(&CommitRecord::SetEntry {
                id,
                max_layer: level as u16,
            })
            .map_err(|source| GossamerError::LogAppend { source })?;

        core.entry_point = Some(id);
        core.max_layer = level;
        Ok(())
    }

    /// First-node fast path; also claims the entry point after a crash that
    /// logged `AddNode` without its `SetEntry`
    ///
    /// Returns false when an entry point already exists and the normal
    /// insert path should run.
    pub(crate) fn insert_first(&self, id: u32) -> Result<bool> {
        let mut core = self.core.write();
        if core.entry_point.is_some() {
            return Ok(false);
        }
        if core.get(id).is_some() {
            return Err(GossamerError::DuplicateNode { id });
        }

        self.commit_log
            .append(&CommitRecord::AddNode { id, level: 0 })
            .map_err(|source| GossamerError::LogAppend { source })?;
        core.place(Arc::new(Node::new(id, 0)));

        if let Err(source) = self.commit_log.append(&CommitRecord::SetEntry {
            id,
            max_layer: 0,
        }) {
            // The AddNode record stands; replay yields a stub with no entry,
            // which is the same state the caller observes after this error.
            core.remove(id);
            return Err(GossamerError::LogAppend { source });
        }

        core.entry_point = Some(id);
        core.max_layer = 0;
        Ok(true)
    }

    pub(crate) fn distancer(&self) -> &Distancer {
        &self.distancer
    }

    pub(crate) fn commit_log(&self) -> &CommitLog {
        &self.commit_log
    }

    /// Flush the commit log and hold segment rotation so the durable file
    /// list stays stable while a backup copies it
    pub fn pause_maintenance(&self) -> Result<()> {
        self.commit_log.pause_rotation();
        self.commit_log.flush()?;
        Ok(())
    }

    /// Release the rotation hold taken by [`pause_maintenance`]
    ///
    /// [`pause_maintenance`]: HnswIndex::pause_maintenance
    pub fn resume_maintenance(&self) -> Result<()> {
        self.commit_log.resume_rotation();
        Ok(())
    }

    /// Relative paths of the files that make up this index's durable state
    pub fn commit_files(&self) -> Result<Vec<String>> {
        let prefix = format!("{}.commitlog.d", self.id);
        Ok(self
            .commit_log
            .segment_files()?
            .into_iter()
            .map(|f| format!("{prefix}/{f}"))
            .collect())
    }

    /// Per-level population histogram
    pub fn stats(&self) -> IndexStats {
        let core = self.core.read();
        let mut nodes_per_level = BTreeMap::new();
        for node in core.nodes.iter().flatten() {
            *nodes_per_level.entry(node.level()).or_insert(0) += 1;
        }
        IndexStats {
            node_count: core.populated,
            max_layer: core.max_layer,
            nodes_per_level,
        }
    }
}

/// Rebuilds a [`GraphCore`] from replayed commit records, without re-logging
struct GraphAssembler {
    core: GraphCore,
}

impl ReplaySink for GraphAssembler {
    fn add_node(&mut self, id: u32, level: u16) {
        // A node that already exists keeps its state; links dedup, so
        // replaying the same log twice converges to the same graph.
        if self.core.get(id).is_some() {
            return;
        }
        self.core.place(Arc::new(Node::new(id, level as usize)));
    }

    fn add_link(&mut self, node: u32, level: u16, neighbor: u32) {
        match self.core.get(node) {
            Some(n) => n.apply_link(level as usize, neighbor),
            None => warn!(node, neighbor, level, "link record for unknown node, skipping"),
        }
    }

    fn replace_links(&mut self, node: u32, level: u16, neighbors: Vec<u32>) {
        match self.core.get(node) {
            Some(n) => n.apply_replace(level as usize, neighbors),
            None => warn!(node, level, "replace record for unknown node, skipping"),
        }
    }

    fn set_entry(&mut self, id: u32, max_layer: u16) {
        self.core.entry_point = Some(id);
        self.core.max_layer = max_layer as usize;
    }
}
