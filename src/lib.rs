//! # Gossamer
//!
//! An embeddable approximate-nearest-neighbor index: a concurrent HNSW graph
//! whose every structural mutation is recorded in an append-only commit log,
//! plus the backup protocol that quiesces a live class for a consistent
//! on-disk snapshot.
//!
//! ## Architecture
//!
//! ```text
//! Catalog (class registry)
//!     │
//!     ▼
//! IndexBackup (per-class backup slot)
//!     │
//!     ▼
//! Shard ──────────────┐
//!     │               │
//!     ▼               ▼
//! HnswIndex       CommitLog (segmented, append-only)
//!     │
//!     ▼
//! VectorSource (external key -> vector map)
//! ```
//!
//! ## Features
//!
//! - **Recoverable graph**: the commit log is a replayable history of
//!   mutations, not a state dump; replay rebuilds the exact graph
//! - **Concurrent**: searches and inserts run in parallel under one coarse
//!   graph lock plus per-node adjacency locks
//! - **Deterministic search**: distance ties break by id, so results are
//!   reproducible for a fixed dataset
//! - **Live backups**: per-class quiescence with an at-most-one-active slot
//!
//! ## Quick Start
//!
//! ```ignore
//! use gossamer::{HnswIndex, IndexParams, InMemoryVectors};
//! use std::sync::Arc;
//!
//! let vectors = Arc::new(InMemoryVectors::new());
//! vectors.put(0, vec![1.0, 0.0, 0.0]);
//!
//! let index = HnswIndex::open(root, "main", IndexParams::default(), vectors)?;
//! index.insert(0)?;
//! let neighbors = index.knn(0, 10, None)?;
//! ```

pub mod backup;
pub mod candidates;
pub mod commitlog;
pub mod config;
pub mod defaults;
pub mod distance;
pub mod error;
pub mod hnsw;
pub mod shard;
pub mod vectors;

pub use backup::{BackupShard, BackupState, Catalog, ClassDescriptor, IndexBackup, ShardDescriptor};
pub use commitlog::CommitLog;
pub use config::{Config, IndexParams};
pub use error::{GossamerError, Result};
pub use hnsw::HnswIndex;
pub use shard::Shard;
pub use vectors::{InMemoryVectors, VectorSource};
