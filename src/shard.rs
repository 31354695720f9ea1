//! Concrete shard wrapping an HNSW index
//!
//! A shard is the unit a backup quiesces: pausing maintenance flushes the
//! commit log and holds segment rotation, so the set of files enumerated for
//! the backup does not change until the shard is resumed. Appends continue
//! while paused; they only grow files the backup already knows about.

use std::sync::Arc;

use async_trait::async_trait;

use crate::backup::BackupShard;
use crate::error::Result;
use crate::hnsw::HnswIndex;

pub struct Shard {
    name: String,
    index: Arc<HnswIndex>,
}

impl Shard {
    pub fn new(name: impl Into<String>, index: Arc<HnswIndex>) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    pub fn index(&self) -> &Arc<HnswIndex> {
        &self.index
    }
}

#[async_trait]
impl BackupShard for Shard {
    fn name(&self) -> &str {
        &self.name
    }

    async fn pause_maintenance(&self) -> Result<()> {
        self.index.pause_maintenance()
    }

    async fn resume_maintenance(&self) -> Result<()> {
        self.index.resume_maintenance()
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        self.index.commit_files()
    }
}
