//! Backup coordination
//!
//! A backup of a class must see a stable set of files while the index stays
//! live. The protocol is: claim the per-class backup slot, pause maintenance
//! on every shard concurrently, enumerate each shard's files, hand the
//! descriptor to the caller, and resume everything on release. At most one
//! backup is active per class at any time.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::{GossamerError, Result};

/// Per-index backup slot
#[derive(Clone, Debug, Default)]
pub struct BackupState {
    pub backup_id: String,
    pub in_progress: bool,
}

/// Files that constitute one shard's durable state at pause time
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShardDescriptor {
    pub name: String,
    pub files: Vec<String>,
}

/// Everything needed to restore a class
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassDescriptor {
    pub name: String,
    pub shards: Vec<ShardDescriptor>,
    /// Marshaled class schema, opaque to the index layer
    pub schema: Vec<u8>,
    /// Marshaled sharding state, opaque to the index layer
    pub sharding_state: Vec<u8>,
}

/// A shard that can quiesce its maintenance work for a backup
#[async_trait]
pub trait BackupShard: Send + Sync {
    fn name(&self) -> &str;

    /// Stop compactions and background writers, flush pending state
    async fn pause_maintenance(&self) -> Result<()>;

    /// Restart maintenance after the backup released the shard
    async fn resume_maintenance(&self) -> Result<()>;

    /// Stable enumeration of the shard's files as of the completed pause
    async fn list_files(&self) -> Result<Vec<String>>;
}

/// Per-class backup coordinator
pub struct IndexBackup {
    class: String,
    state: Mutex<BackupState>,
    shards: Vec<Arc<dyn BackupShard>>,
    schema: Vec<u8>,
    sharding_state: Vec<u8>,
}

impl IndexBackup {
    pub fn new(
        class: impl Into<String>,
        shards: Vec<Arc<dyn BackupShard>>,
        schema: Vec<u8>,
        sharding_state: Vec<u8>,
    ) -> Self {
        Self {
            class: class.into(),
            state: Mutex::new(BackupState::default()),
            shards,
            schema,
            sharding_state,
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Current backup slot state
    pub fn state(&self) -> BackupState {
        self.state.lock().clone()
    }

    /// Begin a backup: claim the slot, quiesce all shards, collect the
    /// class descriptor
    ///
    /// If any shard fails to pause (or a file listing fails), already-paused
    /// shards are resumed and the slot is released before the error returns.
    pub async fn begin_backup(&self, id: &str) -> Result<ClassDescriptor> {
        self.init_backup(id)?;
        info!(class = %self.class, backup = id, "backup started, pausing maintenance");

        if let Err(err) = self.pause_all().await {
            self.release_inner().await;
            return Err(err);
        }

        match self.collect_descriptor().await {
            Ok(descriptor) => Ok(descriptor),
            Err(err) => {
                self.release_inner().await;
                Err(err)
            }
        }
    }

    /// Release a backup: resume maintenance everywhere, free the slot
    ///
    /// Safe to call even if some shards never paused; resume is best-effort
    /// and the slot is freed regardless.
    pub async fn release_backup(&self, id: &str) -> Result<()> {
        {
            let state = self.state.lock();
            if !state.in_progress || state.backup_id != id {
                return Err(GossamerError::BackupUnknown { id: id.to_string() });
            }
        }

        info!(class = %self.class, backup = id, "releasing backup, resuming maintenance");
        self.release_inner().await;
        Ok(())
    }

    fn init_backup(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.in_progress {
            return Err(GossamerError::BackupInProgress {
                id: state.backup_id.clone(),
            });
        }
        *state = BackupState {
            backup_id: id.to_string(),
            in_progress: true,
        };
        Ok(())
    }

    /// Pause every shard concurrently and wait for all of them
    async fn pause_all(&self) -> Result<()> {
        let mut tasks = JoinSet::new();
        for shard in &self.shards {
            let shard = shard.clone();
            tasks.spawn(async move {
                let result = shard.pause_maintenance().await;
                (shard.name().to_string(), result)
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let (name, result) = joined.map_err(|e| {
                GossamerError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
            })?;
            if let Err(err) = result {
                warn!(class = %self.class, shard = %name, %err, "shard failed to pause");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    async fn collect_descriptor(&self) -> Result<ClassDescriptor> {
        let mut shards = Vec::with_capacity(self.shards.len());
        for shard in &self.shards {
            shards.push(ShardDescriptor {
                name: shard.name().to_string(),
                files: shard.list_files().await?,
            });
        }

        Ok(ClassDescriptor {
            name: self.class.clone(),
            shards,
            schema: self.schema.clone(),
            sharding_state: self.sharding_state.clone(),
        })
    }

    /// Resume everything in parallel and reset the slot, ignoring resume
    /// failures beyond a warning
    async fn release_inner(&self) {
        let mut tasks = JoinSet::new();
        for shard in &self.shards {
            let shard = shard.clone();
            tasks.spawn(async move {
                let result = shard.resume_maintenance().await;
                (shard.name().to_string(), result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Ok((name, Err(err))) = joined {
                warn!(class = %self.class, shard = %name, %err, "shard failed to resume");
            }
        }

        *self.state.lock() = BackupState::default();
    }
}

/// Registry of live class indexes, the unit `backupable` checks against
#[derive(Default)]
pub struct Catalog {
    indices: RwLock<HashMap<String, Arc<IndexBackup>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, index: Arc<IndexBackup>) {
        self.indices
            .write()
            .insert(index.class().to_string(), index);
    }

    pub fn get(&self, class: &str) -> Option<Arc<IndexBackup>> {
        self.indices.read().get(class).cloned()
    }

    /// Pure check that every named class has a live index
    pub fn backupable(&self, classes: &[impl AsRef<str>]) -> Result<()> {
        let indices = self.indices.read();
        for class in classes {
            let class = class.as_ref();
            if !indices.contains_key(class) {
                return Err(GossamerError::ClassNotFound {
                    class: class.to_string(),
                });
            }
        }
        Ok(())
    }

    /// All classes that can currently be backed up
    pub fn backupable_classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self.indices.read().keys().cloned().collect();
        classes.sort();
        classes
    }
}
