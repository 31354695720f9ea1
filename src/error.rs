//! Unified error types for Gossamer
//!
//! One error hierarchy shared by the graph, the commit log, and the backup
//! coordinator, so callers can match on concrete failure conditions instead
//! of strings.

use std::path::PathBuf;

/// Main error type for Gossamer operations
#[derive(Debug, thiserror::Error)]
pub enum GossamerError {
    /// Node or vector absent
    #[error("not found: id {id}")]
    NotFound { id: u32 },

    /// Reinsertion of an id that is already populated
    #[error("duplicate node: id {id}")]
    DuplicateNode { id: u32 },

    /// Nil, zero-length, or NaN-producing vector
    #[error("bad vector for id {id}: {reason}")]
    BadVector { id: u32, reason: String },

    /// A backup is already being held for this index
    #[error(
        "cannot create new backup, backup '{id}' is not yet released, \
         try again later"
    )]
    BackupInProgress { id: String },

    /// Release or query of a backup id that is not currently held
    #[error("unknown backup '{id}'")]
    BackupUnknown { id: String },

    /// Named class has no live index
    #[error("class '{class}' doesn't exist")]
    ClassNotFound { class: String },

    /// Commit log append failed; the enclosing mutation was not applied
    #[error("commit log append failed: {source}")]
    LogAppend {
        #[source]
        source: std::io::Error,
    },

    /// Unreadable record in the middle of a commit log segment
    #[error("corrupt commit log segment {segment:?} at offset {offset}: {reason}")]
    Corrupt {
        segment: PathBuf,
        offset: u64,
        reason: String,
    },

    /// Cooperative cancellation observed between loop iterations
    #[error("operation cancelled")]
    Cancelled,

    /// A distance computation failed while searching a layer
    #[error("search failed: {source}")]
    Search {
        #[source]
        source: Box<GossamerError>,
    },

    /// I/O errors outside the commit log append path
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Gossamer operations
pub type Result<T> = std::result::Result<T, GossamerError>;

impl GossamerError {
    /// Create a bad-vector error
    pub fn bad_vector(id: u32, reason: impl Into<String>) -> Self {
        Self::BadVector {
            id,
            reason: reason.into(),
        }
    }

    /// Wrap a distance failure observed during a layer search
    pub fn search(cause: GossamerError) -> Self {
        Self::Search {
            source: Box::new(cause),
        }
    }
}
