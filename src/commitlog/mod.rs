//! Append-only commit log
//!
//! Every structural mutation of the graph is recorded here in the order it
//! became visible, so the graph can be reconstructed deterministically after
//! a restart. The log is not a state dump: it is the serialized history of
//! mutations.
//!
//! Durability contract:
//! - `append` writes the framed record immediately; a failed append restores
//!   the segment to the previous record boundary so the caller can abort its
//!   mutation without poisoning the log.
//! - `flush` is the group-commit point: it fsyncs the current segment and is
//!   the only place rotation happens, so a segment always ends at a record
//!   boundary.
//! - On open, a trailing partial record on the last segment is truncated
//!   (treated as a crash mid-append).

pub mod record;
pub mod replay;

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::defaults::{DEFAULT_SEGMENT_MAX_BYTES, SEGMENT_EXTENSION, SEGMENT_ORDINAL_WIDTH};
use crate::error::Result;
use record::CommitRecord;

pub use record::DecodeError;
pub use replay::{read_records, replay, ReplaySink};

/// File name for a segment ordinal, `0000000000.wal` style
pub fn segment_file_name(ordinal: u64) -> String {
    format!("{ordinal:0width$}.{SEGMENT_EXTENSION}", width = SEGMENT_ORDINAL_WIDTH)
}

/// Parse a segment ordinal back out of a file name
fn parse_ordinal(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(&format!(".{SEGMENT_EXTENSION}"))?;
    if stem.len() != SEGMENT_ORDINAL_WIDTH || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Segment paths in a log directory, ordered by ordinal
pub(crate) fn segment_paths(dir: &Path) -> std::io::Result<Vec<(u64, PathBuf)>> {
    let mut segments = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(ordinal) = entry.file_name().to_str().and_then(parse_ordinal) {
            segments.push((ordinal, entry.path()));
        }
    }
    segments.sort_by_key(|(ordinal, _)| *ordinal);
    Ok(segments)
}

/// Append-only, segmented commit log writer
pub struct CommitLog {
    inner: Mutex<LogInner>,
}

struct LogInner {
    dir: PathBuf,
    ordinal: u64,
    file: File,
    /// Bytes of complete records in the current segment
    committed: u64,
    max_segment_bytes: u64,
    rotation_held: bool,
}

impl CommitLog {
    /// Open or create a log in `dir` with the default rotation threshold
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_threshold(dir, DEFAULT_SEGMENT_MAX_BYTES)
    }

    /// Open or create a log in `dir`, rotating segments past `max_segment_bytes`
    pub fn open_with_threshold(dir: impl Into<PathBuf>, max_segment_bytes: u64) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let segments = segment_paths(&dir)?;
        let (ordinal, path) = match segments.last() {
            Some((ordinal, path)) => (*ordinal, path.clone()),
            None => (0, dir.join(segment_file_name(0))),
        };

        // Scan the last segment and cut off anything past the final complete
        // record. Undecodable bytes are a crash artifact.
        let committed = if path.exists() {
            let data = fs::read(&path)?;
            let valid = valid_prefix_len(&data);
            if valid < data.len() as u64 {
                warn!(
                    segment = %path.display(),
                    valid,
                    total = data.len(),
                    "truncating partial record at commit log tail"
                );
                let file = OpenOptions::new().write(true).open(&path)?;
                file.set_len(valid)?;
                file.sync_data()?;
            }
            valid
        } else {
            0
        };

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            inner: Mutex::new(LogInner {
                dir,
                ordinal,
                file,
                committed,
                max_segment_bytes,
                rotation_held: false,
            }),
        })
    }

    /// Append one record
    ///
    /// Callers invoke this while holding the lock that makes the mutation
    /// visible; on failure they must not apply the in-memory mutation.
    pub fn append(&self, record: &CommitRecord) -> std::io::Result<()> {
        let mut inner = self.inner.lock();
        let buf = record.encode();

        if let Err(err) = inner.file.write_all(&buf) {
            // Restore the previous record boundary so later appends stay
            // readable; the enclosing operation aborts either way.
            let committed = inner.committed;
            let _ = inner.file.set_len(committed);
            let _ = inner.file.seek(SeekFrom::End(0));
            return Err(err);
        }

        inner.committed += buf.len() as u64;
        Ok(())
    }

    /// Flush buffered records to durable storage and rotate if due
    ///
    /// Called after the critical section that emitted the records, so the
    /// records of one critical section reach disk together.
    pub fn flush(&self) -> std::io::Result<()> {
        let mut inner = self.inner.lock();
        inner.file.sync_data()?;

        if inner.committed >= inner.max_segment_bytes && !inner.rotation_held {
            inner.rotate()?;
        }
        Ok(())
    }

    /// Hold segment rotation so the file list stays stable during a backup
    pub fn pause_rotation(&self) {
        self.inner.lock().rotation_held = true;
    }

    /// Release a rotation hold
    pub fn resume_rotation(&self) {
        self.inner.lock().rotation_held = false;
    }

    /// Relative file names of all segments, ordered by ordinal
    pub fn segment_files(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock();
        Ok(segment_paths(&inner.dir)?
            .into_iter()
            .map(|(ordinal, _)| segment_file_name(ordinal))
            .collect())
    }

    /// Directory holding the segments
    pub fn dir(&self) -> PathBuf {
        self.inner.lock().dir.clone()
    }
}

impl LogInner {
    fn rotate(&mut self) -> std::io::Result<()> {
        let next = self.ordinal + 1;
        let path = self.dir.join(segment_file_name(next));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        debug!(segment = %path.display(), "rotating commit log segment");
        self.file = file;
        self.ordinal = next;
        self.committed = 0;
        Ok(())
    }
}

/// Length of the prefix of `data` made of complete, decodable records
fn valid_prefix_len(data: &[u8]) -> u64 {
    let mut offset = 0usize;
    loop {
        match CommitRecord::decode(&data[offset..]) {
            Ok(Some((_, consumed))) => offset += consumed,
            // Partial tail or garbage: everything past the last good record
            // is dropped.
            Ok(None) | Err(_) => return offset as u64,
        }
    }
}
