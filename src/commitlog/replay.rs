//! Commit log replay
//!
//! Reads segments in ordinal order and feeds every record to a sink, which
//! rebuilds graph state. Replay is idempotent: applying the same log twice
//! to an empty graph yields the same graph, because the sink deduplicates
//! links and treats node creation and entry updates as upserts.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::{GossamerError, Result};

use super::record::CommitRecord;
use super::segment_paths;

/// Receiver for replayed records, in log order
pub trait ReplaySink {
    fn add_node(&mut self, id: u32, level: u16);
    fn add_link(&mut self, node: u32, level: u16, neighbor: u32);
    fn replace_links(&mut self, node: u32, level: u16, neighbors: Vec<u32>);
    fn set_entry(&mut self, id: u32, max_layer: u16);
}

/// Replay every record under `dir` into `sink`
///
/// A partial record at the tail of the last segment is tolerated (crash
/// mid-append). Anything undecodable earlier is corruption and fails the
/// replay.
pub fn replay(dir: &Path, sink: &mut dyn ReplaySink) -> Result<()> {
    let segments = segment_paths(dir)?;
    let last = segments.len().saturating_sub(1);

    for (i, (_, path)) in segments.iter().enumerate() {
        let data = fs::read(path)?;
        let mut offset = 0usize;

        loop {
            match CommitRecord::decode(&data[offset..]) {
                Ok(Some((record, consumed))) => {
                    apply(sink, record);
                    offset += consumed;
                }
                Ok(None) => {
                    if offset < data.len() {
                        if i == last {
                            warn!(
                                segment = %path.display(),
                                offset,
                                "partial record at log tail, stopping replay"
                            );
                            break;
                        }
                        return Err(GossamerError::Corrupt {
                            segment: path.clone(),
                            offset: offset as u64,
                            reason: "partial record in a non-final segment".into(),
                        });
                    }
                    break;
                }
                Err(err) => {
                    return Err(GossamerError::Corrupt {
                        segment: path.clone(),
                        offset: offset as u64,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}

fn apply(sink: &mut dyn ReplaySink, record: CommitRecord) {
    match record {
        CommitRecord::AddNode { id, level } => sink.add_node(id, level),
        CommitRecord::AddLink {
            node,
            level,
            neighbor,
        } => sink.add_link(node, level, neighbor),
        CommitRecord::ReplaceLinks {
            node,
            level,
            neighbors,
        } => sink.replace_links(node, level, neighbors),
        CommitRecord::SetEntry { id, max_layer } => sink.set_entry(id, max_layer),
    }
}

/// Collect every record under `dir` in log order
pub fn read_records(dir: &Path) -> Result<Vec<CommitRecord>> {
    struct Collector(Vec<CommitRecord>);

    impl ReplaySink for Collector {
        fn add_node(&mut self, id: u32, level: u16) {
            self.0.push(CommitRecord::AddNode { id, level });
        }
        fn add_link(&mut self, node: u32, level: u16, neighbor: u32) {
            self.0.push(CommitRecord::AddLink {
                node,
                level,
                neighbor,
            });
        }
        fn replace_links(&mut self, node: u32, level: u16, neighbors: Vec<u32>) {
            self.0.push(CommitRecord::ReplaceLinks {
                node,
                level,
                neighbors,
            });
        }
        fn set_entry(&mut self, id: u32, max_layer: u16) {
            self.0.push(CommitRecord::SetEntry { id, max_layer });
        }
    }

    let mut collector = Collector(Vec::new());
    replay(dir, &mut collector)?;
    Ok(collector.0)
}
