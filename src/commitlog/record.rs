//! Commit record wire format
//!
//! Binary format (all little-endian):
//!
//! ```text
//! record := u8 tag | u32 length | payload
//!   tag=1 AddNode:      u32 id, u16 level
//!   tag=2 AddLink:      u32 node, u16 level, u32 neighbor
//!   tag=3 ReplaceLinks: u32 node, u16 level, u32 count, count x u32 neighbor
//!   tag=4 SetEntry:     u32 id, u16 max_layer
//! ```
//!
//! `length` counts payload bytes only. A segment ends at a record boundary;
//! a trailing partial record is interpreted as a crash and truncated when
//! the log is reopened.

pub const TAG_ADD_NODE: u8 = 1;
pub const TAG_ADD_LINK: u8 = 2;
pub const TAG_REPLACE_LINKS: u8 = 3;
pub const TAG_SET_ENTRY: u8 = 4;

/// Frame header: tag byte plus payload length
pub const RECORD_HEADER_SIZE: usize = 5;

/// A single structural mutation of the graph
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitRecord {
    AddNode { id: u32, level: u16 },
    AddLink { node: u32, level: u16, neighbor: u32 },
    ReplaceLinks { node: u32, level: u16, neighbors: Vec<u32> },
    SetEntry { id: u32, max_layer: u16 },
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown record tag {0}")]
    UnknownTag(u8),

    #[error("payload length {got} invalid for tag {tag}")]
    BadPayload { tag: u8, got: usize },

    #[error("record payload truncated")]
    Truncated,
}

impl CommitRecord {
    /// Serialize the record to its framed wire form
    pub fn encode(&self) -> Vec<u8> {
        let (tag, payload) = match self {
            CommitRecord::AddNode { id, level } => {
                let mut p = Vec::with_capacity(6);
                p.extend_from_slice(&id.to_le_bytes());
                p.extend_from_slice(&level.to_le_bytes());
                (TAG_ADD_NODE, p)
            }
            CommitRecord::AddLink {
                node,
                level,
                neighbor,
            } => {
                let mut p = Vec::with_capacity(10);
                p.extend_from_slice(&node.to_le_bytes());
                p.extend_from_slice(&level.to_le_bytes());
                p.extend_from_slice(&neighbor.to_le_bytes());
                (TAG_ADD_LINK, p)
            }
            CommitRecord::ReplaceLinks {
                node,
                level,
                neighbors,
            } => {
                let mut p = Vec::with_capacity(10 + neighbors.len() * 4);
                p.extend_from_slice(&node.to_le_bytes());
                p.extend_from_slice(&level.to_le_bytes());
                p.extend_from_slice(&(neighbors.len() as u32).to_le_bytes());
                for n in neighbors {
                    p.extend_from_slice(&n.to_le_bytes());
                }
                (TAG_REPLACE_LINKS, p)
            }
            CommitRecord::SetEntry { id, max_layer } => {
                let mut p = Vec::with_capacity(6);
                p.extend_from_slice(&id.to_le_bytes());
                p.extend_from_slice(&max_layer.to_le_bytes());
                (TAG_SET_ENTRY, p)
            }
        };

        let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE + payload.len());
        buf.push(tag);
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&payload);
        buf
    }

    /// Decode one record from the front of `buf`
    ///
    /// Returns `Ok(Some((record, consumed)))` on success and `Ok(None)` when
    /// the buffer holds only a partial record (or nothing), which on the last
    /// segment means a crash mid-append.
    pub fn decode(buf: &[u8]) -> Result<Option<(CommitRecord, usize)>, DecodeError> {
        if buf.len() < RECORD_HEADER_SIZE {
            return Ok(None);
        }

        let tag = buf[0];
        let len = read_u32(buf, 1)? as usize;
        if buf.len() < RECORD_HEADER_SIZE + len {
            return Ok(None);
        }

        let payload = &buf[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + len];
        let record = match tag {
            TAG_ADD_NODE => {
                if len != 6 {
                    return Err(DecodeError::BadPayload { tag, got: len });
                }
                CommitRecord::AddNode {
                    id: read_u32(payload, 0)?,
                    level: read_u16(payload, 4)?,
                }
            }
            TAG_ADD_LINK => {
                if len != 10 {
                    return Err(DecodeError::BadPayload { tag, got: len });
                }
                CommitRecord::AddLink {
                    node: read_u32(payload, 0)?,
                    level: read_u16(payload, 4)?,
                    neighbor: read_u32(payload, 6)?,
                }
            }
            TAG_REPLACE_LINKS => {
                if len < 10 {
                    return Err(DecodeError::BadPayload { tag, got: len });
                }
                let count = read_u32(payload, 6)? as usize;
                if len != 10 + count * 4 {
                    return Err(DecodeError::BadPayload { tag, got: len });
                }
                let neighbors = (0..count)
                    .map(|i| read_u32(payload, 10 + i * 4))
                    .collect::<Result<Vec<u32>, DecodeError>>()?;
                CommitRecord::ReplaceLinks {
                    node: read_u32(payload, 0)?,
                    level: read_u16(payload, 4)?,
                    neighbors,
                }
            }
            TAG_SET_ENTRY => {
                if len != 6 {
                    return Err(DecodeError::BadPayload { tag, got: len });
                }
                CommitRecord::SetEntry {
                    id: read_u32(payload, 0)?,
                    max_layer: read_u16(payload, 4)?,
                }
            }
            other => return Err(DecodeError::UnknownTag(other)),
        };

        Ok(Some((record, RECORD_HEADER_SIZE + len)))
    }
}

#[inline]
fn read_u32(buf: &[u8], at: usize) -> Result<u32, DecodeError> {
    buf.get(at..at + 4)
        .ok_or(DecodeError::Truncated)?
        .try_into()
        .map(u32::from_le_bytes)
        .map_err(|_| DecodeError::Truncated)
}

#[inline]
fn read_u16(buf: &[u8], at: usize) -> Result<u16, DecodeError> {
    buf.get(at..at + 2)
        .ok_or(DecodeError::Truncated)?
        .try_into()
        .map(u16::from_le_bytes)
        .map_err(|_| DecodeError::Truncated)
}
