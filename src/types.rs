//! Core types shared across the engine.

use std::cmp::Ordering;

use bytes::Bytes;

use crate::comparator::Comparator;

/// Monotonically increasing counter assigned to each committed write.
/// Provides the total ordering of all writes and the basis for snapshots.
pub type SequenceNumber = u64;

/// Sequence bound meaning "see everything".
pub const MAX_SEQUENCE: SequenceNumber = u64::MAX;

/// Distinguishes puts from deletes inside the engine.
/// A delete writes a tombstone — the key is marked dead, not removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// A delete (tombstone marker).
    Delete = 0x00,
    /// A normal put operation.
    Put = 0x01,
}

impl ValueKind {
    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x00 => Some(ValueKind::Delete),
            0x01 => Some(ValueKind::Put),
            _ => None,
        }
    }
}

/// One versioned entry: user key + sequence number + kind + value.
///
/// Internal ordering is (user_key ASC per the comparator, sequence DESC), so
/// the newest version of a key always comes first when scanning forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalEntry {
    pub key: Bytes,
    pub seq: SequenceNumber,
    pub kind: ValueKind,
    /// Empty for tombstones.
    pub value: Bytes,
}

impl InternalEntry {
    pub fn put(key: Bytes, seq: SequenceNumber, value: Bytes) -> Self {
        Self {
            key,
            seq,
            kind: ValueKind::Put,
            value,
        }
    }

    pub fn tombstone(key: Bytes, seq: SequenceNumber) -> Self {
        Self {
            key,
            seq,
            kind: ValueKind::Delete,
            value: Bytes::new(),
        }
    }
}

/// Three-way comparison of two internal positions (user key + sequence).
///
/// Primary: user key ascending per `cmp`. Secondary: sequence descending,
/// so for one key the newest version sorts first.
pub fn compare_internal(
    cmp: &dyn Comparator,
    a_key: &[u8],
    a_seq: SequenceNumber,
    b_key: &[u8],
    b_seq: SequenceNumber,
) -> Ordering {
    match cmp.compare(a_key, b_key) {
        Ordering::Equal => b_seq.cmp(&a_seq),
        ord => ord,
    }
}
