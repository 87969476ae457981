//! Iterators
//!
//! Two layers of iteration:
//!
//! - [`InternalIterator`]: cursor over versioned entries in internal order
//!   (user key ascending, sequence descending). Implemented by the memtable,
//!   by table files, and by [`MergeIterator`] which fuses several sources.
//! - [`DbIterator`]: the user-facing cursor. It collapses versions to the
//!   newest one visible at its sequence bound, hides tombstones, and
//!   supports bidirectional movement.

mod db_iter;
mod merge;

pub use db_iter::DbIterator;
pub use merge::MergeIterator;

use crate::error::Result;
use crate::types::{InternalEntry, SequenceNumber};

/// Cursor over versioned entries in internal order.
///
/// Positioning methods return `Err` only on I/O or corruption while loading
/// backing data; the cursor is unpositioned afterward. `entry()` must only
/// be called while `valid()`.
pub trait InternalIterator {
    /// True iff the cursor is positioned on an entry.
    fn valid(&self) -> bool;

    /// Position at the first entry, if any.
    fn seek_to_first(&mut self) -> Result<()>;

    /// Position at the last entry, if any.
    fn seek_to_last(&mut self) -> Result<()>;

    /// Position at the first entry >= (key, seq) in internal order.
    /// With `seq = MAX_SEQUENCE` this is the newest version of `key`.
    fn seek(&mut self, key: &[u8], seq: SequenceNumber) -> Result<()>;

    /// Advance one entry. Must be positioned.
    fn next(&mut self) -> Result<()>;

    /// Retreat one entry; unpositioned after walking off the front.
    /// Must be positioned.
    fn prev(&mut self) -> Result<()>;

    /// The current entry. Must be positioned.
    fn entry(&self) -> &InternalEntry;
}
