//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted storage of versioned
//! entries.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (6 bytes)                                             │
//! │   Magic: "MRKV" (4) | Version: u16 (2)                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Data Blocks (variable, ~block_size each)                     │
//! │   Entry: [KeyLen u32][ValLen u32][Seq u64][Kind u8][Key][Val]│
//! │   Block trailer: [Compression u8][CRC32 u32]                 │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Meta Block (bincode TableMeta + trailer)                     │
//! │   entry count, max sequence, key range, filter               │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Index Block (bincode Vec<IndexEntry> + trailer)              │
//! │   last (key, seq) of each data block → (offset, len)         │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Footer (32 bytes)                                            │
//! │   MetaOff u64 | MetaLen u32 | IndexOff u64 | IndexLen u32    │
//! │   | FooterMagic u64                                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries appear in internal order (key ascending per the comparator,
//! sequence descending). Blocks are independently checksummed and optionally
//! Snappy-compressed; the index and meta blocks are never compressed.

mod builder;
mod iterator;
mod reader;

use serde::{Deserialize, Serialize};

pub use builder::TableBuilder;
pub use iterator::TableIterator;
pub use reader::Table;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying a MeridianKV table file
pub(crate) const MAGIC: &[u8; 4] = b"MRKV";

/// Current table format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) = 6 bytes
pub(crate) const HEADER_SIZE: u64 = 6;

/// Footer size: MetaOff (8) + MetaLen (4) + IndexOff (8) + IndexLen (4)
/// + FooterMagic (8) = 32 bytes
pub(crate) const FOOTER_SIZE: u64 = 32;

/// Trailing magic, a second anchor for repair to find the footer
pub(crate) const FOOTER_MAGIC: u64 = 0x4d52_4b56_5441_424c; // "MRKVTABL"

/// Block trailer: compression tag (1) + CRC32 (4)
pub(crate) const BLOCK_TRAILER_SIZE: u64 = 5;

/// Per-entry fixed framing: key len (4) + value len (4) + seq (8) + kind (1)
pub(crate) const ENTRY_HEADER_SIZE: usize = 17;

/// Block compression tags
pub(crate) const COMPRESSION_NONE: u8 = 0;
pub(crate) const COMPRESSION_SNAPPY: u8 = 1;

// =============================================================================
// Table Metadata
// =============================================================================

/// Index entry: the last (key, seq) of one data block and where it lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IndexEntry {
    pub last_key: Vec<u8>,
    pub last_seq: u64,
    /// File offset of the block's stored payload.
    pub offset: u64,
    /// Stored payload length, excluding the trailer.
    pub len: u32,
}

/// Table metadata, persisted in the meta block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeta {
    /// Number of entries (versions, not distinct keys)
    pub entry_count: u64,
    /// Highest sequence number in the table
    pub max_seq: u64,
    /// Smallest user key (for range pruning)
    pub min_key: Vec<u8>,
    /// Largest user key (for range pruning)
    pub max_key: Vec<u8>,
    /// Name of the policy that built `filter`; consulted only when it
    /// matches the policy configured at open
    pub filter_name: String,
    /// Filter block built over every distinct user key; empty if none
    pub filter: Vec<u8>,
}
