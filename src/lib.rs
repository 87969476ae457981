//! # MeridianKV
//!
//! A persistent, ordered, embedded key-value storage engine with:
//! - Atomic batched writes (`WriteBatch` + `DB::write`)
//! - Point-in-time consistent reads via snapshots
//! - Forward and reverse iteration over a mutable key space
//! - Write-ahead logging with crash recovery
//! - Background compaction, bloom filters, and an LRU block cache
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        DB (engine)                          │
//! │        put / delete / write     get / iter / snapshot       │
//! └──────────┬──────────────────────────────┬───────────────────┘
//!            │  single writer               │  many readers
//!            ▼                              ▼
//!     ┌─────────────┐              ┌──────────────────┐
//!     │     WAL     │              │   Pinned State   │
//!     │  (append)   │              │ MemTable + Tables│
//!     └─────────────┘              └────────┬─────────┘
//!                                           │ flush / compact
//!                                           ▼
//!                                  ┌──────────────────┐
//!                                  │  SSTables (disk) │
//!                                  │ bloom + blk cache│
//!                                  └──────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use meridiankv::{Options, ReadOptions, WriteOptions, DB};
//!
//! # fn main() -> meridiankv::Result<()> {
//! let options = Options::builder().create_if_missing(true).build();
//! let db = DB::open("/tmp/meridian-example", options)?;
//!
//! db.put(&WriteOptions::default(), b"key", b"value")?;
//! let value = db.get(&ReadOptions::default(), b"key")?;
//! assert_eq!(&value[..], b"value");
//!
//! db.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod batch;
pub mod cache;
pub mod comparator;
pub mod filter;
pub mod snapshot;

pub mod iterator;
pub mod memtable;
pub mod storage;
pub mod wal;

pub mod engine;
pub mod types;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use batch::{BatchOp, WriteBatch};
pub use cache::Cache;
pub use comparator::{BytewiseComparator, Comparator, ComparatorRef};
pub use config::{Compression, Options, OptionsBuilder, ReadOptions, WriteOptions};
pub use engine::{destroy_database, repair_database, Range, Stats, DB};
pub use error::{MeridianError, Result};
pub use filter::{BloomFilterPolicy, FilterPolicy, FilterPolicyRef};
pub use iterator::DbIterator;
pub use snapshot::Snapshot;
pub use types::SequenceNumber;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of MeridianKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
