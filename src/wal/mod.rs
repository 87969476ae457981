//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Append one record per committed batch, before the memtable is touched
//! - CRC32 checksums for corruption detection
//! - Sequence numbers for ordering and replay
//! - Crash recovery with partial-write truncation
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬────────────────┐  │
//! │ │ CRC (4) │ Len (4) │ Payload        │  │
//! │ └─────────┴─────────┴────────────────┘  │
//! ├─────────────────────────────────────────┤
//! │ Record 2                                │
//! │ ┌─────────┬─────────┬────────────────┐  │
//! │ │ CRC (4) │ Len (4) │ Payload        │  │
//! │ └─────────┴─────────┴────────────────┘  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The payload is a bincode-encoded [`WalRecord`]: the batch's first sequence
//! number plus its operations in commit order.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Operation, WalRecord, HEADER_SIZE};
pub use reader::WalReader;
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;
