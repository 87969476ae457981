//! WAL Recovery
//!
//! Replays the valid prefix of the log after a crash. Anything after the
//! first torn or corrupt record is a partial write from the crash and is
//! truncated away; with `paranoid_checks` the corruption is an error
//! instead.

use std::path::Path;

use tracing::warn;

use crate::error::{MeridianError, Result};
use crate::types::SequenceNumber;

use super::{WalReader, WalRecord};

/// Handles WAL recovery after a crash.
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug)]
pub struct RecoveryResult {
    /// Number of records (batches) successfully recovered
    pub records_recovered: u64,

    /// Number of individual operations recovered
    pub ops_recovered: u64,

    /// Highest sequence number seen in the recovered prefix
    pub last_sequence: SequenceNumber,

    /// Whether a corrupt tail was truncated away
    pub truncated: bool,
}

impl WalRecovery {
    /// Recover all valid records from `path`, in commit order.
    ///
    /// The file is truncated to the valid prefix when a corrupt tail is
    /// found, unless `paranoid` is set, in which case the corruption is
    /// returned as an error and the file is left untouched.
    pub fn recover(path: &Path, paranoid: bool) -> Result<(Vec<WalRecord>, RecoveryResult)> {
        let mut reader = WalReader::open(path)?;
        let mut records = Vec::new();
        let mut result = RecoveryResult {
            records_recovered: 0,
            ops_recovered: 0,
            last_sequence: 0,
            truncated: false,
        };

        loop {
            match reader.next_record() {
                Ok(Some(record)) => {
                    result.records_recovered += 1;
                    result.ops_recovered += record.ops.len() as u64;
                    result.last_sequence = result.last_sequence.max(record.last_seq());
                    records.push(record);
                }
                Ok(None) => break,
                Err(MeridianError::Corruption(msg)) => {
                    if paranoid {
                        return Err(MeridianError::Corruption(msg));
                    }
                    let keep = reader.valid_offset();
                    warn!(
                        offset = keep,
                        "truncating corrupt WAL tail: {msg}"
                    );
                    let file = std::fs::OpenOptions::new().write(true).open(path)?;
                    file.set_len(keep)?;
                    file.sync_all()?;
                    result.truncated = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok((records, result))
    }
}
