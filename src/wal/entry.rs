//! WAL record definitions
//!
//! One record per committed batch; operations replay in list order.

use serde::{Deserialize, Serialize};

use crate::batch::{BatchOp, WriteBatch};
use crate::error::{MeridianError, Result};
use crate::types::SequenceNumber;

/// Record header: CRC32 (4) + payload length (4).
pub const HEADER_SIZE: u64 = 8;

/// Operations that can be logged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

/// A single record in the WAL: one committed batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalRecord {
    /// Sequence number of the first operation; operation i commits at
    /// `first_seq + i`.
    pub first_seq: SequenceNumber,

    /// The batch's operations in commit order.
    pub ops: Vec<Operation>,
}

impl WalRecord {
    /// Capture a write batch about to commit at `first_seq`.
    pub fn from_batch(first_seq: SequenceNumber, batch: &WriteBatch) -> Self {
        let ops = batch
            .iter()
            .map(|op| match op {
                BatchOp::Put { key, value } => Operation::Put {
                    key: key.to_vec(),
                    value: value.to_vec(),
                },
                BatchOp::Delete { key } => Operation::Delete { key: key.to_vec() },
            })
            .collect();
        Self { first_seq, ops }
    }

    /// Sequence number of the last operation in this record.
    pub fn last_seq(&self) -> SequenceNumber {
        self.first_seq + self.ops.len().saturating_sub(1) as u64
    }

    /// Encode the payload bytes (without the frame header).
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| MeridianError::Corruption(format!("WAL record encode failed: {e}")))
    }

    /// Decode a payload produced by [`encode`](Self::encode).
    pub fn decode(payload: &[u8]) -> Result<Self> {
        bincode::deserialize(payload)
            .map_err(|e| MeridianError::Corruption(format!("WAL record decode failed: {e}")))
    }
}
