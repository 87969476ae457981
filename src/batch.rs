//! Write Batch
//!
//! An ordered collection of updates applied atomically by `DB::write`.
//!
//! Updates are applied in the order they were added. For a key that appears
//! more than once, the last operation wins; after this batch commits, "key"
//! reads back as "v3":
//!
//! ```ignore
//! batch.put(b"key", b"v1");
//! batch.delete(b"key");
//! batch.put(b"key", b"v2");
//! batch.put(b"key", b"v3");
//! ```
//!
//! Read-only inspection through `&self` is safe from any number of threads;
//! mutation takes `&mut self`, so the compiler enforces the external
//! synchronization the contract requires.

use bytes::Bytes;

/// A single buffered operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Set `key` to `value`.
    Put { key: Bytes, value: Bytes },
    /// Erase `key` if present. Erasing an absent key is not an error.
    Delete { key: Bytes },
}

impl BatchOp {
    /// The key this operation touches.
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOp::Put { key, .. } => key,
            BatchOp::Delete { key } => key,
        }
    }
}

/// An ordered, atomic sequence of Put/Delete mutations.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
    /// Bytes of key+value data buffered, for write-buffer accounting.
    data_size: usize,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a put. Copies `key` and `value`; the caller may reuse both
    /// slices immediately.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.data_size += key.len() + value.len();
        self.ops.push(BatchOp::Put {
            key: Bytes::copy_from_slice(key),
            value: Bytes::copy_from_slice(value),
        });
    }

    /// Buffer a delete. Copies `key`.
    pub fn delete(&mut self, key: &[u8]) {
        self.data_size += key.len();
        self.ops.push(BatchOp::Delete {
            key: Bytes::copy_from_slice(key),
        });
    }

    /// Discard all buffered operations; the batch is reusable afterward.
    pub fn clear(&mut self) {
        self.ops.clear();
        self.data_size = 0;
    }

    /// Number of buffered operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True if no operations are buffered.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Bytes of key and value data buffered in this batch.
    pub fn approximate_size(&self) -> usize {
        self.data_size
    }

    /// Iterate over the buffered operations in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &BatchOp> {
        self.ops.iter()
    }
}
