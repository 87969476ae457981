//! MemTable Module
//!
//! In-memory buffer for recent writes.
//!
//! ## Responsibilities
//! - Fast versioned reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Track size for flush triggers
//! - Ordered iteration for table creation and scans
//!
//! ## Data Structure Choice
//! A skiplist keyed by (user key, sequence) in internal order. Unlike a
//! BTreeMap it accepts a runtime comparator, and its append-only arena keeps
//! cursor positions stable while concurrent writes land, which is what lets
//! iterators pin a consistent view without copying the table.

mod skiplist;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::comparator::ComparatorRef;
use crate::types::{InternalEntry, SequenceNumber, ValueKind};

use skiplist::SkipList;

/// Outcome of a memtable lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum MemTableEntry {
    /// A live value.
    Value(Bytes),

    /// A tombstone (deleted key).
    Tombstone,
}

/// In-memory table of versioned entries.
pub struct MemTable {
    list: RwLock<SkipList>,
    cmp: ComparatorRef,
    /// Approximate bytes of key+value data plus per-node overhead.
    size: AtomicUsize,
    entries: AtomicUsize,
}

/// Accounting overhead charged per inserted entry, covering node links and
/// lengths. Keeps the flush trigger honest for small keys/values.
const ENTRY_OVERHEAD: usize = 64;

impl MemTable {
    /// Create an empty memtable ordered by `cmp`.
    pub fn new(cmp: ComparatorRef) -> Self {
        Self {
            list: RwLock::new(SkipList::new(cmp.clone())),
            cmp,
            size: AtomicUsize::new(0),
            entries: AtomicUsize::new(0),
        }
    }

    /// Insert one versioned entry. Sequence numbers must be unique; the
    /// engine's write path guarantees that.
    pub fn insert(&self, seq: SequenceNumber, kind: ValueKind, key: &[u8], value: &[u8]) {
        let entry = match kind {
            ValueKind::Put => InternalEntry::put(
                Bytes::copy_from_slice(key),
                seq,
                Bytes::copy_from_slice(value),
            ),
            ValueKind::Delete => InternalEntry::tombstone(Bytes::copy_from_slice(key), seq),
        };
        self.list.write().insert(entry);
        self.size
            .fetch_add(key.len() + value.len() + ENTRY_OVERHEAD, Ordering::Relaxed);
        self.entries.fetch_add(1, Ordering::Relaxed);
    }

    /// Look up the newest version of `key` visible at `seq_bound`.
    ///
    /// Returns:
    /// - `Some(Value(v))` — key live with value `v`
    /// - `Some(Tombstone)` — key deleted at or before the bound
    /// - `None` — this memtable holds no visible version; consult the tables
    pub fn get(&self, key: &[u8], seq_bound: SequenceNumber) -> Option<MemTableEntry> {
        let list = self.list.read();
        let node = list.find_greater_or_equal(key, seq_bound);
        let entry = list.entry(node)?;
        if self.cmp.compare(&entry.key, key) != std::cmp::Ordering::Equal {
            return None;
        }
        match entry.kind {
            ValueKind::Put => Some(MemTableEntry::Value(entry.value.clone())),
            ValueKind::Delete => Some(MemTableEntry::Tombstone),
        }
    }

    /// Approximate memory footprint in bytes.
    pub fn approximate_size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Number of entries (versions, not distinct keys).
    pub fn entry_count(&self) -> usize {
        self.entries.load(Ordering::Relaxed)
    }

    /// True if nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    /// A cursor over this memtable in internal order. The cursor stays valid
    /// while concurrent inserts land; new entries simply become visible to
    /// it (and are filtered by sequence at a higher layer).
    pub fn iter(self: &Arc<Self>) -> MemTableIter {
        MemTableIter {
            table: Arc::clone(self),
            node: None,
            current: None,
        }
    }

    /// Drain every entry in internal order, for flushing to a table file.
    pub fn collect_entries(&self) -> Vec<InternalEntry> {
        let list = self.list.read();
        let mut out = Vec::with_capacity(self.entry_count());
        let mut node = list.first();
        while let Some(entry) = list.entry(node) {
            out.push(entry.clone());
            node = list.next(node);
        }
        out
    }
}

/// Cursor over a memtable in internal (key asc, sequence desc) order.
pub struct MemTableIter {
    table: Arc<MemTable>,
    node: Option<u32>,
    /// Entry at `node`, cached so accessors need no lock.
    current: Option<InternalEntry>,
}

impl MemTableIter {
    fn position(&mut self, node: u32) {
        let list = self.table.list.read();
        match list.entry(node) {
            Some(entry) => {
                self.current = Some(entry.clone());
                self.node = Some(node);
            }
            None => {
                self.current = None;
                self.node = None;
            }
        }
    }
}

impl crate::iterator::InternalIterator for MemTableIter {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn seek_to_first(&mut self) -> crate::error::Result<()> {
        let node = self.table.list.read().first();
        self.position(node);
        Ok(())
    }

    fn seek_to_last(&mut self) -> crate::error::Result<()> {
        let node = self.table.list.read().find_last();
        self.position(node);
        Ok(())
    }

    fn seek(&mut self, key: &[u8], seq: SequenceNumber) -> crate::error::Result<()> {
        let node = self.table.list.read().find_greater_or_equal(key, seq);
        self.position(node);
        Ok(())
    }

    fn next(&mut self) -> crate::error::Result<()> {
        debug_assert!(self.valid(), "next() on an unpositioned cursor");
        if let Some(node) = self.node {
            let next = self.table.list.read().next(node);
            self.position(next);
        }
        Ok(())
    }

    fn prev(&mut self) -> crate::error::Result<()> {
        debug_assert!(self.valid(), "prev() on an unpositioned cursor");
        if let Some(entry) = self.current.take() {
            let node = self
                .table
                .list
                .read()
                .find_less_than(&entry.key, entry.seq);
            self.position(node);
        }
        Ok(())
    }

    fn entry(&self) -> &InternalEntry {
        self.current
            .as_ref()
            .expect("entry() on an unpositioned cursor")
    }
}
