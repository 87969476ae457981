//! Snapshots
//!
//! A snapshot marks "database state as of sequence number S". Reads bound to
//! a snapshot (via `ReadOptions::snapshot`) observe entries with sequence
//! numbers at or below S and nothing committed afterward.
//!
//! The engine tracks every live snapshot so that compaction never discards a
//! version some snapshot can still see. A snapshot unregisters itself when
//! its last handle is dropped; `DB::release_snapshot` is the explicit form.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Registry of live snapshot sequence numbers, with refcounts so several
/// snapshots at the same sequence coexist.
#[derive(Debug, Default)]
pub(crate) struct SnapshotRegistry {
    live: Mutex<BTreeMap<u64, usize>>,
}

impl SnapshotRegistry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a snapshot at `seq` and hand out its owning handle.
    pub(crate) fn acquire(self: &Arc<Self>, seq: u64) -> Snapshot {
        *self.live.lock().entry(seq).or_insert(0) += 1;
        Snapshot {
            inner: Arc::new(SnapshotInner {
                seq,
                registry: Arc::downgrade(self),
            }),
        }
    }

    fn unregister(&self, seq: u64) {
        let mut live = self.live.lock();
        if let Some(count) = live.get_mut(&seq) {
            *count -= 1;
            if *count == 0 {
                live.remove(&seq);
            }
        }
    }

    /// All live snapshot sequences, ascending. Used by compaction to decide
    /// which versions of a key are still observable.
    pub(crate) fn live_sequences(&self) -> Vec<u64> {
        self.live.lock().keys().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.live.lock().len()
    }
}

#[derive(Debug)]
struct SnapshotInner {
    seq: u64,
    /// Weak: a snapshot outliving its DB must not keep engine state alive,
    /// and releasing it after the DB closed is a no-op.
    registry: Weak<SnapshotRegistry>,
}

impl Drop for SnapshotInner {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.seq);
        }
    }
}

/// An immutable marker of database state at a point in time.
///
/// Cheap to clone; all clones refer to the same registration and it is
/// released once, when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Snapshot {
    inner: Arc<SnapshotInner>,
}

impl Snapshot {
    /// The maximum committed sequence number visible through this snapshot.
    pub fn sequence(&self) -> u64 {
        self.inner.seq
    }
}
