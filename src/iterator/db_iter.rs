//! Database Iterator
//!
//! The user-facing cursor over the key space. Wraps a [`MergeIterator`] over
//! the pinned memtable and table set, collapses the version history of each
//! key to the newest version visible at the iterator's sequence bound, and
//! hides tombstones. Supports forward and reverse movement.
//!
//! The view is fixed at creation: the iterator holds its own references to
//! the memtable and tables it was built over, so writes, flushes, and
//! compactions that commit later are invisible to it.
//!
//! Errors from the backing storage are sticky: once `status()` reports an
//! error the iterator stays invalid. A subsequent seek rebuilds the cursor
//! from scratch and clears the error.

use bytes::Bytes;

use crate::comparator::ComparatorRef;
use crate::error::MeridianError;
use crate::snapshot::Snapshot;
use crate::types::{SequenceNumber, ValueKind};

use super::{InternalIterator, MergeIterator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Ordered cursor over a consistent view of the keyspace.
///
/// Not `Sync`: confine an iterator to one thread or synchronize externally.
pub struct DbIterator {
    iter: MergeIterator,
    cmp: ComparatorRef,
    /// Reads observe entries with sequence <= bound.
    bound: SequenceNumber,
    /// Keeps an explicitly bound snapshot registered while iterating.
    _snapshot: Option<Snapshot>,

    direction: Direction,
    valid: bool,
    /// Current user key/value. In backward mode the underlying cursor sits
    /// before the current key group, so these carry the result.
    saved_key: Bytes,
    saved_value: Bytes,
    status: Option<MeridianError>,
}

impl DbIterator {
    pub(crate) fn new(
        iter: MergeIterator,
        cmp: ComparatorRef,
        bound: SequenceNumber,
        snapshot: Option<Snapshot>,
    ) -> Self {
        Self {
            iter,
            cmp,
            bound,
            _snapshot: snapshot,
            direction: Direction::Forward,
            valid: false,
            saved_key: Bytes::new(),
            saved_value: Bytes::new(),
            status: None,
        }
    }

    /// True iff the iterator is positioned on an entry.
    pub fn valid(&self) -> bool {
        self.valid && self.status.is_none()
    }

    /// The sticky error, if the backing storage failed.
    pub fn status(&self) -> Option<&MeridianError> {
        self.status.as_ref()
    }

    /// Current key. Panics if not positioned; the slice is valid until the
    /// next positioning call.
    pub fn key(&self) -> &[u8] {
        assert!(self.valid(), "key() called on an unpositioned iterator");
        &self.saved_key
    }

    /// Current value. Panics if not positioned; the slice is valid until the
    /// next positioning call.
    pub fn value(&self) -> &[u8] {
        assert!(self.valid(), "value() called on an unpositioned iterator");
        &self.saved_value
    }

    /// Position at the first key.
    pub fn seek_to_first(&mut self) {
        self.status = None;
        self.direction = Direction::Forward;
        if let Err(e) = self.iter.seek_to_first() {
            self.fail(e);
            return;
        }
        self.find_next_user_entry(false, Bytes::new());
    }

    /// Position at the last key.
    pub fn seek_to_last(&mut self) {
        self.status = None;
        if let Err(e) = self.iter.seek_to_last() {
            self.fail(e);
            return;
        }
        self.find_prev_user_entry();
    }

    /// Position at the first key >= `target`.
    pub fn seek(&mut self, target: &[u8]) {
        self.status = None;
        self.direction = Direction::Forward;
        if let Err(e) = self.iter.seek(target, self.bound) {
            self.fail(e);
            return;
        }
        self.find_next_user_entry(false, Bytes::new());
    }

    /// Advance to the next key. Panics if not positioned.
    pub fn next(&mut self) {
        assert!(self.valid(), "next() called on an unpositioned iterator");

        if self.direction == Direction::Backward {
            // The cursor sits before the current key group; step back into
            // it so the skipping scan below starts inside the group.
            self.direction = Direction::Forward;
            let step = if self.iter.valid() {
                self.iter.next()
            } else {
                self.iter.seek_to_first()
            };
            if let Err(e) = step {
                self.fail(e);
                return;
            }
            if !self.iter.valid() {
                self.valid = false;
                return;
            }
        } else if let Err(e) = self.iter.next() {
            self.fail(e);
            return;
        }

        let skip = self.saved_key.clone();
        self.find_next_user_entry(true, skip);
    }

    /// Retreat to the previous key. Panics if not positioned.
    pub fn prev(&mut self) {
        assert!(self.valid(), "prev() called on an unpositioned iterator");

        if self.direction == Direction::Forward {
            // The cursor sits on the current entry. Back off until the key
            // changes, then let the reverse scan pick the previous key.
            loop {
                if let Err(e) = self.iter.prev() {
                    self.fail(e);
                    return;
                }
                if !self.iter.valid() {
                    self.valid = false;
                    return;
                }
                let e = self.iter.entry();
                if self.cmp.compare(&e.key, &self.saved_key).is_lt() {
                    break;
                }
            }
            self.direction = Direction::Backward;
        }

        self.find_prev_user_entry();
    }

    fn fail(&mut self, e: MeridianError) {
        self.status = Some(e);
        self.valid = false;
    }

    /// Forward scan for the newest visible Put of the next live key.
    /// When `skipping`, entries for `skip` are older versions of a key
    /// already consumed (or tombstoned) and are passed over.
    fn find_next_user_entry(&mut self, mut skipping: bool, mut skip: Bytes) {
        loop {
            if !self.iter.valid() {
                self.valid = false;
                return;
            }
            let e = self.iter.entry();
            if e.seq <= self.bound {
                match e.kind {
                    ValueKind::Delete => {
                        // Newest visible version is a tombstone: the key is
                        // dead, and so are its older versions.
                        skip = e.key.clone();
                        skipping = true;
                    }
                    ValueKind::Put => {
                        if !(skipping && self.cmp.compare(&e.key, &skip).is_eq()) {
                            self.valid = true;
                            self.direction = Direction::Forward;
                            self.saved_key = e.key.clone();
                            self.saved_value = e.value.clone();
                            return;
                        }
                    }
                }
            }
            if let Err(err) = self.iter.next() {
                self.fail(err);
                return;
            }
        }
    }

    /// Backward scan for the previous live key.
    ///
    /// Walking backward visits a key's versions oldest-first, so the scan
    /// keeps overwriting its candidate until the key changes; the last
    /// overwrite is the newest visible version. A tombstone clears the
    /// candidate and the scan continues into the next-smaller key.
    fn find_prev_user_entry(&mut self) {
        let mut kind = ValueKind::Delete;
        let mut key = Bytes::new();
        let mut value = Bytes::new();

        loop {
            if !self.iter.valid() {
                break;
            }
            let e = self.iter.entry();
            if e.seq <= self.bound {
                if kind == ValueKind::Put && self.cmp.compare(&e.key, &key).is_lt() {
                    // Entered the preceding key group with a live result.
                    break;
                }
                kind = e.kind;
                match e.kind {
                    ValueKind::Delete => {
                        key = Bytes::new();
                        value = Bytes::new();
                    }
                    ValueKind::Put => {
                        key = e.key.clone();
                        value = e.value.clone();
                    }
                }
            }
            if let Err(err) = self.iter.prev() {
                self.fail(err);
                return;
            }
        }

        if kind == ValueKind::Put {
            self.valid = true;
            self.direction = Direction::Backward;
            self.saved_key = key;
            self.saved_value = value;
        } else {
            self.valid = false;
            self.direction = Direction::Forward;
        }
    }
}
