//! Merge Iterator
//!
//! K-way merge of sorted internal iterators into one sorted stream, used for
//! range scans (memtable + every table) and for compaction. Children are
//! scanned linearly to pick the smallest (forward) or largest (backward)
//! current entry; child counts are small enough that a heap would not pay
//! for itself.

use crate::comparator::ComparatorRef;
use crate::error::Result;
use crate::types::{compare_internal, InternalEntry, SequenceNumber};

use super::InternalIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Merges multiple sorted internal iterators into a single sorted stream.
pub struct MergeIterator {
    children: Vec<Box<dyn InternalIterator>>,
    cmp: ComparatorRef,
    current: Option<usize>,
    direction: Direction,
}

impl MergeIterator {
    /// Create a merge over `children`. Source order does not matter for
    /// correctness: entry identity (key, sequence) is unique across sources.
    pub fn new(children: Vec<Box<dyn InternalIterator>>, cmp: ComparatorRef) -> Self {
        Self {
            children,
            cmp,
            current: None,
            direction: Direction::Forward,
        }
    }

    fn order(&self, a: &InternalEntry, b: &InternalEntry) -> std::cmp::Ordering {
        compare_internal(self.cmp.as_ref(), &a.key, a.seq, &b.key, b.seq)
    }

    fn find_smallest(&mut self) {
        let mut best: Option<usize> = None;
        for (i, child) in self.children.iter().enumerate() {
            if !child.valid() {
                continue;
            }
            match best {
                None => best = Some(i),
                Some(b) => {
                    if self.order(child.entry(), self.children[b].entry()).is_lt() {
                        best = Some(i);
                    }
                }
            }
        }
        self.current = best;
    }

    fn find_largest(&mut self) {
        let mut best: Option<usize> = None;
        for (i, child) in self.children.iter().enumerate() {
            if !child.valid() {
                continue;
            }
            match best {
                None => best = Some(i),
                Some(b) => {
                    if self.order(child.entry(), self.children[b].entry()).is_gt() {
                        best = Some(i);
                    }
                }
            }
        }
        self.current = best;
    }
}

impl InternalIterator for MergeIterator {
    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn seek_to_first(&mut self) -> Result<()> {
        for child in &mut self.children {
            child.seek_to_first()?;
        }
        self.direction = Direction::Forward;
        self.find_smallest();
        Ok(())
    }

    fn seek_to_last(&mut self) -> Result<()> {
        for child in &mut self.children {
            child.seek_to_last()?;
        }
        self.direction = Direction::Backward;
        self.find_largest();
        Ok(())
    }

    fn seek(&mut self, key: &[u8], seq: SequenceNumber) -> Result<()> {
        for child in &mut self.children {
            child.seek(key, seq)?;
        }
        self.direction = Direction::Forward;
        self.find_smallest();
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        let cur = self.current.expect("next() on an unpositioned merge");

        if self.direction == Direction::Backward {
            // All non-current children sit before the current entry. Put
            // each just after it so forward movement resumes cleanly.
            let pivot = self.children[cur].entry().clone();
            for (i, child) in self.children.iter_mut().enumerate() {
                if i == cur {
                    continue;
                }
                child.seek(&pivot.key, pivot.seq)?;
                if child.valid() {
                    let e = child.entry();
                    if compare_internal(self.cmp.as_ref(), &e.key, e.seq, &pivot.key, pivot.seq)
                        .is_eq()
                    {
                        child.next()?;
                    }
                }
            }
            self.direction = Direction::Forward;
        }

        self.children[cur].next()?;
        self.find_smallest();
        Ok(())
    }

    fn prev(&mut self) -> Result<()> {
        let cur = self.current.expect("prev() on an unpositioned merge");

        if self.direction == Direction::Forward {
            // All non-current children sit at or after the current entry.
            // Put each just before it so backward movement resumes cleanly.
            let pivot = self.children[cur].entry().clone();
            for (i, child) in self.children.iter_mut().enumerate() {
                if i == cur {
                    continue;
                }
                child.seek(&pivot.key, pivot.seq)?;
                if child.valid() {
                    child.prev()?;
                } else {
                    child.seek_to_last()?;
                }
            }
            self.direction = Direction::Backward;
        }

        self.children[cur].prev()?;
        self.find_largest();
        Ok(())
    }

    fn entry(&self) -> &InternalEntry {
        let cur = self.current.expect("entry() on an unpositioned merge");
        self.children[cur].entry()
    }
}
