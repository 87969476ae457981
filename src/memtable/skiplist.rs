//! Skiplist implementation
//!
//! Arena-backed skiplist ordered by (user key, sequence) with a runtime
//! comparator. Nodes live in a grow-only Vec and are addressed by index, so
//! a position taken by a cursor remains valid across later inserts. Removal
//! is not supported; the memtable is discarded wholesale after a flush.

use rand::Rng;

use crate::comparator::ComparatorRef;
use crate::types::{compare_internal, InternalEntry, SequenceNumber};

/// Sentinel index meaning "no node".
pub(super) const NIL: u32 = u32::MAX;

const MAX_HEIGHT: usize = 12;
/// 1-in-4 chance of growing a node by one level.
const BRANCHING: u32 = 4;

struct Node {
    entry: InternalEntry,
    /// Forward links per level; a node is linked at levels where other nodes
    /// point to it, and unused slots stay NIL.
    next: [u32; MAX_HEIGHT],
}

pub(super) struct SkipList {
    cmp: ComparatorRef,
    /// nodes[0] is the head sentinel; its entry is never read.
    nodes: Vec<Node>,
    max_height: usize,
}

impl SkipList {
    pub(super) fn new(cmp: ComparatorRef) -> Self {
        let head = Node {
            entry: InternalEntry::tombstone(bytes::Bytes::new(), 0),
            next: [NIL; MAX_HEIGHT],
        };
        Self {
            cmp,
            nodes: vec![head],
            max_height: 1,
        }
    }

    /// The entry at `node`, or None for the head sentinel / NIL.
    pub(super) fn entry(&self, node: u32) -> Option<&InternalEntry> {
        if node == NIL || node == 0 {
            return None;
        }
        Some(&self.nodes[node as usize].entry)
    }

    /// Successor of `node` at level 0.
    pub(super) fn next(&self, node: u32) -> u32 {
        if node == NIL {
            return NIL;
        }
        self.nodes[node as usize].next[0]
    }

    /// First node in order, or NIL if empty.
    pub(super) fn first(&self) -> u32 {
        self.nodes[0].next[0]
    }

    /// True if `node`'s entry sorts before the (key, seq) target.
    fn node_before(&self, node: u32, key: &[u8], seq: SequenceNumber) -> bool {
        let e = &self.nodes[node as usize].entry;
        compare_internal(self.cmp.as_ref(), &e.key, e.seq, key, seq).is_lt()
    }

    /// First node with entry >= (key, seq) in internal order, or NIL.
    /// When `prev` is given, it is filled with the rightmost node before the
    /// target at every level (for linking a new node in).
    fn search(&self, key: &[u8], seq: SequenceNumber, mut prev: Option<&mut [u32]>) -> u32 {
        let mut level = self.max_height - 1;
        let mut x = 0u32;
        loop {
            let nxt = self.nodes[x as usize].next[level];
            if nxt != NIL && self.node_before(nxt, key, seq) {
                x = nxt;
                continue;
            }
            if let Some(p) = prev.as_deref_mut() {
                p[level] = x;
            }
            if level == 0 {
                return nxt;
            }
            level -= 1;
        }
    }

    /// First node with entry >= (key, seq), or NIL.
    pub(super) fn find_greater_or_equal(&self, key: &[u8], seq: SequenceNumber) -> u32 {
        self.search(key, seq, None)
    }

    /// Last node with entry < (key, seq), or NIL if every entry is >=.
    pub(super) fn find_less_than(&self, key: &[u8], seq: SequenceNumber) -> u32 {
        let mut level = self.max_height - 1;
        let mut x = 0u32;
        loop {
            let nxt = self.nodes[x as usize].next[level];
            if nxt != NIL && self.node_before(nxt, key, seq) {
                x = nxt;
                continue;
            }
            if level == 0 {
                return if x == 0 { NIL } else { x };
            }
            level -= 1;
        }
    }

    /// Last node in order, or NIL if empty.
    pub(super) fn find_last(&self) -> u32 {
        let mut level = self.max_height - 1;
        let mut x = 0u32;
        loop {
            let nxt = self.nodes[x as usize].next[level];
            if nxt != NIL {
                x = nxt;
                continue;
            }
            if level == 0 {
                return if x == 0 { NIL } else { x };
            }
            level -= 1;
        }
    }

    fn random_height(&self) -> usize {
        let mut rng = rand::thread_rng();
        let mut height = 1;
        while height < MAX_HEIGHT && rng.gen_ratio(1, BRANCHING) {
            height += 1;
        }
        height
    }

    /// Insert an entry. (key, seq) pairs are unique by construction; equal
    /// pairs would land adjacent and the newer insert wins on reads.
    pub(super) fn insert(&mut self, entry: InternalEntry) {
        let mut prev = [0u32; MAX_HEIGHT];
        self.search(&entry.key, entry.seq, Some(&mut prev[..]));

        let height = self.random_height();
        if height > self.max_height {
            for slot in prev.iter_mut().take(height).skip(self.max_height) {
                *slot = 0;
            }
            self.max_height = height;
        }

        let idx = self.nodes.len() as u32;
        let mut next = [NIL; MAX_HEIGHT];
        for (level, slot) in next.iter_mut().enumerate().take(height) {
            *slot = self.nodes[prev[level] as usize].next[level];
        }
        self.nodes.push(Node { entry, next });
        for level in 0..height {
            self.nodes[prev[level] as usize].next[level] = idx;
        }
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.nodes.len() - 1
    }
}
