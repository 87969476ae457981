//! SSTable Iterator
//!
//! Bidirectional cursor over one table's entries in internal order. Keeps
//! the current block decoded; moving to a neighboring block loads it through
//! the block cache.

use std::sync::Arc;

use crate::config::ReadOptions;
use crate::error::Result;
use crate::iterator::InternalIterator;
use crate::types::{compare_internal, InternalEntry, SequenceNumber};

use super::Table;

/// Cursor over a table file in internal (key asc, sequence desc) order.
pub struct TableIterator {
    table: Arc<Table>,
    ropts: ReadOptions,
    /// Index of the loaded block, if any.
    block_idx: Option<usize>,
    /// Decoded entries of the loaded block.
    entries: Vec<InternalEntry>,
    /// Position within `entries`; valid iff block_idx is Some.
    entry_idx: usize,
}

impl TableIterator {
    pub(super) fn new(table: Arc<Table>, ropts: ReadOptions) -> Self {
        Self {
            table,
            ropts,
            block_idx: None,
            entries: Vec::new(),
            entry_idx: 0,
        }
    }

    fn load_block(&mut self, idx: usize) -> Result<()> {
        self.entries = self.table.read_block_entries(idx, &self.ropts)?;
        self.block_idx = Some(idx);
        self.entry_idx = 0;
        Ok(())
    }

    fn invalidate(&mut self) {
        self.block_idx = None;
        self.entries.clear();
        self.entry_idx = 0;
    }
}

impl InternalIterator for TableIterator {
    fn valid(&self) -> bool {
        self.block_idx.is_some() && self.entry_idx < self.entries.len()
    }

    fn seek_to_first(&mut self) -> Result<()> {
        if self.table.block_count() == 0 {
            self.invalidate();
            return Ok(());
        }
        self.load_block(0)
    }

    fn seek_to_last(&mut self) -> Result<()> {
        let blocks = self.table.block_count();
        if blocks == 0 {
            self.invalidate();
            return Ok(());
        }
        self.load_block(blocks - 1)?;
        self.entry_idx = self.entries.len().saturating_sub(1);
        Ok(())
    }

    fn seek(&mut self, key: &[u8], seq: SequenceNumber) -> Result<()> {
        let Some(idx) = self.table.block_index_for(key, seq) else {
            self.invalidate();
            return Ok(());
        };
        self.load_block(idx)?;
        let cmp = self.table.comparator();
        self.entry_idx = self.entries.partition_point(|e| {
            compare_internal(cmp.as_ref(), &e.key, e.seq, key, seq).is_lt()
        });
        // The chosen block's last entry is >= the target, so the position
        // always lands inside the block.
        debug_assert!(self.entry_idx < self.entries.len());
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        debug_assert!(self.valid(), "next() on an unpositioned cursor");
        self.entry_idx += 1;
        if self.entry_idx >= self.entries.len() {
            let cur = self.block_idx.unwrap_or(0);
            if cur + 1 < self.table.block_count() {
                self.load_block(cur + 1)?;
            } else {
                self.invalidate();
            }
        }
        Ok(())
    }

    fn prev(&mut self) -> Result<()> {
        debug_assert!(self.valid(), "prev() on an unpositioned cursor");
        if self.entry_idx > 0 {
            self.entry_idx -= 1;
            return Ok(());
        }
        let cur = self.block_idx.unwrap_or(0);
        if cur == 0 {
            self.invalidate();
            return Ok(());
        }
        self.load_block(cur - 1)?;
        self.entry_idx = self.entries.len().saturating_sub(1);
        Ok(())
    }

    fn entry(&self) -> &InternalEntry {
        debug_assert!(self.valid(), "entry() on an unpositioned cursor");
        &self.entries[self.entry_idx]
    }
}
