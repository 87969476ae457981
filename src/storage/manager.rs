//! Table Store
//!
//! Owns the table directory: discovers existing tables on startup, builds
//! new ones from memtable flushes and compactions, and merges table sets.
//!
//! ## Concurrency:
//! - `next_table_id`: atomic counter (lock-free)
//! - All methods take `&self`; the table *list* itself is part of the
//!   engine's pinned state, not this store

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ReadOptions;
use crate::error::Result;
use crate::iterator::{InternalIterator, MergeIterator};
use crate::types::{InternalEntry, SequenceNumber, ValueKind};

use super::sstable::{Table, TableBuilder};
use super::TableContext;

/// Manages table files in one directory.
pub struct TableStore {
    dir: PathBuf,
    ctx: TableContext,
    /// Next ID for new tables (atomic, lock-free). IDs are never reused, so
    /// stale block-cache entries of deleted tables can never be confused
    /// with live ones.
    next_table_id: AtomicU64,
}

impl TableStore {
    /// Open the store, discovering existing tables.
    ///
    /// Returns the store plus the discovered tables ordered newest-first
    /// (highest ID first), matching the read path's search order.
    pub fn open(dir: &Path, ctx: TableContext) -> Result<(Self, Vec<Arc<Table>>)> {
        fs::create_dir_all(dir)?;

        let mut ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                if let Some(id) = Self::parse_table_id(&path) {
                    ids.push(id);
                }
            }
        }
        ids.sort_unstable();
        ids.reverse();

        let mut tables = Vec::with_capacity(ids.len());
        for &id in &ids {
            let path = Self::table_path_in(dir, id);
            let table = Table::open(&path, id, ctx.clone())?;
            tables.push(Arc::new(table));
        }

        let next_id = ids.first().map(|&id| id + 1).unwrap_or(1);
        debug!(tables = tables.len(), next_id, "table store opened");

        Ok((
            Self {
                dir: dir.to_path_buf(),
                ctx,
                next_table_id: AtomicU64::new(next_id),
            },
            tables,
        ))
    }

    /// Build a new table from entries pre-sorted in internal order.
    ///
    /// Returns `None` when the source is empty (no file is left behind).
    pub fn build_table<I>(&self, entries: I) -> Result<Option<Arc<Table>>>
    where
        I: IntoIterator<Item = InternalEntry>,
    {
        let id = self.next_table_id.fetch_add(1, Ordering::SeqCst);
        let path = self.table_path(id);

        let mut builder = TableBuilder::new(&path, self.ctx.clone())?;
        for entry in entries {
            builder.add(&entry)?;
        }
        if builder.entry_count() == 0 {
            builder.abandon()?;
            return Ok(None);
        }

        let meta = builder.finish()?;
        debug!(id, entries = meta.entry_count, "table built");

        let table = Table::open(&path, id, self.ctx.clone())?;
        Ok(Some(Arc::new(table)))
    }

    /// Merge `inputs` (newest-first) into a single table, dropping versions
    /// no live snapshot or future read can observe.
    ///
    /// `bounds` are the live snapshot sequences, ascending. A version
    /// survives iff it is the newest version at some bound, or at "latest".
    /// Tombstones are garbage-collected only when `drop_tombstones` — the
    /// caller asserts the inputs are the only place older versions of these
    /// keys can exist (a full compaction).
    ///
    /// Returns `None` when everything was dropped and no output file exists.
    pub fn merge_tables(
        &self,
        inputs: &[Arc<Table>],
        bounds: &[SequenceNumber],
        drop_tombstones: bool,
    ) -> Result<Option<Arc<Table>>> {
        let ropts = ReadOptions {
            // A compaction reads every input once; caching those blocks
            // would evict the working set.
            fill_cache: false,
            ..ReadOptions::default()
        };
        let children: Vec<Box<dyn InternalIterator>> = inputs
            .iter()
            .map(|t| Box::new(t.iter(&ropts)) as Box<dyn InternalIterator>)
            .collect();
        let mut merge = MergeIterator::new(children, self.ctx.cmp.clone());
        merge.seek_to_first()?;

        let id = self.next_table_id.fetch_add(1, Ordering::SeqCst);
        let path = self.table_path(id);
        let mut builder = TableBuilder::new(&path, self.ctx.clone())?;

        let mut dropped = 0u64;
        let mut group: Vec<InternalEntry> = Vec::new();
        while merge.valid() {
            let entry = merge.entry().clone();
            let same_key = group
                .first()
                .map(|g| self.ctx.cmp.compare(&g.key, &entry.key).is_eq())
                .unwrap_or(false);
            if !same_key && !group.is_empty() {
                dropped += emit_group(&mut builder, &group, bounds, drop_tombstones)?;
                group.clear();
            }
            group.push(entry);
            merge.next()?;
        }
        if !group.is_empty() {
            dropped += emit_group(&mut builder, &group, bounds, drop_tombstones)?;
        }

        if builder.entry_count() == 0 {
            builder.abandon()?;
            info!(id, dropped, "compaction produced no output");
            return Ok(None);
        }

        let meta = builder.finish()?;
        info!(
            id,
            entries = meta.entry_count,
            dropped,
            inputs = inputs.len(),
            "compaction output built"
        );
        let table = Table::open(&path, id, self.ctx.clone())?;
        Ok(Some(Arc::new(table)))
    }

    /// Remove a table's file. Open readers keep their data until dropped.
    pub fn remove_table_file(&self, table: &Table) -> Result<()> {
        fs::remove_file(table.path())?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // =========================================================================
    // Path Helpers
    // =========================================================================

    fn table_path(&self, id: u64) -> PathBuf {
        Self::table_path_in(&self.dir, id)
    }

    /// Generate table path given a directory and ID
    pub(crate) fn table_path_in(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// Parse table ID from filename
    /// "sstable_000042.sst" → Some(42)
    pub fn parse_table_id(path: &Path) -> Option<u64> {
        if path.extension()?.to_str()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }
}

/// Write the surviving versions of one key's group (newest-first) to the
/// builder; returns how many versions were dropped.
///
/// Visibility rule: a reader at bound `b` sees the newest version with
/// sequence <= b. Version `v_i` (between newer `v_{i-1}` and nothing or
/// older versions) is observable iff some bound lies in
/// `[seq(v_i), seq(v_{i-1}))`, with "latest" acting as an infinite bound.
fn emit_group(
    builder: &mut TableBuilder,
    group: &[InternalEntry],
    bounds: &[SequenceNumber],
    drop_tombstones: bool,
) -> Result<u64> {
    let mut kept: Vec<&InternalEntry> = Vec::with_capacity(group.len());
    let mut newer_seq: Option<SequenceNumber> = None;
    for entry in group {
        let observable = match newer_seq {
            // Newest version: always observable at "latest".
            None => true,
            Some(newer) => bounds
                .iter()
                .any(|&b| b >= entry.seq && b < newer),
        };
        if observable {
            kept.push(entry);
        }
        newer_seq = Some(entry.seq);
    }

    // A trailing tombstone that masks nothing (no older kept version) can
    // itself be dropped, but only when no older version of the key can live
    // outside this compaction's inputs.
    if drop_tombstones && kept.len() == 1 && kept[0].kind == ValueKind::Delete {
        kept.pop();
    }

    for entry in &kept {
        builder.add(entry)?;
    }
    Ok((group.len() - kept.len()) as u64)
}
