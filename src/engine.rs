//! Engine Module
//!
//! The database engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, table storage, snapshots, and iterators
//! - Serialize writes and assign sequence numbers
//! - Trigger flushes when the memtable fills and compactions when the
//!   table count grows
//! - Manage crash recovery on startup
//!
//! ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
//!
//! - **Writes** (put/delete/write/flush): serialized by `write_lock`.
//!   Commit order: WAL append → memtable insert → one atomic store of the
//!   last visible sequence. Readers either see a whole batch or none of it.
//!
//! - **Reads** (get/iter/snapshot): never take the write lock. A read
//!   briefly holds the state lock to clone `Arc`s of the memtable and table
//!   list, then works on that pinned view; flushes and compactions replace
//!   the state wholesale and never mutate what a reader pinned.
//!
//! - **Compaction**: one at a time (`compaction_lock`), either on the
//!   background worker (table-count trigger) or on the caller's thread
//!   (`compact_range`). Input tables stay alive through their `Arc`s for
//!   any reader that pinned them; their files are unlinked immediately.

use std::fs::{self, File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::batch::{BatchOp, WriteBatch};
use crate::cache::Cache;
use crate::comparator::ComparatorRef;
use crate::config::{Options, ReadOptions, WriteOptions};
use crate::error::{MeridianError, Result};
use crate::iterator::{DbIterator, InternalIterator, MergeIterator};
use crate::memtable::{MemTable, MemTableEntry};
use crate::snapshot::{Snapshot, SnapshotRegistry};
use crate::storage::{Table, TableContext, TableStore};
use crate::types::{InternalEntry, SequenceNumber, ValueKind};
use crate::wal::{Operation, WalRecord, WalRecovery, WalWriter};

/// A range of keys: half-open [start, limit). An absent start means "before
/// all keys"; an absent limit means "after all keys".
#[derive(Debug, Clone, Default)]
pub struct Range {
    pub start: Option<Vec<u8>>,
    pub limit: Option<Vec<u8>>,
}

impl Range {
    pub fn new(start: impl Into<Vec<u8>>, limit: impl Into<Vec<u8>>) -> Self {
        Self {
            start: Some(start.into()),
            limit: Some(limit.into()),
        }
    }

    /// The unbounded range covering every key.
    pub fn all() -> Self {
        Self::default()
    }
}

/// A point-in-time snapshot of engine counters.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub writes: u64,
    pub entries_written: u64,
    pub reads: u64,
    pub flushes: u64,
    pub compactions: u64,
    pub tables: u64,
    pub memtable_bytes: u64,
    pub cache_usage: u64,
    pub live_snapshots: u64,
}

#[derive(Debug, Default)]
struct Counters {
    writes: AtomicU64,
    entries_written: AtomicU64,
    reads: AtomicU64,
    flushes: AtomicU64,
    compactions: AtomicU64,
}

/// The pinned, immutable view readers operate on. Replaced wholesale by
/// flushes and compactions.
struct EngineState {
    memtable: Arc<MemTable>,
    /// Open tables, newest first.
    tables: Vec<Arc<Table>>,
}

enum WorkerMsg {
    Trigger,
    Shutdown,
}

/// Start a background compaction once this many tables accumulate.
const COMPACTION_TRIGGER: usize = 4;

/// Capacity of the private block cache when none is shared via `Options`.
const DEFAULT_CACHE_CAPACITY: u64 = 8 * 1024 * 1024;

const WAL_FILENAME: &str = "wal.log";
const SSTABLE_DIR: &str = "sstables";
const LOCK_FILENAME: &str = "LOCK";
const IDENTITY_FILENAME: &str = "IDENTITY";
const FORMAT_VERSION: u32 = 1;

/// A persistent ordered map from keys to values.
///
/// Safe for concurrent use from multiple threads without external locking.
/// `close` consumes the handle; dropping it performs the same shutdown.
/// Iterators and snapshots hold their own references to the state they
/// pinned, so they never dangle, even across `close`.
pub struct DB {
    inner: Arc<DbInner>,
    compaction_tx: Sender<WorkerMsg>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
    closed: AtomicBool,
}

struct DbInner {
    options: Options,
    path: PathBuf,
    cmp: ComparatorRef,
    cache: Arc<Cache>,
    store: TableStore,

    state: RwLock<Arc<EngineState>>,
    wal: Mutex<WalWriter>,
    /// Serializes write operations (put/delete/write/flush)
    write_lock: Mutex<()>,
    /// Serializes compactions
    compaction_lock: Mutex<()>,

    /// Highest committed, reader-visible sequence number
    last_seq: AtomicU64,
    snapshots: Arc<SnapshotRegistry>,
    stats: Counters,

    /// Held exclusively for the lifetime of the handle
    _lock_file: File,
}

impl DB {
    /// Open or create a database at `path`.
    ///
    /// On startup:
    /// 1. Check create/exists flags and take the directory lock
    /// 2. Validate the IDENTITY file (format version, comparator name)
    /// 3. Load existing tables
    /// 4. Recover the WAL, flushing anything recovered to a table
    /// 5. Start the background compaction worker
    pub fn open(path: impl AsRef<Path>, options: Options) -> Result<DB> {
        let path = path.as_ref().to_path_buf();
        let identity_path = path.join(IDENTITY_FILENAME);
        let exists = identity_path.is_file();

        if exists && options.error_if_exists {
            return Err(MeridianError::AlreadyExists(path.display().to_string()));
        }
        if !exists && !options.create_if_missing {
            return Err(MeridianError::NotFound);
        }

        fs::create_dir_all(&path)?;
        let lock_file = acquire_dir_lock(&path)?;

        if exists {
            validate_identity(&identity_path, &options)?;
        } else {
            write_identity(&identity_path, &options)?;
        }

        let cmp = options.comparator.clone();
        let cache = options
            .block_cache
            .clone()
            .unwrap_or_else(|| Arc::new(Cache::new(DEFAULT_CACHE_CAPACITY)));
        let ctx = TableContext::from_options(&options, cache.clone());

        let (store, mut tables) = TableStore::open(&path.join(SSTABLE_DIR), ctx)?;
        let mut last_seq = tables
            .iter()
            .map(|t| t.meta().max_seq)
            .max()
            .unwrap_or(0);

        // Recover the WAL and immediately flush what it held: once the data
        // sits in a table, a second crash cannot touch it and the log can
        // be truncated.
        let wal_path = path.join(WAL_FILENAME);
        let mut memtable = Arc::new(MemTable::new(cmp.clone()));
        if wal_path.is_file() {
            let (records, recovery) =
                WalRecovery::recover(&wal_path, options.paranoid_checks)?;
            if recovery.records_recovered > 0 || recovery.truncated {
                info!(
                    records = recovery.records_recovered,
                    ops = recovery.ops_recovered,
                    last_seq = recovery.last_sequence,
                    truncated = recovery.truncated,
                    "WAL recovery complete"
                );
            }
            for record in &records {
                let mut seq = record.first_seq;
                for op in &record.ops {
                    match op {
                        Operation::Put { key, value } => {
                            memtable.insert(seq, ValueKind::Put, key, value)
                        }
                        Operation::Delete { key } => {
                            memtable.insert(seq, ValueKind::Delete, key, &[])
                        }
                    }
                    seq += 1;
                }
            }
            last_seq = last_seq.max(recovery.last_sequence);

            if !memtable.is_empty() {
                info!(
                    entries = memtable.entry_count(),
                    "flushing recovered entries to a table"
                );
                if let Some(table) = store.build_table(memtable.collect_entries())? {
                    tables.insert(0, table);
                }
                memtable = Arc::new(MemTable::new(cmp.clone()));
            }
        }

        let mut wal = WalWriter::open(&wal_path)?;
        wal.truncate()?;

        let inner = Arc::new(DbInner {
            options,
            path,
            cmp,
            cache,
            store,
            state: RwLock::new(Arc::new(EngineState { memtable, tables })),
            wal: Mutex::new(wal),
            write_lock: Mutex::new(()),
            compaction_lock: Mutex::new(()),
            last_seq: AtomicU64::new(last_seq),
            snapshots: SnapshotRegistry::new(),
            stats: Counters::default(),
            _lock_file: lock_file,
        });

        let (tx, rx) = unbounded();
        let worker_inner = Arc::clone(&inner);
        let worker = std::thread::Builder::new()
            .name("meridiankv-compact".to_string())
            .spawn(move || compaction_worker(worker_inner, rx))?;

        let db = DB {
            inner,
            compaction_tx: tx,
            worker: Mutex::new(Some(worker)),
            closed: AtomicBool::new(false),
        };

        // A backlog of tables from before this open still counts.
        if db.inner.state.read().tables.len() >= db.inner.compaction_trigger() {
            let _ = db.compaction_tx.send(WorkerMsg::Trigger);
        }

        debug!(path = %db.inner.path.display(), last_seq, "database opened");
        Ok(db)
    }

    /// Set `key` to `value`. Equivalent to committing a one-entry batch.
    /// Both slices are copied; the caller may reuse them immediately.
    pub fn put(&self, wopts: &WriteOptions, key: &[u8], value: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(wopts, &batch)
    }

    /// Remove the entry for `key`, if any. Deleting an absent key succeeds.
    pub fn delete(&self, wopts: &WriteOptions, key: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(wopts, &batch)
    }

    /// Atomically apply every operation in `batch`, in order. The batch
    /// receives one contiguous range of sequence numbers; concurrent readers
    /// observe either all of it or none of it.
    pub fn write(&self, wopts: &WriteOptions, batch: &WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let guard = self.inner.write_lock.lock();

        let first_seq = self.inner.last_seq.load(Ordering::SeqCst) + 1;
        let record = WalRecord::from_batch(first_seq, batch);
        self.inner.wal.lock().append(&record, wopts.sync)?;

        let state = self.inner.state.read().clone();
        let mut seq = first_seq;
        for op in batch.iter() {
            match op {
                BatchOp::Put { key, value } => {
                    state.memtable.insert(seq, ValueKind::Put, key, value)
                }
                BatchOp::Delete { key } => {
                    state.memtable.insert(seq, ValueKind::Delete, key, &[])
                }
            }
            seq += 1;
        }
        // Publish: the whole batch becomes visible in one store.
        self.inner.last_seq.store(seq - 1, Ordering::SeqCst);

        self.inner.stats.writes.fetch_add(1, Ordering::Relaxed);
        self.inner
            .stats
            .entries_written
            .fetch_add(batch.len() as u64, Ordering::Relaxed);

        let mut want_compaction = false;
        if state.memtable.approximate_size() >= self.inner.options.write_buffer_size {
            want_compaction = self.inner.flush_memtable_locked(&guard)?;
        }
        drop(guard);

        if want_compaction {
            let _ = self.compaction_tx.send(WorkerMsg::Trigger);
        }
        Ok(())
    }

    /// Get the newest value of `key` visible at the read's sequence bound
    /// (the bound snapshot's, or the latest committed state).
    ///
    /// Returns `NotFound` — a normal outcome, not a failure — when the key
    /// has no live value there.
    pub fn get(&self, ropts: &ReadOptions, key: &[u8]) -> Result<Bytes> {
        let bound = self.read_bound(ropts);
        let state = self.inner.state.read().clone();
        self.inner.stats.reads.fetch_add(1, Ordering::Relaxed);

        match state.memtable.get(key, bound) {
            Some(MemTableEntry::Value(v)) => return Ok(v),
            Some(MemTableEntry::Tombstone) => return Err(MeridianError::NotFound),
            None => {}
        }

        // Search every table, keeping the newest visible version. Tables are
        // pruned by key range and by their max sequence once a candidate is
        // in hand.
        let mut best: Option<InternalEntry> = None;
        for table in &state.tables {
            if let Some(b) = &best {
                if table.meta().max_seq <= b.seq {
                    continue;
                }
            }
            if let Some(entry) = table.get(key, bound, ropts)? {
                let better = best.as_ref().map(|b| entry.seq > b.seq).unwrap_or(true);
                if better {
                    best = Some(entry);
                }
            }
        }

        match best {
            Some(entry) if entry.kind == ValueKind::Put => Ok(entry.value),
            _ => Err(MeridianError::NotFound),
        }
    }

    /// Create an iterator over a consistent view of the keyspace.
    ///
    /// Never fails synchronously; storage errors surface through the
    /// iterator's `status()`. For bulk scans consider `fill_cache = false`
    /// so the scan does not displace hot blocks.
    pub fn iter(&self, ropts: &ReadOptions) -> DbIterator {
        let bound = self.read_bound(ropts);
        let state = self.inner.state.read().clone();

        let mut children: Vec<Box<dyn InternalIterator>> =
            Vec::with_capacity(1 + state.tables.len());
        children.push(Box::new(state.memtable.iter()));
        for table in &state.tables {
            children.push(Box::new(table.iter(ropts)));
        }

        let merge = MergeIterator::new(children, self.inner.cmp.clone());
        DbIterator::new(merge, self.inner.cmp.clone(), bound, ropts.snapshot.clone())
    }

    /// Capture the current state as a snapshot. Reads bound to it observe
    /// none of the writes committed afterward.
    pub fn snapshot(&self) -> Snapshot {
        let seq = self.inner.last_seq.load(Ordering::SeqCst);
        self.inner.snapshots.acquire(seq)
    }

    /// Explicitly release a snapshot. Dropping the last handle does the
    /// same; this form exists for lifetimes shorter than a scope.
    pub fn release_snapshot(&self, snapshot: Snapshot) {
        drop(snapshot);
    }

    /// Best-effort on-disk size of each range, from table index metadata
    /// only. Recently written (memtable-resident) data is not counted, so 0
    /// is a valid answer for a non-empty range.
    pub fn approximate_sizes(&self, ranges: &[Range]) -> Vec<u64> {
        let state = self.inner.state.read().clone();
        ranges
            .iter()
            .map(|range| {
                state
                    .tables
                    .iter()
                    .map(|t| {
                        let start = range
                            .start
                            .as_deref()
                            .map(|k| t.offset_of(k))
                            .unwrap_or_else(|| t.data_start());
                        let limit = range
                            .limit
                            .as_deref()
                            .map(|k| t.offset_of(k))
                            .unwrap_or_else(|| t.data_end());
                        limit.saturating_sub(start)
                    })
                    .sum()
            })
            .collect()
    }

    /// Rewrite the storage covering `[begin, end]` (either bound `None`
    /// means open-ended), discarding overwritten versions and — for
    /// whole-database compactions — tombstones. Logical content is
    /// unchanged. Runs on the calling thread.
    pub fn compact_range(&self, begin: Option<&[u8]>, end: Option<&[u8]>) -> Result<()> {
        {
            let guard = self.inner.write_lock.lock();
            self.inner.flush_memtable_locked(&guard)?;
        }
        self.inner.compact(begin, end)
    }

    /// Manually flush the memtable to a table file.
    pub fn flush(&self) -> Result<()> {
        let guard = self.inner.write_lock.lock();
        let want_compaction = self.inner.flush_memtable_locked(&guard)?;
        drop(guard);
        if want_compaction {
            let _ = self.compaction_tx.send(WorkerMsg::Trigger);
        }
        Ok(())
    }

    /// Value of a named database property, or the empty string for names
    /// this engine does not recognize.
    ///
    /// Recognized names:
    /// - `meridiankv.num-files-at-level<N>` — table files at level N
    /// - `meridiankv.stats` — multi-line counters dump
    /// - `meridiankv.sstables` — one line per live table
    /// - `meridiankv.approximate-memory-usage` — memtable + cache bytes
    pub fn property(&self, name: &str) -> String {
        let Some(name) = name.strip_prefix("meridiankv.") else {
            return String::new();
        };

        if let Some(level) = name.strip_prefix("num-files-at-level") {
            let Ok(level) = level.parse::<usize>() else {
                return String::new();
            };
            // All tables currently live in one newest-first tier.
            let count = if level == 0 {
                self.inner.state.read().tables.len()
            } else {
                0
            };
            return count.to_string();
        }

        match name {
            "stats" => {
                let s = self.stats();
                format!(
                    "writes: {}\nentries written: {}\nreads: {}\nflushes: {}\n\
                     compactions: {}\ntables: {}\nmemtable bytes: {}\n\
                     cache usage: {}\nlive snapshots: {}\n",
                    s.writes,
                    s.entries_written,
                    s.reads,
                    s.flushes,
                    s.compactions,
                    s.tables,
                    s.memtable_bytes,
                    s.cache_usage,
                    s.live_snapshots
                )
            }
            "sstables" => {
                let state = self.inner.state.read().clone();
                let mut out = String::new();
                for t in &state.tables {
                    let meta = t.meta();
                    out.push_str(&format!(
                        "{:06}: {} bytes, {} entries, [{}..{}]\n",
                        t.id(),
                        t.file_size(),
                        meta.entry_count,
                        String::from_utf8_lossy(&meta.min_key),
                        String::from_utf8_lossy(&meta.max_key),
                    ));
                }
                out
            }
            "approximate-memory-usage" => {
                let state = self.inner.state.read().clone();
                (state.memtable.approximate_size() as u64 + self.inner.cache.usage())
                    .to_string()
            }
            _ => String::new(),
        }
    }

    /// Current engine counters.
    pub fn stats(&self) -> Stats {
        let state = self.inner.state.read().clone();
        Stats {
            writes: self.inner.stats.writes.load(Ordering::Relaxed),
            entries_written: self.inner.stats.entries_written.load(Ordering::Relaxed),
            reads: self.inner.stats.reads.load(Ordering::Relaxed),
            flushes: self.inner.stats.flushes.load(Ordering::Relaxed),
            compactions: self.inner.stats.compactions.load(Ordering::Relaxed),
            tables: state.tables.len() as u64,
            memtable_bytes: state.memtable.approximate_size() as u64,
            cache_usage: self.inner.cache.usage(),
            live_snapshots: self.inner.snapshots.len() as u64,
        }
    }

    /// The path this database was opened at.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Close the database: stop the worker, flush the memtable, and sync
    /// the WAL. Consumes the handle, so nothing can use it afterward.
    /// Outstanding iterators and snapshots keep their pinned views.
    pub fn close(self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Stop the worker first so no compaction races the final flush.
        let _ = self.compaction_tx.send(WorkerMsg::Shutdown);
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!("compaction worker panicked during shutdown");
            }
        }

        {
            let guard = self.inner.write_lock.lock();
            self.inner.flush_memtable_locked(&guard)?;
        }
        self.inner.wal.lock().sync()?;
        debug!(path = %self.inner.path.display(), "database closed");
        Ok(())
    }

    fn read_bound(&self, ropts: &ReadOptions) -> SequenceNumber {
        match &ropts.snapshot {
            Some(snapshot) => snapshot.sequence(),
            None => self.inner.last_seq.load(Ordering::SeqCst),
        }
    }
}

impl Drop for DB {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("error while closing database: {e}");
        }
    }
}

impl DbInner {
    /// Table count at which a background compaction should run. A small
    /// `max_open_files` pulls the threshold down so the engine merges
    /// before it would exceed the file cap.
    fn compaction_trigger(&self) -> usize {
        COMPACTION_TRIGGER.min(self.options.max_open_files.max(1))
    }

    /// Flush the memtable into a new table. Requires the write lock; takes
    /// the guard to prove it. Returns true when the table count reached the
    /// compaction trigger.
    fn flush_memtable_locked(&self, _write_guard: &MutexGuard<'_, ()>) -> Result<bool> {
        let state = self.state.read().clone();
        if state.memtable.is_empty() {
            return Ok(false);
        }

        let table = self
            .store
            .build_table(state.memtable.collect_entries())?
            .expect("non-empty memtable produced no table");

        let table_count;
        {
            let mut guard = self.state.write();
            let mut tables = Vec::with_capacity(guard.tables.len() + 1);
            tables.push(table);
            tables.extend(guard.tables.iter().cloned());
            table_count = tables.len();
            *guard = Arc::new(EngineState {
                memtable: Arc::new(MemTable::new(self.cmp.clone())),
                tables,
            });
        }

        // Everything the log held is now durable in the table.
        self.wal.lock().truncate()?;
        self.stats.flushes.fetch_add(1, Ordering::Relaxed);
        debug!(tables = table_count, "memtable flushed");

        Ok(table_count >= self.compaction_trigger())
    }

    /// Merge every table overlapping [begin, end] into one. Tombstone
    /// garbage collection only happens when the inputs are the entire table
    /// set — otherwise an older version of a key in an untouched table
    /// could resurface.
    fn compact(&self, begin: Option<&[u8]>, end: Option<&[u8]>) -> Result<()> {
        let _compaction_guard = self.compaction_lock.lock();

        let pinned = self.state.read().clone();
        let inputs: Vec<Arc<Table>> = pinned
            .tables
            .iter()
            .filter(|t| t.overlaps_range(begin, end))
            .cloned()
            .collect();
        if inputs.is_empty() {
            return Ok(());
        }
        let full = inputs.len() == pinned.tables.len();

        let bounds = self.snapshots.live_sequences();
        let output = self.store.merge_tables(&inputs, &bounds, full)?;

        {
            let mut guard = self.state.write();
            let mut tables = Vec::with_capacity(guard.tables.len());
            let mut replaced = false;
            for table in guard.tables.iter() {
                if inputs.iter().any(|input| Arc::ptr_eq(input, table)) {
                    // The output takes the slot of the newest input, which
                    // keeps the newest-first version order intact.
                    if !replaced {
                        if let Some(out) = &output {
                            tables.push(Arc::clone(out));
                        }
                        replaced = true;
                    }
                } else {
                    tables.push(Arc::clone(table));
                }
            }
            *guard = Arc::new(EngineState {
                memtable: guard.memtable.clone(),
                tables,
            });
        }

        // Unlink input files. Readers that pinned them keep reading through
        // their open descriptors; the space is reclaimed once they drop.
        for input in &inputs {
            if let Err(e) = self.store.remove_table_file(input) {
                warn!(id = input.id(), "failed to remove compacted table: {e}");
            }
        }

        self.stats.compactions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn compaction_worker(inner: Arc<DbInner>, rx: Receiver<WorkerMsg>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            WorkerMsg::Shutdown => break,
            WorkerMsg::Trigger => {
                let table_count = inner.state.read().tables.len();
                if table_count >= inner.compaction_trigger() {
                    if let Err(e) = inner.compact(None, None) {
                        warn!("background compaction failed: {e}");
                    }
                }
            }
        }
    }
}

// =============================================================================
// Maintenance Operations (operate on a closed database)
// =============================================================================

/// Destroy the contents of the database at `path`: every table file, the
/// WAL, and the bookkeeping files. A missing database is not an error.
/// Be very careful using this function.
pub fn destroy_database(path: impl AsRef<Path>, _options: &Options) -> Result<()> {
    let path = path.as_ref();
    if !path.is_dir() {
        return Ok(());
    }
    let _lock_file = acquire_dir_lock(path)?;

    let table_dir = path.join(SSTABLE_DIR);
    if table_dir.is_dir() {
        for entry in fs::read_dir(&table_dir)? {
            let entry_path = entry?.path();
            if TableStore::parse_table_id(&entry_path).is_some() {
                fs::remove_file(&entry_path)?;
            }
        }
        // Leaves the directory behind if something else lives in it.
        let _ = fs::remove_dir(&table_dir);
    }

    for name in [WAL_FILENAME, IDENTITY_FILENAME, LOCK_FILENAME] {
        let file = path.join(name);
        if file.is_file() {
            fs::remove_file(&file)?;
        }
    }
    let _ = fs::remove_dir(path);
    info!(path = %path.display(), "database destroyed");
    Ok(())
}

/// Attempt to resurrect as much of a database that fails to open as
/// possible.
///
/// Best-effort and lossy: the corrupt tail of the WAL is discarded, and
/// table files that cannot be opened are moved aside into `lost/` rather
/// than read around. Nothing is ever invented; only data that still
/// verifies is kept. The IDENTITY file is rewritten from `options`.
pub fn repair_database(path: impl AsRef<Path>, options: &Options) -> Result<()> {
    let path = path.as_ref();
    if !path.is_dir() {
        return Err(MeridianError::NotFound);
    }
    let _lock_file = acquire_dir_lock(path)?;

    let cache = Arc::new(Cache::new(DEFAULT_CACHE_CAPACITY));
    let ctx = TableContext::from_options(options, cache);
    let table_dir = path.join(SSTABLE_DIR);
    let lost_dir = path.join("lost");

    // Quarantine unreadable tables.
    let mut moved = 0u64;
    if table_dir.is_dir() {
        for entry in fs::read_dir(&table_dir)? {
            let entry_path = entry?.path();
            let Some(id) = TableStore::parse_table_id(&entry_path) else {
                continue;
            };
            if let Err(e) = Table::open(&entry_path, id, ctx.clone()) {
                warn!(table = id, "moving unreadable table to lost/: {e}");
                fs::create_dir_all(&lost_dir)?;
                let target = lost_dir.join(entry_path.file_name().expect("table file name"));
                fs::rename(&entry_path, &target)?;
                moved += 1;
            }
        }
    }

    // Salvage the WAL's valid prefix into a table, then drop the log.
    let wal_path = path.join(WAL_FILENAME);
    let mut salvaged = 0u64;
    if wal_path.is_file() {
        let (records, recovery) = WalRecovery::recover(&wal_path, false)?;
        if !records.is_empty() {
            let memtable = MemTable::new(options.comparator.clone());
            for record in &records {
                let mut seq = record.first_seq;
                for op in &record.ops {
                    match op {
                        Operation::Put { key, value } => {
                            memtable.insert(seq, ValueKind::Put, key, value)
                        }
                        Operation::Delete { key } => {
                            memtable.insert(seq, ValueKind::Delete, key, &[])
                        }
                    }
                    seq += 1;
                }
            }
            salvaged = recovery.ops_recovered;
            let (store, _) = TableStore::open(&table_dir, ctx.clone())?;
            store.build_table(memtable.collect_entries())?;
        }
        fs::remove_file(&wal_path)?;
    }

    write_identity(&path.join(IDENTITY_FILENAME), options)?;
    info!(
        path = %path.display(),
        tables_quarantined = moved,
        ops_salvaged = salvaged,
        "repair complete"
    );
    Ok(())
}

// =============================================================================
// Private Helpers
// =============================================================================

fn acquire_dir_lock(path: &Path) -> Result<File> {
    let lock_path = path.join(LOCK_FILENAME);
    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&lock_path)?;
    match lock_file.try_lock() {
        Ok(()) => Ok(lock_file),
        Err(TryLockError::WouldBlock) => Err(MeridianError::Io(std::io::Error::new(
            std::io::ErrorKind::WouldBlock,
            format!("database at {} is locked by another process", path.display()),
        ))),
        Err(TryLockError::Error(e)) => Err(e.into()),
    }
}

fn write_identity(identity_path: &Path, options: &Options) -> Result<()> {
    let contents = format!(
        "format={}\ncomparator={}\n",
        FORMAT_VERSION,
        options.comparator.name()
    );
    fs::write(identity_path, contents)?;
    Ok(())
}

fn validate_identity(identity_path: &Path, options: &Options) -> Result<()> {
    let contents = fs::read_to_string(identity_path)
        .map_err(|e| MeridianError::Corruption(format!("unreadable IDENTITY file: {e}")))?;

    let mut format = None;
    let mut comparator = None;
    for line in contents.lines() {
        if let Some(v) = line.strip_prefix("format=") {
            format = v.parse::<u32>().ok();
        } else if let Some(v) = line.strip_prefix("comparator=") {
            comparator = Some(v.to_string());
        }
    }

    match format {
        Some(FORMAT_VERSION) => {}
        Some(other) => {
            return Err(MeridianError::InvalidConfig(format!(
                "database format {other} is not supported (expected {FORMAT_VERSION})"
            )))
        }
        None => {
            return Err(MeridianError::Corruption(
                "IDENTITY file missing format line".to_string(),
            ))
        }
    }

    match comparator {
        Some(name) if name == options.comparator.name() => Ok(()),
        Some(name) => Err(MeridianError::InvalidConfig(format!(
            "comparator mismatch: database was created with '{name}', \
             options provide '{}'",
            options.comparator.name()
        ))),
        None => Err(MeridianError::Corruption(
            "IDENTITY file missing comparator line".to_string(),
        )),
    }
}
