//! Configuration for MeridianKV
//!
//! `Options` is the immutable-at-open configuration bundle; `ReadOptions` and
//! `WriteOptions` parameterize individual reads and writes.

use std::sync::Arc;

use crate::cache::Cache;
use crate::comparator::{self, ComparatorRef};
use crate::filter::FilterPolicyRef;
use crate::snapshot::Snapshot;

/// Per-block compression choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Store blocks verbatim.
    None,
    /// Snappy-compress each block; blocks that do not shrink are stored raw.
    Snappy,
}

/// Options controlling a database instance, consumed at open time.
#[derive(Clone)]
pub struct Options {
    // -------------------------------------------------------------------------
    // Open Behavior
    // -------------------------------------------------------------------------
    /// Create the database if it does not exist. Default: false.
    pub create_if_missing: bool,

    /// Fail `open` if the database already exists. Default: false.
    pub error_if_exists: bool,

    /// Verify checksums aggressively and treat any integrity problem as an
    /// error instead of working around it. Default: false.
    pub paranoid_checks: bool,

    // -------------------------------------------------------------------------
    // Write Path
    // -------------------------------------------------------------------------
    /// Bytes of user data buffered in the memtable before a flush to a new
    /// table file. Default: 4 MiB.
    pub write_buffer_size: usize,

    // -------------------------------------------------------------------------
    // Read Path
    // -------------------------------------------------------------------------
    /// Upper bound on concurrently open table files. The engine compacts
    /// early when the table count would exceed it. Default: 1000.
    pub max_open_files: usize,

    /// Target uncompressed size of a table data block. Default: 4 KiB.
    pub block_size: usize,

    /// Block cache shared by reads. `None` makes the engine create a private
    /// 8 MiB LRU cache at open.
    pub block_cache: Option<Arc<Cache>>,

    /// Filter policy consulted before table lookups. `None` disables
    /// filtering; `BloomFilterPolicy::shared(10)` is the usual choice.
    pub filter_policy: Option<FilterPolicyRef>,

    // -------------------------------------------------------------------------
    // Data Model
    // -------------------------------------------------------------------------
    /// Total order over user keys. Its `name()` is persisted at create time
    /// and must match on every reopen.
    pub comparator: ComparatorRef,

    /// Compression applied to table blocks. Default: Snappy.
    pub compression: Compression,
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("create_if_missing", &self.create_if_missing)
            .field("error_if_exists", &self.error_if_exists)
            .field("paranoid_checks", &self.paranoid_checks)
            .field("write_buffer_size", &self.write_buffer_size)
            .field("max_open_files", &self.max_open_files)
            .field("block_size", &self.block_size)
            .field("compression", &self.compression)
            .field("comparator", &self.comparator.name())
            .finish()
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: false,
            error_if_exists: false,
            paranoid_checks: false,
            write_buffer_size: 4 * 1024 * 1024,
            max_open_files: 1000,
            block_size: 4 * 1024,
            block_cache: None,
            filter_policy: None,
            comparator: comparator::bytewise(),
            compression: Compression::Snappy,
        }
    }
}

impl Options {
    /// Create a new options builder.
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }
}

/// Builder for Options
#[derive(Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Create the database if missing.
    pub fn create_if_missing(mut self, yes: bool) -> Self {
        self.options.create_if_missing = yes;
        self
    }

    /// Fail open when the database already exists.
    pub fn error_if_exists(mut self, yes: bool) -> Self {
        self.options.error_if_exists = yes;
        self
    }

    /// Enable aggressive integrity checking.
    pub fn paranoid_checks(mut self, yes: bool) -> Self {
        self.options.paranoid_checks = yes;
        self
    }

    /// Set the memtable flush threshold (in bytes).
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.options.write_buffer_size = size;
        self
    }

    /// Set the cap on concurrently open table files.
    pub fn max_open_files(mut self, n: usize) -> Self {
        self.options.max_open_files = n;
        self
    }

    /// Set the target table block size (in bytes).
    pub fn block_size(mut self, size: usize) -> Self {
        self.options.block_size = size;
        self
    }

    /// Share a block cache with this database.
    pub fn block_cache(mut self, cache: Arc<Cache>) -> Self {
        self.options.block_cache = Some(cache);
        self
    }

    /// Install a filter policy.
    pub fn filter_policy(mut self, policy: FilterPolicyRef) -> Self {
        self.options.filter_policy = Some(policy);
        self
    }

    /// Install a key comparator.
    pub fn comparator(mut self, cmp: ComparatorRef) -> Self {
        self.options.comparator = cmp;
        self
    }

    /// Choose block compression.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.options.compression = compression;
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}

/// Options for read operations.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Verify block checksums on every read. Default: false.
    pub verify_checksums: bool,

    /// Cache blocks read on behalf of this operation. Callers doing bulk
    /// scans may set this to false so the scan does not displace hot data.
    /// Default: true.
    pub fill_cache: bool,

    /// Read as of this snapshot instead of the latest committed state.
    pub snapshot: Option<Snapshot>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            verify_checksums: false,
            fill_cache: true,
            snapshot: None,
        }
    }
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin this read to a snapshot.
    pub fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

/// Options for write operations.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Fsync the log before the write returns. With `sync = false` a process
    /// crash loses nothing, but an OS or machine crash may lose the tail of
    /// recent writes — the same trade as `write()` vs `write()+fsync()`.
    /// Default: false.
    pub sync: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { sync: false }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a durable (fsynced) write.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }
}
