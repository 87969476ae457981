//! Storage Module
//!
//! Persistent table storage: the on-disk sorted tables and the manager that
//! creates, discovers, and merges them.

pub mod sstable;

mod manager;

use std::sync::Arc;

use crate::cache::Cache;
use crate::comparator::ComparatorRef;
use crate::config::{Compression, Options};
use crate::filter::FilterPolicyRef;

pub use manager::TableStore;
pub use sstable::{Table, TableBuilder, TableIterator, TableMeta};

/// Everything a table needs to read and write itself, shared cheaply by
/// every open table and builder of a database.
#[derive(Clone)]
pub struct TableContext {
    pub cache: Arc<Cache>,
    pub cmp: ComparatorRef,
    pub filter_policy: Option<FilterPolicyRef>,
    pub compression: Compression,
    pub block_size: usize,
    pub paranoid: bool,
}

impl TableContext {
    pub fn from_options(options: &Options, cache: Arc<Cache>) -> Self {
        Self {
            cache,
            cmp: options.comparator.clone(),
            filter_policy: options.filter_policy.clone(),
            compression: options.compression,
            block_size: options.block_size,
            paranoid: options.paranoid_checks,
        }
    }
}
