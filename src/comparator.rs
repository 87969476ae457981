//! Key Comparator
//!
//! A pluggable total order over user keys. The active comparator defines all
//! ordering the engine uses: memtable order, table block order, iteration
//! order, and range semantics.
//!
//! The comparator's `name` is persisted when a database is created and
//! validated on every reopen, so data written under one order can never be
//! read back under another.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Total order over opaque user keys.
///
/// Implementations must be consistent (a total order) and cheap: `compare`
/// sits on every read and write path.
pub trait Comparator: Send + Sync {
    /// Three-way comparison of two user keys.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Stable identifier persisted with the database. Change the name
    /// whenever the order changes in an incompatible way.
    fn name(&self) -> &str;
}

impl fmt::Debug for dyn Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Comparator({})", self.name())
    }
}

/// Default comparator: unsigned lexicographic byte order.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn name(&self) -> &str {
        "meridiankv.BytewiseComparator"
    }
}

/// Shared handle to the active comparator.
pub type ComparatorRef = Arc<dyn Comparator>;

/// The bytewise comparator as a shared handle.
pub fn bytewise() -> ComparatorRef {
    Arc::new(BytewiseComparator)
}
