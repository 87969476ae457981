//! Tests for the memtable
//!
//! These tests verify:
//! - Versioned lookups with sequence bounds
//! - Tombstone visibility
//! - Internal-order iteration and bidirectional cursors
//! - Concurrent reads during writes

use std::sync::Arc;
use std::thread;

use meridiankv::comparator::bytewise;
use meridiankv::iterator::InternalIterator;
use meridiankv::memtable::{MemTable, MemTableEntry};
use meridiankv::types::{ValueKind, MAX_SEQUENCE};

fn table() -> Arc<MemTable> {
    Arc::new(MemTable::new(bytewise()))
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_insert_and_get() {
    let mt = table();
    mt.insert(1, ValueKind::Put, b"key", b"value");

    match mt.get(b"key", MAX_SEQUENCE) {
        Some(MemTableEntry::Value(v)) => assert_eq!(&v[..], b"value"),
        other => panic!("unexpected lookup result: {other:?}"),
    }
    assert!(mt.get(b"missing", MAX_SEQUENCE).is_none());
}

#[test]
fn test_newest_visible_version_wins() {
    let mt = table();
    mt.insert(1, ValueKind::Put, b"k", b"v1");
    mt.insert(5, ValueKind::Put, b"k", b"v5");
    mt.insert(9, ValueKind::Put, b"k", b"v9");

    let at = |bound| match mt.get(b"k", bound) {
        Some(MemTableEntry::Value(v)) => v.to_vec(),
        other => panic!("unexpected: {other:?}"),
    };
    assert_eq!(at(MAX_SEQUENCE), b"v9");
    assert_eq!(at(7), b"v5");
    assert_eq!(at(1), b"v1");
    assert!(mt.get(b"k", 0).is_none());
}

#[test]
fn test_tombstone_is_reported_distinctly() {
    let mt = table();
    mt.insert(1, ValueKind::Put, b"k", b"v");
    mt.insert(2, ValueKind::Delete, b"k", b"");

    assert_eq!(mt.get(b"k", MAX_SEQUENCE), Some(MemTableEntry::Tombstone));
    assert_eq!(
        mt.get(b"k", 1),
        Some(MemTableEntry::Value(bytes::Bytes::from_static(b"v")))
    );
}

#[test]
fn test_size_accounting_grows() {
    let mt = table();
    assert!(mt.is_empty());
    mt.insert(1, ValueKind::Put, b"key", &[0u8; 1000]);
    assert!(mt.approximate_size() >= 1000);
    assert_eq!(mt.entry_count(), 1);
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_iteration_in_internal_order() {
    let mt = table();
    mt.insert(3, ValueKind::Put, b"b", b"b3");
    mt.insert(1, ValueKind::Put, b"a", b"a1");
    mt.insert(7, ValueKind::Put, b"b", b"b7");

    let mut it = mt.iter();
    it.seek_to_first().unwrap();

    // Key order first, then newest sequence first within a key.
    let mut seen = Vec::new();
    while it.valid() {
        let e = it.entry();
        seen.push((e.key.to_vec(), e.seq));
        it.next().unwrap();
    }
    assert_eq!(
        seen,
        vec![
            (b"a".to_vec(), 1),
            (b"b".to_vec(), 7),
            (b"b".to_vec(), 3)
        ]
    );
}

#[test]
fn test_cursor_seek_and_prev() {
    let mt = table();
    for (i, key) in ["a", "c", "e"].iter().enumerate() {
        mt.insert(i as u64 + 1, ValueKind::Put, key.as_bytes(), b"v");
    }

    let mut it = mt.iter();
    it.seek(b"c", MAX_SEQUENCE).unwrap();
    assert!(it.valid());
    assert_eq!(&it.entry().key[..], b"c");

    it.prev().unwrap();
    assert_eq!(&it.entry().key[..], b"a");

    it.prev().unwrap();
    assert!(!it.valid());

    it.seek_to_last().unwrap();
    assert_eq!(&it.entry().key[..], b"e");
}

#[test]
fn test_cursor_sees_concurrent_inserts_by_sequence() {
    let mt = table();
    mt.insert(1, ValueKind::Put, b"a", b"v");
    mt.insert(2, ValueKind::Put, b"c", b"v");

    let mut it = mt.iter();
    it.seek_to_first().unwrap();
    assert_eq!(&it.entry().key[..], b"a");

    // An insert landing mid-iteration is visible to the raw cursor; the
    // engine filters it by sequence bound one layer up.
    mt.insert(3, ValueKind::Put, b"b", b"late");
    it.next().unwrap();
    assert_eq!(&it.entry().key[..], b"b");
    assert_eq!(it.entry().seq, 3);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_readers_during_writes() {
    let mt = table();
    mt.insert(1, ValueKind::Put, b"stable", b"value");

    let writer = {
        let mt = Arc::clone(&mt);
        thread::spawn(move || {
            for i in 2..500u64 {
                mt.insert(i, ValueKind::Put, format!("k{i}").as_bytes(), b"v");
            }
        })
    };
    let reader = {
        let mt = Arc::clone(&mt);
        thread::spawn(move || {
            for _ in 0..500 {
                match mt.get(b"stable", MAX_SEQUENCE) {
                    Some(MemTableEntry::Value(v)) => assert_eq!(&v[..], b"value"),
                    other => panic!("unexpected: {other:?}"),
                }
            }
        })
    };
    writer.join().unwrap();
    reader.join().unwrap();
}
