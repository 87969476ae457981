//! Tests for iterators
//!
//! These tests verify:
//! - Forward and reverse ordering over memtable + table data
//! - Seek semantics (first entry >= target)
//! - Tombstone and old-version hiding
//! - Snapshot stability: writes after creation stay invisible
//! - Direction changes mid-iteration

use meridiankv::{Options, ReadOptions, WriteOptions, DB};
use tempfile::TempDir;

fn setup_temp_db() -> (TempDir, DB) {
    let temp_dir = TempDir::new().unwrap();
    let options = Options::builder()
        .create_if_missing(true)
        .block_size(256) // Small blocks so scans cross block boundaries
        .build();
    let db = DB::open(temp_dir.path(), options).unwrap();
    (temp_dir, db)
}

fn wo() -> WriteOptions {
    WriteOptions::default()
}

fn collect_forward(db: &DB) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut it = db.iter(&ReadOptions::default());
    let mut out = Vec::new();
    it.seek_to_first();
    while it.valid() {
        out.push((it.key().to_vec(), it.value().to_vec()));
        it.next();
    }
    assert!(it.status().is_none());
    out
}

fn collect_reverse(db: &DB) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut it = db.iter(&ReadOptions::default());
    let mut out = Vec::new();
    it.seek_to_last();
    while it.valid() {
        out.push((it.key().to_vec(), it.value().to_vec()));
        it.prev();
    }
    assert!(it.status().is_none());
    out
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_forward_ordering() {
    let (_temp, db) = setup_temp_db();
    for key in ["c", "a", "b"] {
        db.put(&wo(), key.as_bytes(), key.as_bytes()).unwrap();
    }

    let keys: Vec<_> = collect_forward(&db)
        .into_iter()
        .map(|(k, _)| String::from_utf8(k).unwrap())
        .collect();
    assert_eq!(keys, ["a", "b", "c"]);

    // After the last key the iterator is exhausted, not errored.
    let mut it = db.iter(&ReadOptions::default());
    it.seek_to_first();
    it.next();
    it.next();
    it.next();
    assert!(!it.valid());
    assert!(it.status().is_none());
}

#[test]
fn test_reverse_ordering() {
    let (_temp, db) = setup_temp_db();
    for key in ["b", "c", "a"] {
        db.put(&wo(), key.as_bytes(), key.as_bytes()).unwrap();
    }

    let keys: Vec<_> = collect_reverse(&db)
        .into_iter()
        .map(|(k, _)| String::from_utf8(k).unwrap())
        .collect();
    assert_eq!(keys, ["c", "b", "a"]);
}

#[test]
fn test_ordering_across_memtable_and_tables() {
    let (_temp, db) = setup_temp_db();

    // Older data in a table, newer in the memtable, interleaved keys.
    for i in (0..50).step_by(2) {
        db.put(&wo(), format!("key{i:03}").as_bytes(), b"table").unwrap();
    }
    db.flush().unwrap();
    for i in (1..50).step_by(2) {
        db.put(&wo(), format!("key{i:03}").as_bytes(), b"mem").unwrap();
    }

    let entries = collect_forward(&db);
    assert_eq!(entries.len(), 50);
    for (i, (key, value)) in entries.iter().enumerate() {
        assert_eq!(key, format!("key{i:03}").as_bytes());
        let expected: &[u8] = if i % 2 == 0 { b"table" } else { b"mem" };
        assert_eq!(value, expected);
    }

    let reversed: Vec<_> = collect_reverse(&db);
    let mut forward = entries;
    forward.reverse();
    assert_eq!(reversed, forward);
}

#[test]
fn test_overwrites_yield_newest_value_once() {
    let (_temp, db) = setup_temp_db();
    db.put(&wo(), b"k", b"v1").unwrap();
    db.flush().unwrap();
    db.put(&wo(), b"k", b"v2").unwrap();

    let entries = collect_forward(&db);
    assert_eq!(entries, vec![(b"k".to_vec(), b"v2".to_vec())]);
    assert_eq!(collect_reverse(&db), entries);
}

#[test]
fn test_deleted_keys_are_hidden() {
    let (_temp, db) = setup_temp_db();
    for key in ["a", "b", "c"] {
        db.put(&wo(), key.as_bytes(), b"v").unwrap();
    }
    db.flush().unwrap();
    db.delete(&wo(), b"b").unwrap();

    let keys: Vec<_> = collect_forward(&db)
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"c".to_vec()]);

    let keys: Vec<_> = collect_reverse(&db)
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    assert_eq!(keys, vec![b"c".to_vec(), b"a".to_vec()]);
}

// =============================================================================
// Seek Tests
// =============================================================================

#[test]
fn test_seek_lands_on_first_key_at_or_after_target() {
    let (_temp, db) = setup_temp_db();
    for key in ["apple", "banana", "cherry"] {
        db.put(&wo(), key.as_bytes(), b"v").unwrap();
    }

    let mut it = db.iter(&ReadOptions::default());

    it.seek(b"banana");
    assert!(it.valid());
    assert_eq!(it.key(), b"banana");

    it.seek(b"bb");
    assert!(it.valid());
    assert_eq!(it.key(), b"cherry");

    it.seek(b"zebra");
    assert!(!it.valid());
}

#[test]
fn test_seek_then_walk_both_directions() {
    let (_temp, db) = setup_temp_db();
    for key in ["a", "b", "c", "d"] {
        db.put(&wo(), key.as_bytes(), b"v").unwrap();
    }

    let mut it = db.iter(&ReadOptions::default());
    it.seek(b"c");
    assert_eq!(it.key(), b"c");

    it.prev();
    assert_eq!(it.key(), b"b");

    it.next();
    assert_eq!(it.key(), b"c");

    it.next();
    assert_eq!(it.key(), b"d");

    it.next();
    assert!(!it.valid());
}

#[test]
fn test_seek_to_last_then_prev_over_tombstones() {
    let (_temp, db) = setup_temp_db();
    db.put(&wo(), b"a", b"v").unwrap();
    db.put(&wo(), b"b", b"v").unwrap();
    db.put(&wo(), b"z", b"v").unwrap();
    db.flush().unwrap();
    db.delete(&wo(), b"z").unwrap();

    let mut it = db.iter(&ReadOptions::default());
    it.seek_to_last();
    assert!(it.valid());
    assert_eq!(it.key(), b"b");
    it.prev();
    assert_eq!(it.key(), b"a");
    it.prev();
    assert!(!it.valid());
}

// =============================================================================
// Stability Tests
// =============================================================================

#[test]
fn test_iterator_does_not_see_later_writes() {
    let (_temp, db) = setup_temp_db();
    db.put(&wo(), b"a", b"v").unwrap();
    db.put(&wo(), b"c", b"v").unwrap();

    let mut it = db.iter(&ReadOptions::default());
    it.seek_to_first();
    assert_eq!(it.key(), b"a");

    // Committed after creation: invisible, even though it sorts between
    // the current position and the next key.
    db.put(&wo(), b"b", b"late").unwrap();

    it.next();
    assert_eq!(it.key(), b"c");
    it.next();
    assert!(!it.valid());
}

#[test]
fn test_iterator_does_not_see_later_deletes() {
    let (_temp, db) = setup_temp_db();
    db.put(&wo(), b"a", b"v").unwrap();
    db.put(&wo(), b"b", b"v").unwrap();

    let mut it = db.iter(&ReadOptions::default());
    it.seek_to_first();
    db.delete(&wo(), b"b").unwrap();

    it.next();
    assert!(it.valid());
    assert_eq!(it.key(), b"b");
}

#[test]
fn test_iterator_bound_to_snapshot() {
    let (_temp, db) = setup_temp_db();
    db.put(&wo(), b"k", b"old").unwrap();
    let snap = db.snapshot();
    db.put(&wo(), b"k", b"new").unwrap();
    db.put(&wo(), b"later", b"x").unwrap();

    let mut it = db.iter(&ReadOptions::default().with_snapshot(snap));
    it.seek_to_first();
    assert_eq!(it.key(), b"k");
    assert_eq!(it.value(), b"old");
    it.next();
    assert!(!it.valid());
}

#[test]
fn test_iterator_survives_flush_and_compaction() {
    let (_temp, db) = setup_temp_db();
    for i in 0..20u32 {
        db.put(&wo(), format!("key{i:02}").as_bytes(), b"v1").unwrap();
    }

    let mut it = db.iter(&ReadOptions::default());
    it.seek_to_first();

    // Rewrite everything behind the iterator's back.
    for i in 0..20u32 {
        db.put(&wo(), format!("key{i:02}").as_bytes(), b"v2").unwrap();
    }
    db.flush().unwrap();
    db.compact_range(None, None).unwrap();

    let mut count = 0;
    while it.valid() {
        assert_eq!(it.value(), b"v1");
        count += 1;
        it.next();
    }
    assert_eq!(count, 20);
    assert!(it.status().is_none());
}

// =============================================================================
// Edge Cases
// =============================================================================

#[test]
fn test_iterator_on_empty_db() {
    let (_temp, db) = setup_temp_db();
    let mut it = db.iter(&ReadOptions::default());

    it.seek_to_first();
    assert!(!it.valid());
    it.seek_to_last();
    assert!(!it.valid());
    it.seek(b"anything");
    assert!(!it.valid());
    assert!(it.status().is_none());
}

#[test]
fn test_iterator_over_many_blocks() {
    let (_temp, db) = setup_temp_db();
    let value = vec![0x77u8; 100];
    for i in 0..300u32 {
        db.put(&wo(), format!("key{i:05}").as_bytes(), &value).unwrap();
    }
    db.flush().unwrap();

    let entries = collect_forward(&db);
    assert_eq!(entries.len(), 300);
    let reversed = collect_reverse(&db);
    assert_eq!(reversed.len(), 300);
    assert_eq!(reversed[0].0, entries[299].0);
}

#[test]
#[should_panic(expected = "key() called on an unpositioned iterator")]
fn test_key_on_unpositioned_iterator_panics() {
    let (_temp, db) = setup_temp_db();
    let it = db.iter(&ReadOptions::default());
    let _ = it.key();
}
