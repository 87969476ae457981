//! Tests for compaction
//!
//! These tests verify:
//! - compact_range never changes logical content
//! - Overwritten versions and tombstones are reclaimed
//! - Partial-range compaction leaves other tables alone
//! - The background trigger keeps the table count bounded

use std::time::{Duration, Instant};

use meridiankv::{MeridianError, Options, ReadOptions, WriteOptions, DB};
use tempfile::TempDir;

fn setup_temp_db() -> (TempDir, DB) {
    let temp_dir = TempDir::new().unwrap();
    let options = Options::builder().create_if_missing(true).build();
    let db = DB::open(temp_dir.path(), options).unwrap();
    (temp_dir, db)
}

fn wo() -> WriteOptions {
    WriteOptions::default()
}

fn ro() -> ReadOptions {
    ReadOptions::default()
}

fn table_count(db: &DB) -> u64 {
    db.stats().tables
}

// =============================================================================
// Logical No-op Tests
// =============================================================================

#[test]
fn test_compact_range_preserves_content() {
    let (_temp, db) = setup_temp_db();

    for i in 0..100u32 {
        db.put(&wo(), format!("key{i:03}").as_bytes(), format!("v{i}").as_bytes())
            .unwrap();
    }
    db.delete(&wo(), b"key050").unwrap();
    db.flush().unwrap();

    db.compact_range(None, None).unwrap();

    for i in 0..100u32 {
        let key = format!("key{i:03}");
        if i == 50 {
            assert!(matches!(
                db.get(&ro(), key.as_bytes()),
                Err(MeridianError::NotFound)
            ));
        } else {
            assert_eq!(&db.get(&ro(), key.as_bytes()).unwrap()[..], format!("v{i}").as_bytes());
        }
    }
}

#[test]
fn test_compact_range_on_empty_db() {
    let (_temp, db) = setup_temp_db();
    db.compact_range(None, None).unwrap();
    db.compact_range(Some(b"a"), Some(b"z")).unwrap();
}

#[test]
fn test_compaction_merges_tables() {
    let (_temp, db) = setup_temp_db();

    for round in 0..3u32 {
        for i in 0..20u32 {
            db.put(&wo(), format!("key{i:02}").as_bytes(), format!("round{round}").as_bytes())
                .unwrap();
        }
        db.flush().unwrap();
    }
    assert_eq!(table_count(&db), 3);

    db.compact_range(None, None).unwrap();
    assert_eq!(table_count(&db), 1);

    // Newest round wins everywhere.
    for i in 0..20u32 {
        let v = db.get(&ro(), format!("key{i:02}").as_bytes()).unwrap();
        assert_eq!(&v[..], b"round2");
    }
}

#[test]
fn test_compaction_reclaims_overwritten_space() {
    let (_temp, db) = setup_temp_db();

    let value = vec![0x11u8; 2048];
    for _ in 0..5 {
        for i in 0..50u32 {
            db.put(&wo(), format!("key{i:02}").as_bytes(), &value).unwrap();
        }
        db.flush().unwrap();
    }

    db.compact_range(None, None).unwrap();
    let stats = db.stats();
    assert_eq!(stats.tables, 1);
    // 250 versions collapse to 50 live ones.
    let compacted = db.property("meridiankv.sstables");
    assert!(compacted.contains("50 entries"), "{compacted}");
}

#[test]
fn test_compaction_drops_tombstones_on_full_compaction() {
    let (_temp, db) = setup_temp_db();

    db.put(&wo(), b"doomed", b"v").unwrap();
    db.flush().unwrap();
    db.delete(&wo(), b"doomed").unwrap();
    db.flush().unwrap();

    db.compact_range(None, None).unwrap();

    // Both the value and its tombstone are gone; the key never existed as
    // far as readers are concerned.
    assert!(matches!(db.get(&ro(), b"doomed"), Err(MeridianError::NotFound)));
    let listing = db.property("meridiankv.sstables");
    assert!(listing.is_empty(), "expected no tables, got: {listing}");
}

// =============================================================================
// Partial-Range Tests
// =============================================================================

#[test]
fn test_partial_range_compaction() {
    let (_temp, db) = setup_temp_db();

    for key in ["a1", "a2"] {
        db.put(&wo(), key.as_bytes(), b"left").unwrap();
    }
    db.flush().unwrap();
    for key in ["z1", "z2"] {
        db.put(&wo(), key.as_bytes(), b"right").unwrap();
    }
    db.flush().unwrap();
    assert_eq!(table_count(&db), 2);

    // Only the left table overlaps; the right one is untouched.
    db.compact_range(Some(b"a"), Some(b"b")).unwrap();
    assert_eq!(table_count(&db), 2);

    for key in ["a1", "a2"] {
        assert_eq!(&db.get(&ro(), key.as_bytes()).unwrap()[..], b"left");
    }
    for key in ["z1", "z2"] {
        assert_eq!(&db.get(&ro(), key.as_bytes()).unwrap()[..], b"right");
    }
}

// =============================================================================
// Background Trigger Tests
// =============================================================================

#[test]
fn test_background_compaction_bounds_table_count() {
    let temp_dir = TempDir::new().unwrap();
    let options = Options::builder()
        .create_if_missing(true)
        .write_buffer_size(1024) // Flush constantly
        .build();
    let db = DB::open(temp_dir.path(), options).unwrap();

    let value = vec![0x22u8; 256];
    for i in 0..200u32 {
        db.put(&wo(), format!("key{i:04}").as_bytes(), &value).unwrap();
    }

    // Give the worker a moment to drain its queue.
    let deadline = Instant::now() + Duration::from_secs(10);
    while table_count(&db) > 4 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    assert!(
        table_count(&db) <= 4,
        "background compaction never caught up: {} tables",
        table_count(&db)
    );
    assert!(db.stats().compactions > 0);

    // All data remains readable afterward.
    for i in 0..200u32 {
        let v = db.get(&ro(), format!("key{i:04}").as_bytes()).unwrap();
        assert_eq!(v.len(), 256);
    }
}
