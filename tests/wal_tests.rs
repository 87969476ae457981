//! Tests for the write-ahead log
//!
//! These tests verify:
//! - Record framing round-trips through writer and reader
//! - Checksums catch corruption
//! - Recovery truncates torn tails and reports what it kept
//! - End-to-end crash recovery through DB::open

use std::fs::OpenOptions;
use std::io::Write;

use meridiankv::wal::{Operation, WalRecord, WalRecovery, WalReader, WalWriter};
use meridiankv::{MeridianError, Options, ReadOptions, WriteBatch, WriteOptions, DB};
use tempfile::TempDir;

fn record(first_seq: u64, ops: Vec<Operation>) -> WalRecord {
    WalRecord { first_seq, ops }
}

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

// =============================================================================
// Framing Tests
// =============================================================================

#[test]
fn test_append_and_read_back() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wal.log");

    let mut writer = WalWriter::open(&path).unwrap();
    writer
        .append(&record(1, vec![put("a", "1"), put("b", "2")]), false)
        .unwrap();
    writer
        .append(
            &record(3, vec![Operation::Delete { key: b"a".to_vec() }]),
            true,
        )
        .unwrap();

    let mut reader = WalReader::open(&path).unwrap();
    let first = reader.next_record().unwrap().unwrap();
    assert_eq!(first.first_seq, 1);
    assert_eq!(first.ops.len(), 2);
    assert_eq!(first.last_seq(), 2);

    let second = reader.next_record().unwrap().unwrap();
    assert_eq!(second.first_seq, 3);
    assert!(matches!(second.ops[0], Operation::Delete { .. }));

    assert!(reader.next_record().unwrap().is_none());
}

#[test]
fn test_truncate_empties_log() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wal.log");

    let mut writer = WalWriter::open(&path).unwrap();
    writer.append(&record(1, vec![put("a", "1")]), false).unwrap();
    writer.truncate().unwrap();

    let mut reader = WalReader::open(&path).unwrap();
    assert!(reader.next_record().unwrap().is_none());

    // The writer is still usable after truncation.
    writer.append(&record(2, vec![put("b", "2")]), false).unwrap();
    let mut reader = WalReader::open(&path).unwrap();
    assert_eq!(reader.next_record().unwrap().unwrap().first_seq, 2);
}

#[test]
fn test_corrupt_payload_detected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wal.log");

    let mut writer = WalWriter::open(&path).unwrap();
    writer
        .append(&record(1, vec![put("key", "value")]), true)
        .unwrap();

    // Flip one byte in the middle of the record payload.
    let mut contents = std::fs::read(&path).unwrap();
    let mid = contents.len() / 2;
    contents[mid] ^= 0xff;
    std::fs::write(&path, &contents).unwrap();

    let mut reader = WalReader::open(&path).unwrap();
    assert!(matches!(
        reader.next_record(),
        Err(MeridianError::Corruption(_))
    ));
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recovery_keeps_valid_prefix_and_truncates_tail() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wal.log");

    let mut writer = WalWriter::open(&path).unwrap();
    writer.append(&record(1, vec![put("a", "1")]), false).unwrap();
    writer.append(&record(2, vec![put("b", "2")]), true).unwrap();
    drop(writer);

    // Simulate a torn write at the end.
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0xde, 0xad, 0xbe]).unwrap();
    drop(file);

    let (records, result) = WalRecovery::recover(&path, false).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(result.records_recovered, 2);
    assert_eq!(result.ops_recovered, 2);
    assert_eq!(result.last_sequence, 2);
    assert!(result.truncated);

    // After truncation the log reads cleanly end to end.
    let (records, result) = WalRecovery::recover(&path, false).unwrap();
    assert_eq!(records.len(), 2);
    assert!(!result.truncated);
}

#[test]
fn test_recovery_paranoid_refuses_corruption() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wal.log");

    let mut writer = WalWriter::open(&path).unwrap();
    writer.append(&record(1, vec![put("a", "1")]), true).unwrap();
    drop(writer);

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0xff; 3]).unwrap();
    drop(file);

    assert!(matches!(
        WalRecovery::recover(&path, true),
        Err(MeridianError::Corruption(_))
    ));
}

// =============================================================================
// End-to-End Crash Recovery
// =============================================================================

/// Builds a database directory whose WAL holds committed-but-unflushed
/// writes, the state a process crash leaves behind.
fn simulate_crash_with_pending_writes(temp_dir: &TempDir) {
    let options = Options::builder().create_if_missing(true).build();
    let db = DB::open(temp_dir.path(), options).unwrap();
    db.put(&WriteOptions::default(), b"flushed", b"old").unwrap();
    db.close().unwrap();

    // Write WAL records directly, as a crashed process would have left them.
    let mut writer = WalWriter::open(&temp_dir.path().join("wal.log")).unwrap();
    let mut batch = WriteBatch::new();
    batch.put(b"recovered", b"from-wal");
    batch.delete(b"flushed");
    writer
        .append(&WalRecord::from_batch(100, &batch), true)
        .unwrap();
}

#[test]
fn test_open_replays_wal() {
    let temp_dir = TempDir::new().unwrap();
    simulate_crash_with_pending_writes(&temp_dir);

    let db = DB::open(temp_dir.path(), Options::default()).unwrap();
    let ro = ReadOptions::default();
    assert_eq!(&db.get(&ro, b"recovered").unwrap()[..], b"from-wal");
    assert!(matches!(
        db.get(&ro, b"flushed"),
        Err(MeridianError::NotFound)
    ));
}

#[test]
fn test_open_replays_wal_with_corrupt_tail() {
    let temp_dir = TempDir::new().unwrap();
    simulate_crash_with_pending_writes(&temp_dir);

    let wal_path = temp_dir.path().join("wal.log");
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(b"garbage-tail").unwrap();
    drop(file);

    let db = DB::open(temp_dir.path(), Options::default()).unwrap();
    assert_eq!(
        &db.get(&ReadOptions::default(), b"recovered").unwrap()[..],
        b"from-wal"
    );
}
