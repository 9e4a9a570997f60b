//! Tests for WAL Recovery
//!
//! These tests verify:
//! - Recovery from a clean WAL (no corruption)
//! - Recovery from an empty or missing WAL
//! - Recovery with partial writes (truncated tail)
//! - Recovery with corrupted records (CRC mismatch)
//! - Verify mode (stats only, file untouched)

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use stratakv::config::WalSyncStrategy;
use stratakv::wal::{WalRecord, WalRecovery, WalWriter, HEADER_SIZE};
use stratakv::Entry;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

/// Write entries using WalWriter (produces a well-formed WAL)
fn write_entries_via_writer(path: &PathBuf, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite, 1).unwrap();
    for i in 0..count {
        writer
            .append(&Entry::new(format!("key{}", i), format!("value{}", i).into_bytes()))
            .unwrap();
    }
}

/// Size of one encoded frame written by `write_entries_via_writer`
fn frame_len(i: usize) -> u64 {
    let entry = Entry::new(format!("key{}", i), format!("value{}", i).into_bytes());
    (HEADER_SIZE + entry.encode().unwrap().len()) as u64
}

// =============================================================================
// Recover: Clean WAL Tests
// =============================================================================

#[test]
fn test_recover_missing_file() {
    let (_temp, wal_path) = setup_temp_wal();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert!(entries.is_empty());
    assert_eq!(result.last_lsn, 0);
    assert!(!wal_path.exists());
}

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 0);
    assert_eq!(result.entries_recovered, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_clean_log_in_order() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 5);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 5);
    assert_eq!(result.last_lsn, 5);
    assert_eq!(result.bytes_discarded, 0);
    let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["key0", "key1", "key2", "key3", "key4"]);
}

#[test]
fn test_recover_preserves_tombstones() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite, 1).unwrap();
        writer.append(&Entry::new("k", b"v".to_vec())).unwrap();
        writer.append(&Entry::tombstone("k")).unwrap();
    }

    let (entries, _) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries, vec![Entry::new("k", b"v".to_vec()), Entry::tombstone("k")]);
}

// =============================================================================
// Recover: Partial Write Tests
// =============================================================================

#[test]
fn test_recover_truncates_torn_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);

    // Simulate a crash halfway through writing a fourth record
    let torn = WalRecord::new(4, Entry::new("key3", b"value3".to_vec()))
        .encode()
        .unwrap();
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&torn[..torn.len() / 2]).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 3);
    assert!(result.was_truncated);
    assert_eq!(result.bytes_discarded, (torn.len() / 2) as u64);
    let expected_len: u64 = (0..3).map(frame_len).sum();
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), expected_len);
}

#[test]
fn test_recover_partial_header() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);

    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0xAB; 5]).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(result.bytes_discarded, 5);
    assert!(result.was_truncated);
}

#[test]
fn test_recover_then_append_continues_cleanly() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0xFF; 7]).unwrap();
    drop(file);

    let (_, result) = WalRecovery::recover(&wal_path).unwrap();
    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite, result.last_lsn + 1).unwrap();
    writer.append(&Entry::new("after", b"crash".to_vec())).unwrap();
    drop(writer);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2].key, "after");
    assert_eq!(result.last_lsn, 3);
    assert!(!result.was_truncated);
}

// =============================================================================
// Recover: Corruption Tests
// =============================================================================

#[test]
fn test_recover_stops_at_checksum_mismatch() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 3);

    // Flip a payload byte in the second record
    let mut bytes = fs::read(&wal_path).unwrap();
    let second_payload = frame_len(0) as usize + HEADER_SIZE;
    bytes[second_payload] ^= 0xFF;
    fs::write(&wal_path, &bytes).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, "key0");
    assert_eq!(result.last_lsn, 1);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), frame_len(0));
}

// =============================================================================
// Verify Tests
// =============================================================================

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries_via_writer(&wal_path, 2);
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0x01; 9]).unwrap();
    drop(file);
    let before = fs::metadata(&wal_path).unwrap().len();

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 2);
    assert_eq!(result.bytes_discarded, 9);
    assert!(!result.was_truncated);
    assert_eq!(fs::metadata(&wal_path).unwrap().len(), before);
}
