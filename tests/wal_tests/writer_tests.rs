//! Tests for WAL Writer
//!
//! These tests verify:
//! - Appending records and LSN sequencing
//! - Positions and file rolling
//! - Sync strategies (EveryWrite, EveryNRecords)
//! - Truncation by position

use cellstore::cell::Cell;
use cellstore::config::WalSyncStrategy;
use cellstore::wal::{WalWriter, WalReplay};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, std::path::PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_dir = temp_dir.path().join("wal");
    (temp_dir, wal_dir)
}

fn cells(n: u64) -> Vec<Cell> {
    (0..n)
        .map(|i| Cell::put(format!("row{:03}", i), "f", "q", i + 1, "v"))
        .collect()
}

// =============================================================================
// Basic Writing Tests
// =============================================================================

#[test]
fn test_append_single_record() {
    let (_temp, wal_dir) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_dir, WalSyncStrategy::EveryWrite, 1).unwrap();
    let position = writer.append(&cells(1)).unwrap();

    assert_eq!(position.file_seq, 1);
    assert_eq!(position.offset, 0);
    assert_eq!(writer.current_lsn(), 2);
}

#[test]
fn test_append_advances_position() {
    let (_temp, wal_dir) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_dir, WalSyncStrategy::EveryWrite, 1).unwrap();
    let first = writer.append(&cells(1)).unwrap();
    let second = writer.append(&cells(1)).unwrap();

    assert!(second > first);
    assert_eq!(second.file_seq, first.file_seq);
    assert!(second.offset > 0);
    assert_eq!(writer.current_lsn(), 3);
}

#[test]
fn test_roll_starts_next_file() {
    let (_temp, wal_dir) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_dir, WalSyncStrategy::EveryWrite, 1).unwrap();
    writer.append(&cells(2)).unwrap();

    let position = writer.roll().unwrap();
    assert_eq!(position.file_seq, 2);
    assert_eq!(position.offset, 0);

    writer.append(&cells(1)).unwrap();
    assert!(wal_dir.join("wal_000001.log").exists());
    assert!(wal_dir.join("wal_000002.log").exists());
}

#[test]
fn test_open_skips_past_existing_files() {
    let (_temp, wal_dir) = setup_temp_wal();

    {
        let mut writer = WalWriter::open(&wal_dir, WalSyncStrategy::EveryWrite, 1).unwrap();
        writer.append(&cells(1)).unwrap();
    }

    // A reopened writer never appends to a file that may have a torn tail
    let writer = WalWriter::open(&wal_dir, WalSyncStrategy::EveryWrite, 2).unwrap();
    assert_eq!(writer.position().file_seq, 2);
}

// =============================================================================
// Sync Strategy Tests
// =============================================================================

#[test]
fn test_sync_every_write() {
    let (_temp, wal_dir) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_dir, WalSyncStrategy::EveryWrite, 1).unwrap();

    writer.append(&cells(1)).unwrap();
    assert_eq!(writer.unsynced_count(), 0); // Reset after sync

    writer.append(&cells(1)).unwrap();
    assert_eq!(writer.unsynced_count(), 0);
}

#[test]
fn test_sync_every_n_records() {
    let (_temp, wal_dir) = setup_temp_wal();

    let mut writer =
        WalWriter::open(&wal_dir, WalSyncStrategy::EveryNRecords { count: 3 }, 1).unwrap();

    writer.append(&cells(1)).unwrap();
    writer.append(&cells(1)).unwrap();
    assert_eq!(writer.unsynced_count(), 2);

    writer.append(&cells(1)).unwrap();
    assert_eq!(writer.unsynced_count(), 0); // Third append triggered fsync
}

#[test]
fn test_explicit_sync_resets_counter() {
    let (_temp, wal_dir) = setup_temp_wal();

    let mut writer =
        WalWriter::open(&wal_dir, WalSyncStrategy::EveryNRecords { count: 100 }, 1).unwrap();

    writer.append(&cells(1)).unwrap();
    assert_eq!(writer.unsynced_count(), 1);

    writer.sync().unwrap();
    assert_eq!(writer.unsynced_count(), 0);
}

// =============================================================================
// Truncation Tests
// =============================================================================

#[test]
fn test_truncate_before_drops_older_files() {
    let (_temp, wal_dir) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_dir, WalSyncStrategy::EveryWrite, 1).unwrap();
    writer.append(&cells(2)).unwrap();
    let position = writer.roll().unwrap();
    writer.append(&cells(1)).unwrap();

    writer.truncate_before(position).unwrap();

    assert!(!wal_dir.join("wal_000001.log").exists());
    assert!(wal_dir.join("wal_000002.log").exists());

    // The surviving file still replays
    let mut replay = WalReplay::open(&wal_dir).unwrap();
    let record = replay.next_record().unwrap().unwrap();
    assert_eq!(record.cells.len(), 1);
    assert!(replay.next_record().unwrap().is_none());
}

#[test]
fn test_truncate_before_own_position_keeps_current_file() {
    let (_temp, wal_dir) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_dir, WalSyncStrategy::EveryWrite, 1).unwrap();
    writer.append(&cells(1)).unwrap();

    let position = writer.position();
    writer.truncate_before(position).unwrap();

    assert!(wal_dir.join("wal_000001.log").exists());
}
