//! Tests for Store and region lifecycle
//!
//! These tests verify:
//! - Region open/close state transitions
//! - Idempotent open_region handles
//! - Region existence and listing
//! - Concurrent access to one region

use std::sync::Arc;
use std::thread;

use cellstore::{Config, GetOptions, Store, StoreError, WalSyncStrategy};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .build();
    let store = Store::open(config).unwrap();
    (temp_dir, store)
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_open_region_is_idempotent() {
    let (_temp, store) = setup_temp_store();

    let first = store.open_region("t").unwrap();
    let second = store.open_region("t").unwrap();

    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_closed_region_rejects_operations() {
    let (_temp, store) = setup_temp_store();
    let region = store.open_region("t").unwrap();

    region.put("r", "f", "q", "v").unwrap();
    store.close_region("t").unwrap();

    let err = region.put("r", "f", "q", "w").unwrap_err();
    assert!(matches!(err, StoreError::RegionClosed(_)));
    let err = region.get("r", GetOptions::new()).unwrap_err();
    assert!(matches!(err, StoreError::RegionClosed(_)));
}

#[test]
fn test_close_flushes_pending_writes() {
    let temp_dir = TempDir::new().unwrap();

    {
        let config = Config::builder()
            .data_dir(temp_dir.path())
            .wal_sync_strategy(WalSyncStrategy::EveryWrite)
            .build();
        let store = Store::open(config).unwrap();
        let region = store.open_region("t").unwrap();
        region.put_at("r", "f", "q", "v", 3).unwrap();
        store.close().unwrap();
    }

    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .build();
    let store = Store::open(config).unwrap();
    let region = store.open_region("t").unwrap();

    // Close flushed the memtable, so the data came back from a segment
    assert!(region.segment_count() >= 1);
    let cells = region.get("r", GetOptions::new()).unwrap();
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0].value.as_ref(), b"v");
}

#[test]
fn test_region_reopens_after_close() {
    let (_temp, store) = setup_temp_store();

    let region = store.open_region("t").unwrap();
    region.put("r", "f", "q", "v").unwrap();
    store.close_region("t").unwrap();

    let region = store.open_region("t").unwrap();
    let cells = region.get("r", GetOptions::new()).unwrap();
    assert_eq!(cells.len(), 1);
}

#[test]
fn test_close_region_twice_is_harmless() {
    let (_temp, store) = setup_temp_store();

    store.open_region("t").unwrap();
    store.close_region("t").unwrap();
    store.close_region("t").unwrap();
}

// =============================================================================
// Registry Tests
// =============================================================================

#[test]
fn test_region_exists() {
    let (_temp, store) = setup_temp_store();

    assert!(!store.region_exists("t"));
    store.open_region("t").unwrap();
    assert!(store.region_exists("t"));

    // Still exists on disk after close
    store.close_region("t").unwrap();
    assert!(store.region_exists("t"));
}

#[test]
fn test_list_regions() {
    let (_temp, store) = setup_temp_store();

    store.open_region("beta").unwrap();
    store.open_region("alpha").unwrap();

    let names = store.list_regions().unwrap();
    assert_eq!(names, vec!["alpha", "beta"]);
}

#[test]
fn test_invalid_region_names_rejected() {
    let (_temp, store) = setup_temp_store();

    for name in ["", ".", "..", "a/b", "a\\b"] {
        let err = store.open_region(name).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(_)), "{:?}", name);
    }
}

#[test]
fn test_regions_are_independent() {
    let (_temp, store) = setup_temp_store();

    let users = store.open_region("users").unwrap();
    let events = store.open_region("events").unwrap();

    users.put("r", "f", "q", "from-users").unwrap();
    events.put("r", "f", "q", "from-events").unwrap();

    let cells = users.get("r", GetOptions::new()).unwrap();
    assert_eq!(cells[0].value.as_ref(), b"from-users");
    let cells = events.get("r", GetOptions::new()).unwrap();
    assert_eq!(cells[0].value.as_ref(), b"from-events");
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_and_readers() {
    let (_temp, store) = setup_temp_store();
    let region = store.open_region("t").unwrap();

    let mut writers = Vec::new();
    for w in 0..4u32 {
        let region = region.clone();
        writers.push(thread::spawn(move || {
            for i in 0..50u32 {
                region
                    .put(format!("w{}-row{:03}", w, i), "f", "q", "v")
                    .unwrap();
            }
        }));
    }

    let mut readers = Vec::new();
    for _ in 0..2 {
        let region = region.clone();
        readers.push(thread::spawn(move || {
            for _ in 0..100 {
                let _ = region.get("w0-row000", GetOptions::new()).unwrap();
            }
        }));
    }

    for handle in writers {
        handle.join().unwrap();
    }
    for handle in readers {
        handle.join().unwrap();
    }

    // All 200 writes are present
    for w in 0..4u32 {
        for i in 0..50u32 {
            let cells = region
                .get(format!("w{}-row{:03}", w, i), GetOptions::new())
                .unwrap();
            assert_eq!(cells.len(), 1);
        }
    }
}
