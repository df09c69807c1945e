//! Tests for Region scans
//!
//! These tests verify:
//! - Row-range bounds (inclusive start, exclusive end)
//! - Row grouping of the lazy scanner
//! - Scans merging memtable and segments
//! - Snapshot isolation from concurrent writes
//! - Restarting a scan from a row boundary

use cellstore::{Config, Mutation, ScanSpec, Store, WalSyncStrategy};
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

fn scan_rows(region: &cellstore::Region, spec: ScanSpec) -> Vec<String> {
    region
        .scan(spec)
        .unwrap()
        .map(|r| String::from_utf8(r.unwrap().row.to_vec()).unwrap())
        .collect()
}

// =============================================================================
// Bound Tests
// =============================================================================

#[test]
fn test_scan_upper_bound_is_exclusive() {
    let (_temp, store) = setup_temp_store();
    let region = store.open_region("t").unwrap();

    region.put("r1", "f", "q", "1").unwrap();
    region.put("r2", "f", "q", "2").unwrap();
    region.put("r3", "f", "q", "3").unwrap();

    // scan(r1, r3) returns r1 and r2 only: the upper bound is exclusive
    let rows = scan_rows(&region, ScanSpec::range("r1", "r3"));
    assert_eq!(rows, vec!["r1", "r2"]);
}

#[test]
fn test_scan_unbounded_returns_all_rows() {
    let (_temp, store) = setup_temp_store();
    let region = store.open_region("t").unwrap();

    for row in ["a", "b", "c"] {
        region.put(row, "f", "q", "v").unwrap();
    }

    let rows = scan_rows(&region, ScanSpec::all());
    assert_eq!(rows, vec!["a", "b", "c"]);
}

#[test]
fn test_scan_restarts_from_row_boundary() {
    let (_temp, store) = setup_temp_store();
    let region = store.open_region("t").unwrap();

    for row in ["r1", "r2", "r3", "r4"] {
        region.put(row, "f", "q", "v").unwrap();
    }

    // Abandon a scan partway through, then resume from the next row
    let mut scanner = region.scan(ScanSpec::all()).unwrap();
    let first = scanner.next().unwrap().unwrap();
    assert_eq!(first.row.as_ref(), b"r1");
    drop(scanner);

    let resumed = scan_rows(
        &region,
        ScanSpec {
            bounds: cellstore::RowBounds {
                start: Some("r2".into()),
                end: None,
            },
            ..ScanSpec::all()
        },
    );
    assert_eq!(resumed, vec!["r2", "r3", "r4"]);
}

// =============================================================================
// Row Grouping Tests
// =============================================================================

#[test]
fn test_scan_groups_cells_by_row() {
    let (_temp, store) = setup_temp_store();
    let region = store.open_region("t").unwrap();

    region
        .apply(Mutation::new("r1").put("f", "a", "1").put("f", "b", "2"))
        .unwrap();
    region.put("r2", "f", "a", "3").unwrap();

    let results: Vec<_> = region
        .scan(ScanSpec::all())
        .unwrap()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].row.as_ref(), b"r1");
    assert_eq!(results[0].cells.len(), 2);
    assert_eq!(results[1].row.as_ref(), b"r2");
    assert_eq!(results[1].cells.len(), 1);
}

#[test]
fn test_scan_with_family_filter() {
    let (_temp, store) = setup_temp_store();
    let region = store.open_region("t").unwrap();

    region.put("r1", "cf1", "a", "1").unwrap();
    region.put("r1", "cf2", "a", "2").unwrap();
    region.put("r2", "cf2", "a", "3").unwrap();

    let results: Vec<_> = region
        .scan(ScanSpec::all().with_family("cf2"))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(results.len(), 2);
    for row in &results {
        assert!(row.cells.iter().all(|c| c.family().as_ref() == b"cf2"));
    }
}

#[test]
fn test_scan_skips_fully_deleted_rows() {
    let (_temp, store) = setup_temp_store();
    let region = store.open_region("t").unwrap();

    region.put("r1", "f", "q", "1").unwrap();
    region.put("r2", "f", "q", "2").unwrap();
    region.delete_row("r2").unwrap();
    region.put("r3", "f", "q", "3").unwrap();

    let rows = scan_rows(&region, ScanSpec::all());
    assert_eq!(rows, vec!["r1", "r3"]);
}

// =============================================================================
// Merge Tests
// =============================================================================

#[test]
fn test_scan_merges_segments_and_memtable() {
    let (_temp, store) = setup_temp_store();
    let region = store.open_region("t").unwrap();

    region.put("r1", "f", "q", "from-segment").unwrap();
    region.flush().unwrap();
    region.put("r3", "f", "q", "from-segment-2").unwrap();
    region.flush().unwrap();
    region.put("r2", "f", "q", "from-memtable").unwrap();

    let rows = scan_rows(&region, ScanSpec::all());
    assert_eq!(rows, vec!["r1", "r2", "r3"]);
}

#[test]
fn test_scan_newest_version_across_sources() {
    let (_temp, store) = setup_temp_store();
    let region = store.open_region("t").unwrap();

    region.put_at("r", "f", "q", "v1", 1).unwrap();
    region.flush().unwrap();
    region.put_at("r", "f", "q", "v2", 2).unwrap();
    region.flush().unwrap();
    region.put_at("r", "f", "q", "v3", 3).unwrap();

    let results: Vec<_> = region
        .scan(ScanSpec::all())
        .unwrap()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].cells.len(), 1);
    assert_eq!(results[0].cells[0].value.as_ref(), b"v3");
}

// =============================================================================
// Snapshot Tests
// =============================================================================

#[test]
fn test_scanner_is_isolated_from_later_writes() {
    let (_temp, store) = setup_temp_store();
    let region = store.open_region("t").unwrap();

    region.put("r1", "f", "q", "1").unwrap();
    region.put("r2", "f", "q", "2").unwrap();

    let scanner = region.scan(ScanSpec::all()).unwrap();

    // Writes after the scanner was created are invisible to it
    region.put("r0", "f", "q", "0").unwrap();
    region.put("r9", "f", "q", "9").unwrap();

    let rows: Vec<_> = scanner
        .map(|r| String::from_utf8(r.unwrap().row.to_vec()).unwrap())
        .collect();
    assert_eq!(rows, vec!["r1", "r2"]);

    let rows_now = scan_rows(&region, ScanSpec::all());
    assert_eq!(rows_now, vec!["r0", "r1", "r2", "r9"]);
}

#[test]
fn test_scanner_survives_concurrent_flush() {
    let (_temp, store) = setup_temp_store();
    let region = store.open_region("t").unwrap();

    region.put("r1", "f", "q", "1").unwrap();
    region.put("r2", "f", "q", "2").unwrap();

    let scanner = region.scan(ScanSpec::all()).unwrap();
    region.flush().unwrap();

    let rows: Vec<_> = scanner
        .map(|r| String::from_utf8(r.unwrap().row.to_vec()).unwrap())
        .collect();
    assert_eq!(rows, vec!["r1", "r2"]);
}
