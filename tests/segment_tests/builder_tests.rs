//! Tests for Segment Builder and open
//!
//! These tests verify:
//! - Building from sorted cells, reopening, metadata
//! - Order enforcement during build
//! - Corruption detection on open
//! - Retirement deletes the file only when unreferenced

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;

use cellstore::cell::{Cell, RowBounds};
use cellstore::segment::{Segment, SegmentBuilder};
use cellstore::StoreError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_segment_path() -> (TempDir, std::path::PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("segment_000001.seg");
    (temp_dir, path)
}

fn sorted_cells(n: u32) -> Vec<Cell> {
    (0..n)
        .map(|i| Cell::put(format!("row{:05}", i), "f", "q", 1, format!("val{}", i)))
        .collect()
}

fn build_segment(path: &std::path::Path, cells: &[Cell], interval: usize) {
    let mut builder = SegmentBuilder::create(path, interval).unwrap();
    for cell in cells {
        builder.append(cell).unwrap();
    }
    builder.finish().unwrap();
}

// =============================================================================
// Build & Open Tests
// =============================================================================

#[test]
fn test_build_and_reopen() {
    let (_temp, path) = setup_segment_path();
    let cells = sorted_cells(100);
    build_segment(&path, &cells, 16);

    let segment = Segment::open(1, &path).unwrap();
    assert_eq!(segment.id(), 1);
    assert_eq!(segment.cell_count(), 100);
    assert_eq!(segment.min_row().as_ref(), b"row00000");
    assert_eq!(segment.max_row().as_ref(), b"row00099");
}

#[test]
fn test_full_scan_returns_everything_in_order() {
    let (_temp, path) = setup_segment_path();
    let cells = sorted_cells(200);
    build_segment(&path, &cells, 16);

    let segment = Segment::open(1, &path).unwrap();
    let scanned: Vec<Cell> = segment
        .scan(&RowBounds::all())
        .unwrap()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(scanned, cells);
}

#[test]
fn test_build_preserves_tombstones() {
    let (_temp, path) = setup_segment_path();
    let cells = vec![
        Cell::delete_row("r1", 9),
        Cell::put("r1", "f", "q", 5, "v"),
        Cell::delete_column("r2", "f", "q", 3),
    ];
    build_segment(&path, &cells, 16);

    let segment = Segment::open(1, &path).unwrap();
    let scanned: Vec<Cell> = segment
        .scan(&RowBounds::all())
        .unwrap()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(scanned, cells);
}

#[test]
fn test_builder_metadata() {
    let (_temp, path) = setup_segment_path();
    let cells = sorted_cells(10);

    let mut builder = SegmentBuilder::create(&path, 4).unwrap();
    for cell in &cells {
        builder.append(cell).unwrap();
    }
    let meta = builder.finish().unwrap();

    assert_eq!(meta.cell_count, 10);
    assert_eq!(meta.min_row.as_ref(), b"row00000");
    assert_eq!(meta.max_row.as_ref(), b"row00009");
    assert_eq!(meta.file_size, std::fs::metadata(&path).unwrap().len());
}

// =============================================================================
// Build Validation Tests
// =============================================================================

#[test]
fn test_builder_rejects_out_of_order_append() {
    let (_temp, path) = setup_segment_path();

    let mut builder = SegmentBuilder::create(&path, 16).unwrap();
    builder.append(&Cell::put("r2", "f", "q", 1, "v")).unwrap();

    let err = builder
        .append(&Cell::put("r1", "f", "q", 1, "v"))
        .unwrap_err();
    assert!(matches!(err, StoreError::InternalInconsistency(_)));
}

#[test]
fn test_builder_rejects_duplicate_key() {
    let (_temp, path) = setup_segment_path();

    let mut builder = SegmentBuilder::create(&path, 16).unwrap();
    builder.append(&Cell::put("r", "f", "q", 1, "v")).unwrap();

    let err = builder
        .append(&Cell::put("r", "f", "q", 1, "other"))
        .unwrap_err();
    assert!(matches!(err, StoreError::InternalInconsistency(_)));
}

#[test]
fn test_builder_rejects_empty_segment() {
    let (_temp, path) = setup_segment_path();

    let builder = SegmentBuilder::create(&path, 16).unwrap();
    let err = builder.finish().unwrap_err();
    assert!(matches!(err, StoreError::InternalInconsistency(_)));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_open_rejects_bad_magic() {
    let (_temp, path) = setup_segment_path();
    build_segment(&path, &sorted_cells(5), 16);

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] = b'X';
    let mut file = OpenOptions::new().write(true).open(&path).unwrap();
    file.write_all(&bytes).unwrap();

    let err = Segment::open(1, &path).unwrap_err();
    assert!(matches!(err, StoreError::CorruptRecord(_)));
}

#[test]
fn test_open_rejects_truncated_file() {
    let (_temp, path) = setup_segment_path();
    build_segment(&path, &sorted_cells(5), 16);

    let len = std::fs::metadata(&path).unwrap().len();
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len - 10).unwrap();

    let err = Segment::open(1, &path).unwrap_err();
    assert!(matches!(err, StoreError::CorruptRecord(_)));
}

// =============================================================================
// Retirement Tests
// =============================================================================

#[test]
fn test_retired_segment_file_removed_on_last_drop() {
    let (_temp, path) = setup_segment_path();
    build_segment(&path, &sorted_cells(5), 16);

    let segment = Arc::new(Segment::open(1, &path).unwrap());
    let held = segment.clone();

    segment.retire();
    drop(segment);
    assert!(path.exists(), "file must survive while a reference is held");

    drop(held);
    assert!(!path.exists(), "file must be removed with the last reference");
}

#[test]
fn test_unretired_segment_file_survives_drop() {
    let (_temp, path) = setup_segment_path();
    build_segment(&path, &sorted_cells(5), 16);

    let segment = Segment::open(1, &path).unwrap();
    drop(segment);

    assert!(path.exists());
}
