//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::cell::{Cell, CellKey, RowBounds};
use crate::error::{Result, StoreError};

/// In-memory table of recent cells, ordered by the cell comparator
#[derive(Debug)]
pub struct MemTable {
    /// CellKey → value payload (empty for tombstones)
    data: RwLock<BTreeMap<CellKey, Bytes>>,

    /// Approximate heap footprint in bytes
    size: AtomicUsize,

    /// Set once the table is handed to the flush path; writes then fail
    frozen: AtomicBool,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
            frozen: AtomicBool::new(false),
        }
    }

    /// Insert one cell; returns the post-insert approximate byte size
    ///
    /// The caller compares the returned size against its budget to decide
    /// whether a flush is due.
    pub fn insert(&self, cell: Cell) -> Result<usize> {
        self.apply(std::slice::from_ref(&cell))
    }

    /// Insert a batch of cells under a single lock acquisition
    pub fn apply(&self, cells: &[Cell]) -> Result<usize> {
        if self.frozen.load(Ordering::Acquire) {
            return Err(StoreError::InternalInconsistency(
                "write to frozen memtable".to_string(),
            ));
        }

        let mut data = self.data.write();
        for cell in cells {
            let added = cell.heap_size();
            if let Some(old_value) = data.insert(cell.key.clone(), cell.value.clone()) {
                // Same coordinate+timestamp+kind rewritten: only the value
                // payload size changes.
                self.size.fetch_sub(old_value.len(), Ordering::Relaxed);
                self.size
                    .fetch_add(cell.value.len(), Ordering::Relaxed);
            } else {
                self.size.fetch_add(added, Ordering::Relaxed);
            }
        }
        Ok(self.size.load(Ordering::Relaxed))
    }

    /// Ordered snapshot of every cell within the row bounds
    ///
    /// Taken under a read lock; the result is consistent regardless of
    /// concurrent inserts after the call returns.
    pub fn scan(&self, bounds: &RowBounds) -> Vec<Cell> {
        if let (Some(start), Some(end)) = (&bounds.start, &bounds.end) {
            if start >= end {
                return Vec::new();
            }
        }

        let data = self.data.read();

        let start = bounds
            .start
            .as_ref()
            .map(|row| Bound::Included(CellKey::row_floor(row.clone())))
            .unwrap_or(Bound::Unbounded);
        let end = bounds
            .end
            .as_ref()
            .map(|row| Bound::Excluded(CellKey::row_floor(row.clone())))
            .unwrap_or(Bound::Unbounded);

        data.range((start, end))
            .map(|(key, value)| Cell {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }

    /// Ordered snapshot of the whole table (for flush)
    pub fn scan_all(&self) -> Vec<Cell> {
        self.scan(&RowBounds::all())
    }

    /// Mark the table read-only; subsequent writes are rejected
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    /// Whether the table has been frozen for flush
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Approximate size in bytes
    pub fn size_bytes(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Number of cells
    pub fn cell_count(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the table holds no cells
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

