//! Merge & Mask Read Path
//!
//! Every read merges the active memtable, any frozen memtable, and all
//! segments — newest source first — into one ordered cell stream, then
//! resolves versions and tombstones in a single streaming pass. Nothing
//! is materialized beyond one cell per source plus the row state.
//!
//! ## K-way merge
//! A min-heap keyed on (cell order, source rank) pops the globally
//! smallest cell. Source rank 0 is the active memtable, then the frozen
//! memtable, then segments newest→oldest, so when two sources carry a
//! byte-identical cell key, the newest copy wins and older copies are
//! skipped.
//!
//! ## Masking
//! Cell order puts tombstones ahead of everything they can mask (scope
//! markers carry empty family/qualifier bytes, and at equal coordinates
//! deletes sort before puts), so one forward pass suffices: remember the
//! strongest delete timestamp per scope and drop any put at or below it.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use bytes::Bytes;

use crate::cell::{Cell, CellKey, CellKind, RowBounds, Timestamp};
use crate::error::{Result, StoreError};

/// An ordered stream of cells from one source
pub type CellSource = Box<dyn Iterator<Item = Result<Cell>> + Send>;

/// What a read or rewrite wants out of the merged stream
#[derive(Debug, Clone)]
pub struct ScanSpec {
    /// Row range, upper bound exclusive
    pub bounds: RowBounds,
    /// Restrict to one family
    pub family: Option<Bytes>,
    /// Restrict to one qualifier (requires `family`)
    pub qualifier: Option<Bytes>,
    /// Live versions returned per coordinate; 0 = unlimited
    pub max_versions: u32,
    /// Inclusive `[min, max]` timestamp window
    pub time_range: Option<(Timestamp, Timestamp)>,
}

impl ScanSpec {
    /// Scan every row, newest version per coordinate
    pub fn all() -> Self {
        Self {
            bounds: RowBounds::all(),
            family: None,
            qualifier: None,
            max_versions: 1,
            time_range: None,
        }
    }

    /// Scan `[start, end)`, newest version per coordinate
    pub fn range(start: impl Into<Bytes>, end: impl Into<Bytes>) -> Self {
        Self {
            bounds: RowBounds::range(start, end),
            ..Self::all()
        }
    }

    /// Scan a single row
    pub fn single_row(row: impl Into<Bytes>) -> Self {
        Self {
            bounds: RowBounds::single_row(row),
            ..Self::all()
        }
    }

    pub fn with_family(mut self, family: impl Into<Bytes>) -> Self {
        self.family = Some(family.into());
        self
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<Bytes>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn with_max_versions(mut self, versions: u32) -> Self {
        self.max_versions = versions;
        self
    }

    pub fn with_time_range(mut self, min: Timestamp, max: Timestamp) -> Self {
        self.time_range = Some((min, max));
        self
    }
}

// =============================================================================
// K-way merge
// =============================================================================

struct HeapEntry {
    cell: Cell,
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cell.key == other.cell.key && self.source == other.source
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Cell order first; newest source (lowest rank) breaks ties so the
        // winning copy of a duplicated key pops first.
        self.cell
            .key
            .cmp(&other.cell.key)
            .then_with(|| self.source.cmp(&other.source))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Merges N ordered cell sources into one ordered stream, newest-wins
/// on byte-identical keys
pub struct MergeScanner {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    sources: Vec<CellSource>,
    last_key: Option<CellKey>,
    /// Error raised while priming a source, surfaced on the next pull
    pending_error: Option<StoreError>,
    /// A surfaced error ends the stream
    failed: bool,
}

impl MergeScanner {
    /// Build a merge over sources ordered newest first
    pub fn new(sources: Vec<CellSource>) -> Self {
        let mut scanner = Self {
            heap: BinaryHeap::with_capacity(sources.len()),
            sources,
            last_key: None,
            pending_error: None,
            failed: false,
        };
        for source in 0..scanner.sources.len() {
            scanner.prime(source);
        }
        scanner
    }

    /// Pull the next cell of `source` into the heap
    ///
    /// An error from the source is held back and surfaced on the next
    /// `next()` call, after which the stream ends.
    fn prime(&mut self, source: usize) {
        if let Some(item) = self.sources[source].next() {
            match item {
                Ok(cell) => self.heap.push(Reverse(HeapEntry { cell, source })),
                Err(e) => {
                    self.pending_error = Some(e);
                }
            }
        }
    }
}

impl Iterator for MergeScanner {
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if let Some(e) = self.pending_error.take() {
                self.failed = true;
                return Some(Err(e));
            }

            let Reverse(entry) = self.heap.pop()?;
            self.prime(entry.source);

            // Exact-duplicate key from an older source: newest already won
            if self.last_key.as_ref() == Some(&entry.cell.key) {
                continue;
            }
            self.last_key = Some(entry.cell.key.clone());
            return Some(Ok(entry.cell));
        }
    }
}

// =============================================================================
// Masking
// =============================================================================

/// Resolves tombstones, filters, and version limits over a merged stream
///
/// With `emit_tombstones` (compaction rewrites), delete markers pass
/// through while the cells they mask are still dropped; reads never see
/// tombstones.
pub struct MaskingScanner<I> {
    inner: I,
    family: Option<Bytes>,
    qualifier: Option<Bytes>,
    max_versions: u32,
    time_range: Option<(Timestamp, Timestamp)>,
    emit_tombstones: bool,

    // Scope state, reset as row/family/column boundaries pass
    current_row: Option<Bytes>,
    row_delete_ts: Option<Timestamp>,
    current_family: Option<Bytes>,
    family_delete_ts: Option<Timestamp>,
    current_column: Option<(Bytes, Bytes)>,
    column_delete_ts: Option<Timestamp>,
    versions_emitted: u32,
}

impl<I: Iterator<Item = Result<Cell>>> MaskingScanner<I> {
    /// Read-path masking: apply a scan spec, never emit tombstones
    pub fn for_read(inner: I, spec: &ScanSpec) -> Self {
        Self {
            inner,
            family: spec.family.clone(),
            qualifier: spec.qualifier.clone(),
            max_versions: spec.max_versions,
            time_range: spec.time_range,
            emit_tombstones: false,
            current_row: None,
            row_delete_ts: None,
            current_family: None,
            family_delete_ts: None,
            current_column: None,
            column_delete_ts: None,
            versions_emitted: 0,
        }
    }

    /// Compaction rewrite: drop masked cells, optionally keep the markers
    ///
    /// `max_versions = 0` disables version trimming (minor compactions
    /// must not trim — older segments outside the set may still exist).
    pub fn for_compaction(inner: I, keep_tombstones: bool, max_versions: u32) -> Self {
        Self {
            inner,
            family: None,
            qualifier: None,
            max_versions,
            time_range: None,
            emit_tombstones: keep_tombstones,
            current_row: None,
            row_delete_ts: None,
            current_family: None,
            family_delete_ts: None,
            current_column: None,
            column_delete_ts: None,
            versions_emitted: 0,
        }
    }

    fn enter_cell_scope(&mut self, cell: &Cell) {
        if self.current_row.as_ref() != Some(cell.row()) {
            self.current_row = Some(cell.row().clone());
            self.row_delete_ts = None;
            self.current_family = None;
            self.family_delete_ts = None;
            self.current_column = None;
            self.column_delete_ts = None;
        }
        if self.current_family.as_ref() != Some(cell.family()) {
            self.current_family = Some(cell.family().clone());
            self.family_delete_ts = None;
            self.current_column = None;
            self.column_delete_ts = None;
        }
        let column = (cell.family().clone(), cell.qualifier().clone());
        if self.current_column.as_ref() != Some(&column) {
            self.current_column = Some(column);
            self.column_delete_ts = None;
            self.versions_emitted = 0;
        }
    }

    /// Whether a put at `ts` is hidden by any delete scope seen so far
    fn masked(&self, ts: Timestamp) -> bool {
        let below = |marker: &Option<Timestamp>| marker.map_or(false, |m| ts <= m);
        below(&self.row_delete_ts)
            || below(&self.family_delete_ts)
            || below(&self.column_delete_ts)
    }

    fn bump_marker(slot: &mut Option<Timestamp>, ts: Timestamp) {
        *slot = Some(slot.map_or(ts, |m| m.max(ts)));
    }
}

impl<I: Iterator<Item = Result<Cell>>> Iterator for MaskingScanner<I> {
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let cell = match self.inner.next()? {
                Ok(cell) => cell,
                Err(e) => return Some(Err(e)),
            };

            self.enter_cell_scope(&cell);

            match cell.kind() {
                CellKind::DeleteRow => {
                    Self::bump_marker(&mut self.row_delete_ts, cell.timestamp());
                    if self.emit_tombstones {
                        return Some(Ok(cell));
                    }
                }
                CellKind::DeleteFamily => {
                    Self::bump_marker(&mut self.family_delete_ts, cell.timestamp());
                    if self.emit_tombstones {
                        return Some(Ok(cell));
                    }
                }
                CellKind::DeleteColumn => {
                    Self::bump_marker(&mut self.column_delete_ts, cell.timestamp());
                    if self.emit_tombstones {
                        return Some(Ok(cell));
                    }
                }
                CellKind::Put => {
                    if self.masked(cell.timestamp()) {
                        continue;
                    }
                    // Filters apply to data cells only; scope markers above
                    // must be observed regardless of family/qualifier.
                    if let Some(family) = &self.family {
                        if cell.family() != family {
                            continue;
                        }
                    }
                    if let Some(qualifier) = &self.qualifier {
                        if cell.qualifier() != qualifier {
                            continue;
                        }
                    }
                    if let Some((min, max)) = self.time_range {
                        let ts = cell.timestamp();
                        if ts < min || ts > max {
                            continue;
                        }
                    }
                    if self.max_versions > 0 && self.versions_emitted >= self.max_versions {
                        continue;
                    }
                    self.versions_emitted += 1;
                    return Some(Ok(cell));
                }
            }
        }
    }
}
