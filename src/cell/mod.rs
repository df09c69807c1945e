//! Cell Module
//!
//! The logical unit of storage: a single versioned value at a
//! (row, family, qualifier, timestamp) coordinate.
//!
//! ## Ordering
//!
//! Cells are totally ordered by:
//! 1. row (ascending)
//! 2. family (ascending)
//! 3. qualifier (ascending)
//! 4. timestamp (descending — newest version first)
//! 5. kind (tombstones before puts at the same coordinate)
//!
//! Row and family tombstones carry empty family/qualifier bytes, so they
//! sort at the head of the scope they mask. A merge over sources in this
//! order therefore always sees a tombstone before the cells it hides.

mod codec;

use std::cmp::Ordering;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use codec::{decode_cell, encode_cell, encode_cell_into, encoded_key_len, encoded_len};
pub(crate) use codec::{decode_key, encode_key_into, CELL_HEADER_SIZE};

/// Engine timestamp, milliseconds since the Unix epoch (or caller-supplied)
pub type Timestamp = u64;

/// What a cell records at its coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    /// Delete every cell in the row at/below the tombstone's timestamp
    DeleteRow,

    /// Delete every qualifier under one family at/below the timestamp
    DeleteFamily,

    /// Delete one (family, qualifier) coordinate at/below the timestamp
    DeleteColumn,

    /// A live value
    Put,
}

impl CellKind {
    /// Rank used as the final ordering tie-break: tombstones sort before
    /// puts at identical coordinates and timestamps.
    pub(crate) fn rank(self) -> u8 {
        match self {
            CellKind::DeleteRow => 0,
            CellKind::DeleteFamily => 1,
            CellKind::DeleteColumn => 2,
            CellKind::Put => 3,
        }
    }

    /// Whether this kind is a delete marker
    pub fn is_tombstone(self) -> bool {
        !matches!(self, CellKind::Put)
    }

    pub(crate) fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(CellKind::DeleteRow),
            1 => Some(CellKind::DeleteFamily),
            2 => Some(CellKind::DeleteColumn),
            3 => Some(CellKind::Put),
            _ => None,
        }
    }
}

/// The ordering key of a cell: everything except the value payload.
///
/// The memtable is keyed by `CellKey`, so re-writing the same coordinate,
/// timestamp, and kind replaces the previous value (last write wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellKey {
    pub row: Bytes,
    pub family: Bytes,
    pub qualifier: Bytes,
    pub timestamp: Timestamp,
    pub kind: CellKind,
}

impl CellKey {
    /// The smallest key of a row: every cell with this row sorts at or
    /// after it. Used as a range floor for row-bounded scans.
    pub fn row_floor(row: impl Into<Bytes>) -> Self {
        Self {
            row: row.into(),
            family: Bytes::new(),
            qualifier: Bytes::new(),
            timestamp: u64::MAX,
            kind: CellKind::DeleteRow,
        }
    }
}

impl Ord for CellKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.row
            .cmp(&other.row)
            .then_with(|| self.family.cmp(&other.family))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
            // Newest version of a coordinate sorts first
            .then_with(|| other.timestamp.cmp(&self.timestamp))
            .then_with(|| self.kind.rank().cmp(&other.kind.rank()))
    }
}

impl PartialOrd for CellKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A single versioned value (or delete marker) at a coordinate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub key: CellKey,
    /// Empty for tombstone kinds
    pub value: Bytes,
}

impl Cell {
    /// Timestamp value meaning "stamp me with the engine clock at apply time"
    pub const TS_UNSET: Timestamp = u64::MAX;

    /// Create a live value cell
    pub fn put(
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        timestamp: Timestamp,
        value: impl Into<Bytes>,
    ) -> Self {
        Self {
            key: CellKey {
                row: row.into(),
                family: family.into(),
                qualifier: qualifier.into(),
                timestamp,
                kind: CellKind::Put,
            },
            value: value.into(),
        }
    }

    /// Create a column tombstone
    pub fn delete_column(
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            key: CellKey {
                row: row.into(),
                family: family.into(),
                qualifier: qualifier.into(),
                timestamp,
                kind: CellKind::DeleteColumn,
            },
            value: Bytes::new(),
        }
    }

    /// Create a family tombstone (empty qualifier — leads the family in sort order)
    pub fn delete_family(
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            key: CellKey {
                row: row.into(),
                family: family.into(),
                qualifier: Bytes::new(),
                timestamp,
                kind: CellKind::DeleteFamily,
            },
            value: Bytes::new(),
        }
    }

    /// Create a row tombstone (empty family and qualifier — leads the row)
    pub fn delete_row(row: impl Into<Bytes>, timestamp: Timestamp) -> Self {
        Self {
            key: CellKey {
                row: row.into(),
                family: Bytes::new(),
                qualifier: Bytes::new(),
                timestamp,
                kind: CellKind::DeleteRow,
            },
            value: Bytes::new(),
        }
    }

    pub fn row(&self) -> &Bytes {
        &self.key.row
    }

    pub fn family(&self) -> &Bytes {
        &self.key.family
    }

    pub fn qualifier(&self) -> &Bytes {
        &self.key.qualifier
    }

    pub fn timestamp(&self) -> Timestamp {
        self.key.timestamp
    }

    pub fn kind(&self) -> CellKind {
        self.key.kind
    }

    pub fn is_tombstone(&self) -> bool {
        self.key.kind.is_tombstone()
    }

    /// Whether the cell's timestamp is the stamp-at-apply-time sentinel
    pub fn needs_timestamp(&self) -> bool {
        self.key.timestamp == Self::TS_UNSET
    }

    /// Approximate in-memory footprint, used for memtable budgeting
    pub fn heap_size(&self) -> usize {
        self.key.row.len()
            + self.key.family.len()
            + self.key.qualifier.len()
            + self.value.len()
            + 16 // timestamp + kind + per-entry overhead
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A half-open row range `[start, end)`; `None` means unbounded
#[derive(Debug, Clone, Default)]
pub struct RowBounds {
    pub start: Option<Bytes>,
    pub end: Option<Bytes>,
}

impl RowBounds {
    /// Unbounded range covering every row
    pub fn all() -> Self {
        Self::default()
    }

    /// Range `[start, end)`
    pub fn range(start: impl Into<Bytes>, end: impl Into<Bytes>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }

    /// Range covering exactly one row
    pub fn single_row(row: impl Into<Bytes>) -> Self {
        let row = row.into();
        let end = row_successor(&row);
        Self {
            start: Some(row),
            end: Some(end),
        }
    }

    /// Whether a row lies inside the bounds
    pub fn contains(&self, row: &[u8]) -> bool {
        if let Some(start) = &self.start {
            if row < start.as_ref() {
                return false;
            }
        }
        if let Some(end) = &self.end {
            if row >= end.as_ref() {
                return false;
            }
        }
        true
    }
}

/// Smallest byte string strictly greater than `row` (`row ++ 0x00`),
/// used as the exclusive upper bound of a single-row range.
fn row_successor(row: &[u8]) -> Bytes {
    let mut succ = Vec::with_capacity(row.len() + 1);
    succ.extend_from_slice(row);
    succ.push(0x00);
    Bytes::from(succ)
}
