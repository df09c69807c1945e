//! Mutations
//!
//! A mutation is an ordered batch of cells applied atomically: it is
//! persisted as a single WAL record, so either every cell lands or none
//! do. Cells built without an explicit timestamp carry
//! [`Cell::TS_UNSET`] and are stamped from the engine clock when the
//! region applies the batch.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, Timestamp};

/// An atomic batch of cells targeting a single row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    row: Bytes,
    cells: Vec<Cell>,
}

impl Mutation {
    /// Start an empty mutation for a row
    pub fn new(row: impl Into<Bytes>) -> Self {
        Self {
            row: row.into(),
            cells: Vec::new(),
        }
    }

    /// Add a value cell stamped at apply time
    pub fn put(
        self,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Self {
        self.put_at(family, qualifier, value, Cell::TS_UNSET)
    }

    /// Add a value cell with an explicit timestamp
    pub fn put_at(
        mut self,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        value: impl Into<Bytes>,
        timestamp: Timestamp,
    ) -> Self {
        self.cells.push(Cell::put(
            self.row.clone(),
            family,
            qualifier,
            timestamp,
            value,
        ));
        self
    }

    /// Add a column tombstone stamped at apply time
    pub fn delete_column(self, family: impl Into<Bytes>, qualifier: impl Into<Bytes>) -> Self {
        self.delete_column_at(family, qualifier, Cell::TS_UNSET)
    }

    /// Add a column tombstone with an explicit timestamp
    pub fn delete_column_at(
        mut self,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        timestamp: Timestamp,
    ) -> Self {
        self.cells
            .push(Cell::delete_column(self.row.clone(), family, qualifier, timestamp));
        self
    }

    /// Add a family tombstone stamped at apply time
    pub fn delete_family(self, family: impl Into<Bytes>) -> Self {
        self.delete_family_at(family, Cell::TS_UNSET)
    }

    /// Add a family tombstone with an explicit timestamp
    pub fn delete_family_at(mut self, family: impl Into<Bytes>, timestamp: Timestamp) -> Self {
        self.cells
            .push(Cell::delete_family(self.row.clone(), family, timestamp));
        self
    }

    /// Add a row tombstone stamped at apply time
    pub fn delete_row(self) -> Self {
        self.delete_row_at(Cell::TS_UNSET)
    }

    /// Add a row tombstone with an explicit timestamp
    pub fn delete_row_at(mut self, timestamp: Timestamp) -> Self {
        self.cells.push(Cell::delete_row(self.row.clone(), timestamp));
        self
    }

    pub fn row(&self) -> &Bytes {
        &self.row
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }
}
