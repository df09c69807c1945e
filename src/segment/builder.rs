//! Segment Builder
//!
//! Writes a pre-sorted cell sequence to a new segment file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use bytes::Bytes;

use crate::cell::{encode_cell, encode_key_into, encoded_key_len, Cell, CellKey};
use crate::error::{Result, StoreError};

use super::{SegmentMeta, HEADER_SIZE, MAGIC, VERSION};

/// Builder for creating new segments from sorted cells
pub struct SegmentBuilder {
    /// Output file path
    path: std::path::PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    /// Number of cells written
    cell_count: u64,
    /// Current write position (for index entries)
    current_offset: u64,
    /// Sparse index: cell key → file offset, one per `index_interval` cells
    index: Vec<(CellKey, u64)>,
    /// One index entry per this many cells
    index_interval: usize,
    /// Previous appended key, for order enforcement
    last_key: Option<CellKey>,
    /// Track min/max rows for the meta block
    min_row: Option<Bytes>,
    max_row: Option<Bytes>,
    /// Running CRC hasher for the data section
    data_hasher: crc32fast::Hasher,
}

impl SegmentBuilder {
    /// Create a new segment builder
    ///
    /// Writes the header immediately; call `append()` in strict cell
    /// order, then `finish()` to write meta, index, and footer.
    pub fn create(path: &Path, index_interval: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_be_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            cell_count: 0,
            current_offset: HEADER_SIZE,
            index: Vec::new(),
            index_interval: index_interval.max(1),
            last_key: None,
            min_row: None,
            max_row: None,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Append a cell (must be called in strictly ascending cell order)
    pub fn append(&mut self, cell: &Cell) -> Result<()> {
        if let Some(last) = &self.last_key {
            if *last >= cell.key {
                return Err(StoreError::InternalInconsistency(format!(
                    "segment build out of order: {:?} after {:?}",
                    cell.key, last
                )));
            }
        }

        if self.cell_count % self.index_interval as u64 == 0 {
            self.index.push((cell.key.clone(), self.current_offset));
        }

        if self.min_row.is_none() {
            self.min_row = Some(cell.key.row.clone());
        }
        self.max_row = Some(cell.key.row.clone());

        let encoded = encode_cell(cell)?;
        self.writer.write_all(&encoded)?;
        self.data_hasher.update(&encoded);

        self.current_offset += encoded.len() as u64;
        self.cell_count += 1;
        self.last_key = Some(cell.key.clone());

        Ok(())
    }

    /// Finish building: write meta block, index block, footer; fsync
    pub fn finish(mut self) -> Result<SegmentMeta> {
        if self.cell_count == 0 {
            return Err(StoreError::InternalInconsistency(
                "refusing to build an empty segment".to_string(),
            ));
        }

        let min_row = self.min_row.take().unwrap_or_default();
        let max_row = self.max_row.take().unwrap_or_default();

        // Meta block: min/max row
        let meta_offset = self.current_offset;
        self.writer.write_all(&(min_row.len() as u16).to_be_bytes())?;
        self.writer.write_all(&min_row)?;
        self.writer.write_all(&(max_row.len() as u16).to_be_bytes())?;
        self.writer.write_all(&max_row)?;
        let index_offset = meta_offset + 4 + min_row.len() as u64 + max_row.len() as u64;

        // Index block: [key_len u32][offset u64][encoded key]
        for (key, offset) in &self.index {
            let mut encoded = Vec::with_capacity(encoded_key_len(key));
            encode_key_into(key, &mut encoded);
            self.writer.write_all(&(encoded.len() as u32).to_be_bytes())?;
            self.writer.write_all(&offset.to_be_bytes())?;
            self.writer.write_all(&encoded)?;
        }

        // Footer
        let data_crc = self.data_hasher.finalize();
        self.writer.write_all(&meta_offset.to_be_bytes())?;
        self.writer.write_all(&index_offset.to_be_bytes())?;
        self.writer.write_all(&self.cell_count.to_be_bytes())?;
        self.writer.write_all(&data_crc.to_be_bytes())?;
        self.writer.write_all(MAGIC)?;

        self.writer.flush()?;
        let file = self.writer.into_inner().map_err(|e| {
            StoreError::InternalInconsistency(format!("segment writer flush failed: {}", e))
        })?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();

        Ok(SegmentMeta {
            path: self.path,
            cell_count: self.cell_count,
            min_row,
            max_row,
            file_size,
        })
    }

    /// Cells appended so far
    pub fn cell_count(&self) -> u64 {
        self.cell_count
    }

    /// Bytes of cell data written so far
    pub fn data_size(&self) -> u64 {
        self.current_offset - HEADER_SIZE
    }
}
