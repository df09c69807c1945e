//! Segment Scanner
//!
//! Sequential iteration over the cells of one segment, restricted to a
//! row range. Seeks via the sparse index (done by `Segment::scan`), then
//! decodes cells in order until the range or the data block ends.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::cell::{decode_cell, Cell, RowBounds, CELL_HEADER_SIZE};
use crate::error::{Result, StoreError};

/// Iterator over a segment's cells within row bounds, in cell order
pub struct SegmentScanner {
    reader: BufReader<File>,
    /// Current position in the file
    offset: u64,
    /// End of the data block
    data_end: u64,
    bounds: RowBounds,
    /// Set once a cell at/after the upper bound is seen
    done: bool,
}

impl SegmentScanner {
    pub(super) fn open(
        path: &Path,
        start_offset: u64,
        data_end: u64,
        bounds: RowBounds,
    ) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(start_offset))?;
        Ok(Self {
            reader,
            offset: start_offset,
            data_end,
            bounds,
            done: false,
        })
    }

    /// Decode the next cell in file order, or `None` at the data block end
    fn read_cell(&mut self) -> Result<Option<Cell>> {
        if self.offset >= self.data_end {
            return Ok(None);
        }

        let mut buf = vec![0u8; CELL_HEADER_SIZE];
        self.reader.read_exact(&mut buf)?;

        let row_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        let fam_len = buf[2] as usize;
        let qual_len = u16::from_be_bytes([buf[3], buf[4]]) as usize;
        let val_len = u32::from_be_bytes(buf[14..18].try_into().unwrap()) as usize;

        let body_len = row_len + fam_len + qual_len + val_len;
        if self.offset + (CELL_HEADER_SIZE + body_len) as u64 > self.data_end {
            return Err(StoreError::CorruptRecord(format!(
                "cell at offset {} runs past segment data block",
                self.offset
            )));
        }

        buf.resize(CELL_HEADER_SIZE + body_len, 0);
        self.reader.read_exact(&mut buf[CELL_HEADER_SIZE..])?;

        let (cell, consumed) = decode_cell(&buf)?;
        self.offset += consumed as u64;
        Ok(Some(cell))
    }

    fn next_in_bounds(&mut self) -> Result<Option<Cell>> {
        if self.done {
            return Ok(None);
        }
        loop {
            let cell = match self.read_cell()? {
                Some(cell) => cell,
                None => {
                    self.done = true;
                    return Ok(None);
                }
            };

            // The sparse seek may land before the lower bound; skip forward.
            if let Some(start) = &self.bounds.start {
                if cell.row() < start {
                    continue;
                }
            }
            // Cells are row-ordered, so the first row at/after the upper
            // bound ends the scan.
            if let Some(end) = &self.bounds.end {
                if cell.row() >= end {
                    self.done = true;
                    return Ok(None);
                }
            }
            return Ok(Some(cell));
        }
    }
}

impl Iterator for SegmentScanner {
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_in_bounds().transpose()
    }
}
