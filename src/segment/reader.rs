//! Segment Reader
//!
//! Opens segment files, keeps the sparse index in memory, and hands out
//! scanners. A `Segment` is shared behind `Arc`: read snapshots and
//! in-flight scans hold clones, and a retired segment's file is deleted
//! only when the last clone drops.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::cell::{decode_key, CellKey, RowBounds};
use crate::error::{Result, StoreError};

use super::scanner::SegmentScanner;
use super::{FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// An immutable on-disk sorted run of cells
#[derive(Debug)]
pub struct Segment {
    /// Monotonic segment ID (larger = newer)
    id: u64,
    /// Path to the backing file
    path: PathBuf,
    /// Number of cells
    cell_count: u64,
    /// Smallest/largest row keys, from the meta block
    min_row: Bytes,
    max_row: Bytes,
    /// Sparse index: ascending (key, data offset) pairs
    index: Vec<(CellKey, u64)>,
    /// End of the data block (= meta block offset)
    data_end: u64,
    /// Set when compaction supersedes this segment; the file is removed
    /// once the last reference drops
    retired: AtomicBool,
}

impl Segment {
    /// Open a segment file, loading footer, meta, and sparse index
    pub fn open(id: u64, path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(StoreError::CorruptRecord(format!(
                "segment too small: {} bytes in {}",
                file_size,
                path.display()
            )));
        }

        // Header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        if &header[0..4] != MAGIC {
            return Err(StoreError::CorruptRecord(format!(
                "invalid segment magic in {}",
                path.display()
            )));
        }
        let version = u16::from_be_bytes(header[4..6].try_into().unwrap());
        if version != VERSION {
            return Err(StoreError::CorruptRecord(format!(
                "unsupported segment version {} in {}",
                version,
                path.display()
            )));
        }

        // Footer
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;
        if &footer[28..32] != MAGIC {
            return Err(StoreError::CorruptRecord(format!(
                "invalid segment footer magic in {}",
                path.display()
            )));
        }
        let meta_offset = u64::from_be_bytes(footer[0..8].try_into().unwrap());
        let index_offset = u64::from_be_bytes(footer[8..16].try_into().unwrap());
        let cell_count = u64::from_be_bytes(footer[16..24].try_into().unwrap());
        let _data_crc = u32::from_be_bytes(footer[24..28].try_into().unwrap());
        // Data CRC is verified by scans as cells decode; a full-file
        // verification pass on open would double every open's I/O.

        if meta_offset < HEADER_SIZE
            || index_offset < meta_offset
            || index_offset > file_size - FOOTER_SIZE
        {
            return Err(StoreError::CorruptRecord(format!(
                "segment footer offsets out of range in {}",
                path.display()
            )));
        }

        // Meta block: min/max row
        file.seek(SeekFrom::Start(meta_offset))?;
        let meta_len = (index_offset - meta_offset) as usize;
        let mut meta = vec![0u8; meta_len];
        file.read_exact(&mut meta)?;
        let (min_row, consumed) = read_row(&meta, path)?;
        let (max_row, _) = read_row(&meta[consumed..], path)?;

        // Index block
        file.seek(SeekFrom::Start(index_offset))?;
        let index_len = (file_size - FOOTER_SIZE - index_offset) as usize;
        let mut index_data = vec![0u8; index_len];
        file.read_exact(&mut index_data)?;

        let mut index = Vec::new();
        let mut pos = 0;
        while pos < index_data.len() {
            if pos + 12 > index_data.len() {
                return Err(StoreError::CorruptRecord(format!(
                    "truncated segment index in {}",
                    path.display()
                )));
            }
            let key_len =
                u32::from_be_bytes(index_data[pos..pos + 4].try_into().unwrap()) as usize;
            let offset = u64::from_be_bytes(index_data[pos + 4..pos + 12].try_into().unwrap());
            pos += 12;
            if pos + key_len > index_data.len() {
                return Err(StoreError::CorruptRecord(format!(
                    "truncated segment index entry in {}",
                    path.display()
                )));
            }
            let (key, _) = decode_key(&index_data[pos..pos + key_len])?;
            pos += key_len;
            index.push((key, offset));
        }

        debug!(
            id,
            cell_count,
            index_entries = index.len(),
            path = %path.display(),
            "opened segment"
        );

        Ok(Self {
            id,
            path: path.to_path_buf(),
            cell_count,
            min_row,
            max_row,
            index,
            data_end: meta_offset,
            retired: AtomicBool::new(false),
        })
    }

    /// Open a scanner over the cells within `bounds`
    ///
    /// Each scanner opens its own file handle, so concurrent scans of the
    /// same segment never contend.
    pub fn scan(&self, bounds: &RowBounds) -> Result<SegmentScanner> {
        let start_offset = match &bounds.start {
            Some(row) => self.seek_offset(&CellKey::row_floor(row.clone())),
            None => HEADER_SIZE,
        };
        SegmentScanner::open(&self.path, start_offset, self.data_end, bounds.clone())
    }

    /// Greatest indexed offset whose key is ≤ `target`, for seek-to-key
    fn seek_offset(&self, target: &CellKey) -> u64 {
        // partition_point: first index entry with key > target
        let idx = self.index.partition_point(|(key, _)| key <= target);
        if idx == 0 {
            HEADER_SIZE
        } else {
            self.index[idx - 1].1
        }
    }

    /// Mark this segment superseded; its file is deleted once the last
    /// `Arc` reference is gone
    pub fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cell_count(&self) -> u64 {
        self.cell_count
    }

    pub fn min_row(&self) -> &Bytes {
        &self.min_row
    }

    pub fn max_row(&self) -> &Bytes {
        &self.max_row
    }

    /// Whether any row in `bounds` could live in this segment
    pub fn overlaps(&self, bounds: &RowBounds) -> bool {
        if let Some(start) = &bounds.start {
            if self.max_row < *start {
                return false;
            }
        }
        if let Some(end) = &bounds.end {
            if self.min_row >= *end {
                return false;
            }
        }
        true
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        if self.retired.load(Ordering::Acquire) {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(id = self.id, path = %self.path.display(), error = %e,
                    "failed to remove retired segment file");
            } else {
                debug!(id = self.id, "removed retired segment file");
            }
        }
    }
}

/// Read a length-prefixed row from a meta block slice
fn read_row(bytes: &[u8], path: &Path) -> Result<(Bytes, usize)> {
    if bytes.len() < 2 {
        return Err(StoreError::CorruptRecord(format!(
            "truncated segment meta block in {}",
            path.display()
        )));
    }
    let len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    if bytes.len() < 2 + len {
        return Err(StoreError::CorruptRecord(format!(
            "truncated segment meta row in {}",
            path.display()
        )));
    }
    Ok((Bytes::copy_from_slice(&bytes[2..2 + len]), 2 + len))
}
