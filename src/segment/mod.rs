//! Segment Module
//!
//! Immutable, disk-resident sorted runs of cells — the on-disk half of
//! the store. Segments are created whole by flush or compaction, never
//! mutated, and deleted only after compaction supersedes them and the
//! last reader reference is gone.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Header (6 bytes)                                         │
//! │   Magic: "CFSG" (4) | Version: u16 (2)                   │
//! ├──────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                    │
//! │   Encoded cells, back to back, in cell order             │
//! ├──────────────────────────────────────────────────────────┤
//! │ Meta Block (variable)                                    │
//! │   MinRowLen: u16 | MinRow | MaxRowLen: u16 | MaxRow      │
//! ├──────────────────────────────────────────────────────────┤
//! │ Index Block (variable, sparse)                           │
//! │   [KeyLen: u32][Offset: u64][Encoded CellKey]            │
//! │   ... one entry per index_interval cells ...             │
//! ├──────────────────────────────────────────────────────────┤
//! │ Footer (32 bytes)                                        │
//! │   MetaOffset: u64 | IndexOffset: u64 | CellCount: u64    │
//! │   | DataCRC: u32 | Magic: "CFSG" (4)                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//! All integers big-endian.

mod builder;
mod reader;
mod scanner;

use std::path::{Path, PathBuf};

use bytes::Bytes;

pub use builder::SegmentBuilder;
pub use reader::Segment;
pub use scanner::SegmentScanner;

// =============================================================================
// Shared Constants (used by builder, reader, scanner)
// =============================================================================

/// Magic bytes identifying a cellstore segment file
pub(crate) const MAGIC: &[u8; 4] = b"CFSG";

/// Current segment format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2)
pub(crate) const HEADER_SIZE: u64 = 6;

/// Footer size: MetaOffset (8) + IndexOffset (8) + CellCount (8)
/// + DataCRC (4) + Magic (4)
pub(crate) const FOOTER_SIZE: u64 = 32;

// =============================================================================
// Segment Metadata
// =============================================================================

/// Metadata returned by a completed build
#[derive(Debug, Clone)]
pub struct SegmentMeta {
    /// Path to the segment file
    pub path: PathBuf,
    /// Number of cells in the segment
    pub cell_count: u64,
    /// Smallest row key present
    pub min_row: Bytes,
    /// Largest row key present
    pub max_row: Bytes,
    /// File size in bytes
    pub file_size: u64,
}

/// File name for a segment with the given ID
pub(crate) fn segment_file_name(id: u64) -> String {
    format!("segment_{:06}.seg", id)
}

/// Parse the segment ID out of a file name
/// "segment_000042.seg" → Some(42)
pub(crate) fn parse_segment_id(path: &Path) -> Option<u64> {
    let name = path.file_stem()?.to_string_lossy();
    let id_str = name.strip_prefix("segment_")?;
    id_str.parse().ok()
}
