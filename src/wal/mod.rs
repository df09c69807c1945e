//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging. Every
//! mutation is persisted here before it becomes visible in the memtable;
//! on restart, replay rebuilds exactly the mutations not yet covered by a
//! flushed segment.
//!
//! The log is a directory of numbered files. Flush rolls the writer onto
//! a fresh file and, once the corresponding segment is durable,
//! truncation drops the superseded files whole — the log is never edited
//! in place.
//!
//! ## Record Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │Payload │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │Payload │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//! Payload is the bincode encoding of [`WalRecord`]; the CRC32 covers the
//! payload bytes. A torn record at the tail of the newest file is
//! tolerated (crash mid-append); a checksum mismatch anywhere else is
//! `CorruptRecord` and fails region open.

mod reader;
mod replay;
mod writer;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::error::Result;

pub use reader::WalReader;
pub use replay::{ReplayStats, WalReplay};
pub use writer::WalWriter;

/// Frame header size: LSN (8) + CRC (4) + Len (4)
pub const FRAME_HEADER_SIZE: usize = 16;

/// Upper bound on a single record payload; larger lengths are treated as
/// corruption rather than honored as allocations.
pub const MAX_RECORD_SIZE: u32 = 64 * 1024 * 1024;

/// One durable log record: an atomic batch of cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalRecord {
    /// Log sequence number, strictly increasing across the whole log
    pub lsn: u64,

    /// The cells applied by this record, already timestamp-stamped
    pub cells: Vec<Cell>,
}

/// Position in the log: a file plus a byte offset within it
///
/// Ordered first by file sequence, then by offset, so positions compare
/// the way the log replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LogPosition {
    pub file_seq: u64,
    pub offset: u64,
}

/// File name for a WAL file with the given sequence number
pub(crate) fn wal_file_name(seq: u64) -> String {
    format!("wal_{:06}.log", seq)
}

/// Parse the sequence number out of a WAL file name
/// "wal_000042.log" → Some(42)
pub(crate) fn parse_wal_seq(path: &Path) -> Option<u64> {
    let name = path.file_stem()?.to_string_lossy();
    let seq_str = name.strip_prefix("wal_")?;
    seq_str.parse().ok()
}

/// List WAL files in a directory, sorted oldest first
pub(crate) fn list_wal_files(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            if let Some(seq) = parse_wal_seq(&path) {
                files.push((seq, path));
            }
        }
    }
    files.sort_by_key(|(seq, _)| *seq);
    Ok(files)
}
