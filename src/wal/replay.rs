//! WAL Replay
//!
//! Lazy, ordered replay across every WAL file of a region, oldest file
//! first. Used only at region open to rebuild the memtable; replay order
//! equals append order, which preserves version semantics.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, StoreError};

use super::{list_wal_files, WalReader, WalRecord};

/// Summary of a completed replay
#[derive(Debug, Clone, Default)]
pub struct ReplayStats {
    /// Records successfully replayed
    pub records_replayed: u64,

    /// Cells contained in those records
    pub cells_replayed: u64,

    /// Highest LSN observed (0 if the log was empty)
    pub last_lsn: u64,

    /// Whether a torn record was dropped from the tail of the newest file
    pub truncated_tail: bool,
}

/// Replays every WAL file of a region in sequence order
pub struct WalReplay {
    /// Remaining files, oldest first: (seq, path)
    pending: VecDeque<(u64, PathBuf)>,

    /// Reader over the file currently being replayed
    current: Option<(u64, WalReader)>,

    /// Highest file sequence present at open (0 if none)
    max_file_seq: u64,

    stats: ReplayStats,
}

impl WalReplay {
    /// Open a replay over the WAL directory
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let files = list_wal_files(dir)?;
        let max_file_seq = files.last().map(|(seq, _)| *seq).unwrap_or(0);

        Ok(Self {
            pending: files.into(),
            current: None,
            max_file_seq,
            stats: ReplayStats::default(),
        })
    }

    /// Next record in append order, or `None` when the log is exhausted
    pub fn next_record(&mut self) -> Result<Option<WalRecord>> {
        loop {
            if self.current.is_none() {
                match self.pending.pop_front() {
                    Some((seq, path)) => {
                        self.current = Some((seq, WalReader::open(&path)?));
                    }
                    None => return Ok(None),
                }
            }

            let (seq, reader) = self.current.as_mut().unwrap();
            match reader.next_record()? {
                Some(record) => {
                    // Append order is strictly increasing; anything else
                    // means the log cannot be trusted.
                    if record.lsn <= self.stats.last_lsn {
                        return Err(StoreError::InternalInconsistency(format!(
                            "WAL replay out of order: lsn {} after {}",
                            record.lsn, self.stats.last_lsn
                        )));
                    }
                    self.stats.last_lsn = record.lsn;
                    self.stats.records_replayed += 1;
                    self.stats.cells_replayed += record.cells.len() as u64;
                    return Ok(Some(record));
                }
                None => {
                    if reader.torn_tail() {
                        // Only the newest file may legitimately end torn
                        if self.pending.is_empty() {
                            self.stats.truncated_tail = true;
                            warn!(file_seq = *seq, "dropped torn record at WAL tail");
                        } else {
                            return Err(StoreError::CorruptRecord(format!(
                                "torn record in non-final WAL file {}",
                                seq
                            )));
                        }
                    }
                    self.current = None;
                }
            }
        }
    }

    /// Stats accumulated so far (complete once `next_record` returns `None`)
    pub fn stats(&self) -> &ReplayStats {
        &self.stats
    }

    /// Highest WAL file sequence present when replay opened
    pub fn max_file_seq(&self) -> u64 {
        self.max_file_seq
    }
}

impl Iterator for WalReplay {
    type Item = Result<WalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
