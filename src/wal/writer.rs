//! WAL Writer
//!
//! Appends records to the newest log file. An `append` that returns `Ok`
//! has been handed to the OS (and fsync'd, per the sync strategy) —
//! the caller must not make the mutation visible before that.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use tracing::debug;

use crate::cell::Cell;
use crate::config::WalSyncStrategy;
use crate::error::Result;

use super::{list_wal_files, wal_file_name, LogPosition, WalRecord};

/// Writes records to the WAL, rolling onto numbered files
#[derive(Debug)]
pub struct WalWriter {
    /// WAL directory for this region
    dir: PathBuf,

    /// Sync strategy (fsync cadence)
    strategy: WalSyncStrategy,

    /// Currently open file
    file: BufWriter<File>,

    /// Sequence number of the open file
    file_seq: u64,

    /// Byte offset of the next record in the open file
    offset: u64,

    /// Next LSN to hand out
    next_lsn: u64,

    /// Records appended since the last fsync
    unsynced: usize,
}

impl WalWriter {
    /// Open a writer in `dir`, starting a fresh file after any existing ones
    ///
    /// Existing files are left for replay/truncation; the writer never
    /// appends to a file that may carry a torn tail.
    pub fn open(dir: impl Into<PathBuf>, strategy: WalSyncStrategy, next_lsn: u64) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let file_seq = list_wal_files(&dir)?
            .last()
            .map(|(seq, _)| seq + 1)
            .unwrap_or(1);

        let file = Self::create_file(&dir, file_seq)?;

        Ok(Self {
            dir,
            strategy,
            file,
            file_seq,
            offset: 0,
            next_lsn,
            unsynced: 0,
        })
    }

    /// Append one atomic batch of cells
    ///
    /// Returns the position at which the record starts. On error the
    /// record must be treated as not written: the caller keeps the
    /// mutation out of the memtable and surfaces the failure.
    pub fn append(&mut self, cells: &[Cell]) -> Result<LogPosition> {
        let record = WalRecord {
            lsn: self.next_lsn,
            cells: cells.to_vec(),
        };
        let payload = bincode::serialize(&record)?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        let crc = hasher.finalize();

        let position = self.position();

        self.file.write_all(&record.lsn.to_be_bytes())?;
        self.file.write_all(&crc.to_be_bytes())?;
        self.file.write_all(&(payload.len() as u32).to_be_bytes())?;
        self.file.write_all(&payload)?;

        self.offset += (super::FRAME_HEADER_SIZE + payload.len()) as u64;
        self.next_lsn += 1;
        self.unsynced += 1;

        match self.strategy {
            WalSyncStrategy::EveryWrite => self.sync()?,
            WalSyncStrategy::EveryNRecords { count } => {
                // Always push through the buffer; fsync every N records
                self.file.flush()?;
                if self.unsynced >= count {
                    self.sync()?;
                }
            }
        }

        Ok(position)
    }

    /// Force an fsync of the open file
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Close the current file and start the next one
    ///
    /// Returns the position at the head of the new file. Safe point for
    /// flush: every record below this position belongs to the memtable
    /// being flushed.
    pub fn roll(&mut self) -> Result<LogPosition> {
        self.sync()?;

        self.file_seq += 1;
        self.file = Self::create_file(&self.dir, self.file_seq)?;
        self.offset = 0;

        debug!(file_seq = self.file_seq, "rolled WAL file");

        Ok(self.position())
    }

    /// Delete files that lie wholly before `position`
    ///
    /// Safe only after the data below `position` is durable in a segment.
    pub fn truncate_before(&mut self, position: LogPosition) -> Result<()> {
        for (seq, path) in list_wal_files(&self.dir)? {
            if seq < position.file_seq {
                std::fs::remove_file(&path)?;
                debug!(file_seq = seq, "truncated WAL file");
            }
        }
        Ok(())
    }

    /// Position the next record will be written at
    pub fn position(&self) -> LogPosition {
        LogPosition {
            file_seq: self.file_seq,
            offset: self.offset,
        }
    }

    /// Next LSN to be assigned
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Records appended since the last fsync
    pub fn unsynced_count(&self) -> usize {
        self.unsynced
    }

    fn create_file(dir: &PathBuf, seq: u64) -> Result<BufWriter<File>> {
        let path = dir.join(wal_file_name(seq));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(BufWriter::new(file))
    }
}
