//! WAL Reader
//!
//! Lazy, ordered iteration over the records of a single WAL file.
//!
//! A record that runs past the end of the file is a torn tail — the
//! writer crashed mid-append. The reader stops cleanly and reports it.
//! A checksum mismatch on a complete record is real corruption and
//! surfaces as `CorruptRecord`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

use super::{WalRecord, FRAME_HEADER_SIZE, MAX_RECORD_SIZE};

/// Reads records from one WAL file
pub struct WalReader {
    path: PathBuf,
    reader: BufReader<File>,
    finished: bool,
    torn_tail: bool,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            finished: false,
            torn_tail: false,
        })
    }

    /// Read the next record, or `None` at end of file
    pub fn next_record(&mut self) -> Result<Option<WalRecord>> {
        if self.finished {
            return Ok(None);
        }

        // Frame header: LSN (8) + CRC (4) + Len (4)
        let mut header = [0u8; FRAME_HEADER_SIZE];
        match read_exact_or_eof(&mut self.reader, &mut header)? {
            ReadOutcome::Full => {}
            ReadOutcome::CleanEof => {
                self.finished = true;
                return Ok(None);
            }
            ReadOutcome::Partial => {
                self.finished = true;
                self.torn_tail = true;
                return Ok(None);
            }
        }

        let lsn = u64::from_be_bytes(header[0..8].try_into().unwrap());
        let crc = u32::from_be_bytes(header[8..12].try_into().unwrap());
        let len = u32::from_be_bytes(header[12..16].try_into().unwrap());

        if len > MAX_RECORD_SIZE {
            return Err(StoreError::CorruptRecord(format!(
                "WAL record length {} exceeds limit {} in {}",
                len,
                MAX_RECORD_SIZE,
                self.path.display()
            )));
        }

        let mut payload = vec![0u8; len as usize];
        match read_exact_or_eof(&mut self.reader, &mut payload)? {
            ReadOutcome::Full => {}
            ReadOutcome::CleanEof | ReadOutcome::Partial => {
                self.finished = true;
                self.torn_tail = true;
                return Ok(None);
            }
        }

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        let computed = hasher.finalize();
        if computed != crc {
            return Err(StoreError::CorruptRecord(format!(
                "WAL checksum mismatch at lsn {}: stored {:#010x}, computed {:#010x} in {}",
                lsn,
                crc,
                computed,
                self.path.display()
            )));
        }

        let record: WalRecord = bincode::deserialize(&payload).map_err(|e| {
            StoreError::CorruptRecord(format!(
                "WAL record decode failed at lsn {}: {} in {}",
                lsn,
                e,
                self.path.display()
            ))
        })?;

        if record.lsn != lsn {
            return Err(StoreError::CorruptRecord(format!(
                "WAL frame lsn {} disagrees with payload lsn {} in {}",
                lsn,
                record.lsn,
                self.path.display()
            )));
        }

        Ok(Some(record))
    }

    /// Whether the file ended in a torn (partially written) record
    pub fn torn_tail(&self) -> bool {
        self.torn_tail
    }

    /// Iterate over all records
    pub fn records(self) -> WalFileIter {
        WalFileIter { reader: self }
    }
}

/// Iterator over the records of one WAL file
pub struct WalFileIter {
    reader: WalReader,
}

impl WalFileIter {
    pub fn torn_tail(&self) -> bool {
        self.reader.torn_tail()
    }
}

impl Iterator for WalFileIter {
    type Item = Result<WalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_record().transpose()
    }
}

enum ReadOutcome {
    Full,
    CleanEof,
    Partial,
}

/// Fill `buf` exactly, distinguishing clean EOF (no bytes at all) from a
/// partial read (torn record).
fn read_exact_or_eof(reader: &mut BufReader<File>, buf: &mut [u8]) -> Result<ReadOutcome> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            return Ok(if filled == 0 {
                ReadOutcome::CleanEof
            } else {
                ReadOutcome::Partial
            });
        }
        filled += n;
    }
    Ok(ReadOutcome::Full)
}
