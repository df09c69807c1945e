//! Error types for cellstore
//!
//! Provides a unified error type for all operations.
//!
//! Absence of data is never an error: `get` and `scan` return empty
//! results for missing rows. Errors are reserved for I/O failures,
//! corrupted on-disk state, misuse of the API, and internal invariant
//! violations.

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for cellstore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Corruption Errors
    // -------------------------------------------------------------------------
    /// A WAL record, cell, or segment block failed to decode (bad magic,
    /// checksum mismatch, truncated or malformed bytes).
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Usage Errors
    // -------------------------------------------------------------------------
    /// Operation issued against a region that is not open.
    #[error("region closed: {0}")]
    RegionClosed(String),

    /// Malformed request (oversized field, qualifier without family, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Invariant Violations
    // -------------------------------------------------------------------------
    /// A programming error was detected (out-of-order segment build,
    /// write to a frozen memtable, ...). The affected region should be
    /// closed rather than trusted further.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
