//! Configuration for cellstore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for a cellstore instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files.
    /// Internal structure:
    ///   {data_dir}/
    ///     └── {region}/
    ///         ├── wal/         (numbered write-ahead log files)
    ///         └── segments/    (immutable sorted segment files)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Max size of the memtable before flush (in bytes)
    pub memtable_budget_bytes: usize,

    // -------------------------------------------------------------------------
    // Segment Configuration
    // -------------------------------------------------------------------------
    /// Sparse index granularity: one index entry per this many cells
    pub index_interval: usize,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Segment count that triggers a background compaction
    pub max_segments: usize,

    /// Versions retained per (row, family, qualifier) by major compaction
    pub max_versions: u32,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncStrategy {
    /// fsync after every record (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced records (balanced durability/performance)
    EveryNRecords { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./cellstore_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNRecords { count: 100 },
            memtable_budget_bytes: 64 * 1024 * 1024, // 64 MB
            index_interval: 16,
            max_segments: 8,
            max_versions: 3,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all regions)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable byte budget before flush
    pub fn memtable_budget_bytes(mut self, size: usize) -> Self {
        self.config.memtable_budget_bytes = size;
        self
    }

    /// Set the sparse index granularity (cells per index entry)
    pub fn index_interval(mut self, interval: usize) -> Self {
        self.config.index_interval = interval;
        self
    }

    /// Set the segment count that triggers compaction
    pub fn max_segments(mut self, count: usize) -> Self {
        self.config.max_segments = count;
        self
    }

    /// Set the version retention applied by major compaction
    pub fn max_versions(mut self, versions: u32) -> Self {
        self.config.max_versions = versions;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
