//! # cellstore
//!
//! A single-node column-family storage core with:
//! - Multi-version cells addressed by (row, family, qualifier, timestamp)
//! - Write-Ahead Logging (WAL) for durability, replayed on open
//! - Immutable sorted segments with sparse indexes
//! - Tombstone-aware merge reads and background compaction
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Store                                 │
//! │                  (named Regions)                             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Region                                 │
//! │          (put/delete/get/scan, flush, compact)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │  (ordered)  │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ flush
//!                                   ▼
//!                           ┌─────────────┐
//!                           │  Segments   │◄── Compactor
//!                           │ (immutable) │
//!                           └─────────────┘
//! ```
//!
//! A write goes WAL (durable) → memtable (visible). A read merges the
//! memtables and every segment, newest first, resolving versions and
//! tombstones on the fly. A full memtable is swapped out, flushed to a
//! new segment, and its WAL files are dropped.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod cell;
pub mod mutation;
pub mod wal;
pub mod memtable;
pub mod segment;
pub mod merge;
pub mod compaction;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use cell::{Cell, CellKind, RowBounds, Timestamp};
pub use compaction::CompactionStats;
pub use config::{Config, ConfigBuilder, WalSyncStrategy};
pub use engine::{GetOptions, Region, RegionScanner, RowCells, Store};
pub use error::{Result, StoreError};
pub use merge::ScanSpec;
pub use mutation::Mutation;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of cellstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
