//! MemTable Module
//!
//! In-memory staging area for recent writes.
//!
//! ## Responsibilities
//! - Fast ordered inserts and range scans in memory
//! - Track byte size for flush triggers
//! - Ordered iteration for segment creation
//!
//! ## Data Structure Choice
//! BTreeMap keyed by `CellKey` behind a RwLock:
//! - Ordered cells (required for segment generation and merge scans)
//! - Keyed by coordinate+timestamp+kind, so rewriting the same version
//!   replaces the value instead of duplicating it
//!
//! ## Lifecycle
//! A memtable is mutable while active. When the engine decides to flush
//! it, it is frozen (read-only from then on) and a fresh active memtable
//! takes its place — flush and ingestion never contend on one structure.

mod table;

pub use table::MemTable;
