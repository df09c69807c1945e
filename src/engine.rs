//! Engine Module
//!
//! The orchestration layer: a `Store` owns named regions, and a `Region`
//! coordinates one WAL, one active memtable, and an ordered segment list.
//!
//! ## Responsibilities
//! - Route puts/deletes through WAL → memtable with durability first
//! - Serve get/scan over a consistent snapshot of memtables + segments
//! - Swap and flush memtables when the byte budget is exceeded
//! - Trigger background compaction when the segment list grows
//! - Replay the WAL on open
//!
//! ## Concurrency Model
//!
//! - **Writes** (apply/flush swap): serialized by `write_lock`; a write
//!   is acknowledged only after its WAL append returns.
//! - **Reads** (get/scan): take an atomic snapshot of the table set
//!   (active + frozen memtable refs, segment list clone) and never block
//!   writers afterwards. Snapshot publication is a single `RwLock` write.
//! - **Flush**: serialized by `flush_lock`; holds `write_lock` only for
//!   the memtable swap and WAL roll, not for the segment write.
//! - **Compaction**: serialized by `compaction_lock`; runs on a
//!   background worker fed over a crossbeam channel, or synchronously
//!   via [`Region::compact`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use crossbeam::channel::{unbounded, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::cell::{Cell, Timestamp};
use crate::compaction::{CompactionKind, CompactionStats, CompactionTask};
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::memtable::MemTable;
use crate::merge::{CellSource, MaskingScanner, MergeScanner, ScanSpec};
use crate::mutation::Mutation;
use crate::segment::{parse_segment_id, segment_file_name, Segment, SegmentBuilder};
use crate::wal::{LogPosition, WalReplay, WalWriter};

// =============================================================================
// Store
// =============================================================================

/// Top-level handle: a directory of named regions
pub struct Store {
    config: Config,
    regions: Mutex<HashMap<String, Arc<Region>>>,
}

impl Store {
    /// Open or create a store rooted at `config.data_dir`
    pub fn open(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        Ok(Self {
            config,
            regions: Mutex::new(HashMap::new()),
        })
    }

    /// Open a region, creating it on first use
    ///
    /// Idempotent: a region that is already open returns the same handle.
    pub fn open_region(&self, name: &str) -> Result<Arc<Region>> {
        validate_region_name(name)?;

        let mut regions = self.regions.lock();
        if let Some(region) = regions.get(name) {
            return Ok(region.clone());
        }

        let region = Region::open(name, self.config.clone())?;
        regions.insert(name.to_string(), region.clone());
        Ok(region)
    }

    /// Whether a region exists (open now, or present on disk)
    pub fn region_exists(&self, name: &str) -> bool {
        if self.regions.lock().contains_key(name) {
            return true;
        }
        self.config.data_dir.join(name).is_dir()
    }

    /// Names of all regions present on disk
    pub fn list_regions(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.config.data_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Close one region: final flush, worker shutdown, handle dropped
    pub fn close_region(&self, name: &str) -> Result<()> {
        let region = self.regions.lock().remove(name);
        match region {
            Some(region) => region.close(),
            None => Ok(()),
        }
    }

    /// Close every open region
    pub fn close(&self) -> Result<()> {
        let regions: Vec<_> = self.regions.lock().drain().collect();
        for (_, region) in regions {
            region.close()?;
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn validate_region_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".."
    {
        return Err(StoreError::InvalidRequest(format!(
            "invalid region name: {:?}",
            name
        )));
    }
    Ok(())
}

// =============================================================================
// Region
// =============================================================================

/// Region lifecycle states with guarded transitions
///
/// `Closed → Opening → Open → Closing → Closed`; operations are only
/// served while `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionState {
    Opening,
    Open,
    Closing,
    Closed,
}

/// The shared mutable state: swapped atomically, never edited in place
#[derive(Debug)]
struct TableSet {
    /// Memtable receiving writes
    active: Arc<MemTable>,
    /// Memtable frozen for flush, with the WAL position that covers it
    /// (kept readable until its segment is durable)
    frozen: Option<(Arc<MemTable>, LogPosition)>,
    /// Segments, newest first
    segments: Vec<Arc<Segment>>,
}

/// A consistent view for one read
struct Snapshot {
    active: Arc<MemTable>,
    frozen: Option<Arc<MemTable>>,
    segments: Vec<Arc<Segment>>,
}

enum WorkerMsg {
    Compact,
    Shutdown,
}

/// One named keyspace: WAL + memtables + segment list
#[derive(Debug)]
pub struct Region {
    name: String,
    config: Config,
    segment_dir: PathBuf,

    state: RwLock<RegionState>,

    /// Write-ahead log (exclusive access)
    wal: Mutex<WalWriter>,

    /// Snapshot-swapped table set
    tables: RwLock<TableSet>,

    /// Serializes apply and the flush swap
    write_lock: Mutex<()>,

    /// Serializes flushes
    flush_lock: Mutex<()>,

    /// Serializes compactions
    compaction_lock: Mutex<()>,

    /// Monotonic timestamp source
    clock: AtomicU64,

    /// Next segment file ID
    next_segment_id: AtomicU64,

    /// Background compaction worker
    worker_tx: Mutex<Option<Sender<WorkerMsg>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Region {
    /// Open a region: load segments, replay the WAL, start the worker
    pub fn open(name: &str, config: Config) -> Result<Arc<Self>> {
        let region_dir = config.data_dir.join(name);
        let wal_dir = region_dir.join("wal");
        let segment_dir = region_dir.join("segments");
        std::fs::create_dir_all(&wal_dir)?;
        std::fs::create_dir_all(&segment_dir)?;

        // Load existing segments, newest first
        let segments = load_segments(&segment_dir)?;
        let next_segment_id = segments.first().map(|s| s.id() + 1).unwrap_or(1);

        // Replay the WAL into a fresh memtable
        let memtable = MemTable::new();
        let mut replay = WalReplay::open(&wal_dir)?;
        let mut max_ts = 0u64;
        while let Some(record) = replay.next_record()? {
            for cell in &record.cells {
                max_ts = max_ts.max(cell.timestamp());
            }
            memtable.apply(&record.cells)?;
        }
        let stats = replay.stats().clone();
        if stats.records_replayed > 0 || stats.truncated_tail {
            info!(
                region = name,
                records = stats.records_replayed,
                cells = stats.cells_replayed,
                last_lsn = stats.last_lsn,
                truncated_tail = stats.truncated_tail,
                "WAL replay complete"
            );
        }

        let wal = WalWriter::open(&wal_dir, config.wal_sync_strategy, stats.last_lsn + 1)?;

        let now = unix_millis();
        let region = Arc::new(Self {
            name: name.to_string(),
            segment_dir,
            state: RwLock::new(RegionState::Opening),
            wal: Mutex::new(wal),
            tables: RwLock::new(TableSet {
                active: Arc::new(memtable),
                frozen: None,
                segments,
            }),
            write_lock: Mutex::new(()),
            flush_lock: Mutex::new(()),
            compaction_lock: Mutex::new(()),
            clock: AtomicU64::new(now.max(max_ts)),
            next_segment_id: AtomicU64::new(next_segment_id),
            worker_tx: Mutex::new(None),
            worker: Mutex::new(None),
            config,
        });

        // Make replayed data durable in a segment right away, then drop
        // the replayed log files. If we crash after this, recovery needs
        // only the fresh (empty) log.
        if !region.tables.read().active.is_empty() {
            debug!(region = name, "flushing replayed cells to a segment");
            region.flush_inner()?;
        } else {
            let mut wal = region.wal.lock();
            let position = wal.position();
            wal.truncate_before(position)?;
        }

        region.spawn_worker();
        *region.state.write() = RegionState::Open;

        info!(
            region = name,
            segments = region.tables.read().segments.len(),
            "region open"
        );

        Ok(region)
    }

    fn spawn_worker(self: &Arc<Self>) {
        let (tx, rx) = unbounded();
        let weak: Weak<Region> = Arc::downgrade(self);
        let name = self.name.clone();
        let handle = std::thread::spawn(move || {
            // Exits on Shutdown or when the region handle is gone
            while let Ok(msg) = rx.recv() {
                match msg {
                    WorkerMsg::Shutdown => break,
                    WorkerMsg::Compact => {
                        let Some(region) = weak.upgrade() else { break };
                        if let Err(e) = region.compact_inner(CompactionKind::Minor) {
                            error!(region = %name, error = %e, "background compaction failed");
                        }
                    }
                }
            }
        });
        *self.worker_tx.lock() = Some(tx);
        *self.worker.lock() = Some(handle);
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Apply an atomic batch: WAL first, then memtable, then flush check
    pub fn apply(&self, mutation: Mutation) -> Result<()> {
        self.ensure_open()?;
        if mutation.is_empty() {
            return Ok(());
        }

        // Stamp unset timestamps once per batch, from the engine clock
        let mut cells = mutation.into_cells();
        let needs_stamp = cells.iter().any(|c| c.needs_timestamp());
        if needs_stamp {
            let ts = self.next_timestamp();
            for cell in &mut cells {
                if cell.needs_timestamp() {
                    cell.key.timestamp = ts;
                }
            }
        }

        let needs_flush = {
            let _write_guard = self.write_lock.lock();

            // Durability first: nothing is visible unless the log has it
            self.wal.lock().append(&cells)?;

            let size = self.tables.read().active.apply(&cells)?;
            size >= self.config.memtable_budget_bytes
        };

        if needs_flush {
            self.flush()?;
        }
        Ok(())
    }

    /// Put one value cell, stamped by the engine clock
    pub fn put(
        &self,
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Result<()> {
        self.apply(Mutation::new(row).put(family, qualifier, value))
    }

    /// Put one value cell with an explicit timestamp
    pub fn put_at(
        &self,
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        value: impl Into<Bytes>,
        timestamp: Timestamp,
    ) -> Result<()> {
        self.apply(Mutation::new(row).put_at(family, qualifier, value, timestamp))
    }

    /// Delete a whole row (tombstone at the engine clock)
    pub fn delete_row(&self, row: impl Into<Bytes>) -> Result<()> {
        self.apply(Mutation::new(row).delete_row())
    }

    /// Delete every qualifier under one family
    pub fn delete_family(&self, row: impl Into<Bytes>, family: impl Into<Bytes>) -> Result<()> {
        self.apply(Mutation::new(row).delete_family(family))
    }

    /// Delete one (family, qualifier) coordinate
    pub fn delete_column(
        &self,
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
    ) -> Result<()> {
        self.apply(Mutation::new(row).delete_column(family, qualifier))
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Fetch one row's live cells
    ///
    /// An empty result means the row (or the requested column) does not
    /// exist — absence is not an error.
    pub fn get(&self, row: impl Into<Bytes>, options: GetOptions) -> Result<Vec<Cell>> {
        self.ensure_open()?;

        if options.qualifier.is_some() && options.family.is_none() {
            return Err(StoreError::InvalidRequest(
                "qualifier filter requires a family".to_string(),
            ));
        }

        let mut spec = ScanSpec::single_row(row).with_max_versions(options.max_versions);
        spec.family = options.family;
        spec.qualifier = options.qualifier;
        spec.time_range = options.time_range;

        let mut cells = Vec::new();
        for row_cells in self.scanner(spec)? {
            cells.extend(row_cells?.cells);
        }
        Ok(cells)
    }

    /// Open a lazy scanner over `[start, end)` rows
    ///
    /// The scanner sees a consistent snapshot taken now: concurrent
    /// writes, flushes, and compactions do not affect it. Dropping it at
    /// any point releases its references; nothing else to clean up.
    pub fn scan(&self, spec: ScanSpec) -> Result<RegionScanner> {
        self.ensure_open()?;
        if spec.qualifier.is_some() && spec.family.is_none() {
            return Err(StoreError::InvalidRequest(
                "qualifier filter requires a family".to_string(),
            ));
        }
        self.scanner(spec)
    }

    fn scanner(&self, spec: ScanSpec) -> Result<RegionScanner> {
        let snapshot = self.snapshot();
        let bounds = spec.bounds.clone();

        let mut sources: Vec<CellSource> = Vec::with_capacity(2 + snapshot.segments.len());
        sources.push(Box::new(
            snapshot.active.scan(&bounds).into_iter().map(Ok),
        ));
        if let Some(frozen) = &snapshot.frozen {
            sources.push(Box::new(frozen.scan(&bounds).into_iter().map(Ok)));
        }
        for segment in &snapshot.segments {
            if segment.overlaps(&bounds) {
                sources.push(Box::new(segment.scan(&bounds)?));
            }
        }

        let merged = MergeScanner::new(sources);
        let masked = MaskingScanner::for_read(merged, &spec);

        Ok(RegionScanner {
            inner: masked,
            pending: None,
            done: false,
            _segments: snapshot.segments,
        })
    }

    /// Consistent set of references for one read
    fn snapshot(&self) -> Snapshot {
        let tables = self.tables.read();
        Snapshot {
            active: tables.active.clone(),
            frozen: tables.frozen.as_ref().map(|(mem, _)| mem.clone()),
            segments: tables.segments.clone(),
        }
    }

    // =========================================================================
    // Flush
    // =========================================================================

    /// Flush the active memtable to a new segment
    ///
    /// No-op when the memtable is empty. On failure the frozen memtable
    /// stays readable and the WAL keeps the covering files, so the data
    /// survives a crash and the flush can be retried.
    pub fn flush(&self) -> Result<()> {
        self.ensure_open()?;
        self.flush_inner()
    }

    fn flush_inner(&self) -> Result<()> {
        let _flush_guard = self.flush_lock.lock();

        // A frozen memtable left by a failed attempt is flushed first
        self.flush_frozen()?;

        {
            let _write_guard = self.write_lock.lock();
            let swap = {
                let tables = self.tables.read();
                !tables.active.is_empty()
            };
            if !swap {
                return Ok(());
            }

            // Roll the log so everything covering the frozen memtable sits
            // in files wholly before this position.
            let position = self.wal.lock().roll()?;

            let mut tables = self.tables.write();
            tables.active.freeze();
            let frozen = std::mem::replace(&mut tables.active, Arc::new(MemTable::new()));
            tables.frozen = Some((frozen, position));
        }

        self.flush_frozen()?;
        self.maybe_request_compaction();
        Ok(())
    }

    /// Write the frozen memtable (if any) to a segment and truncate the WAL
    fn flush_frozen(&self) -> Result<()> {
        let (frozen, position) = {
            let tables = self.tables.read();
            match &tables.frozen {
                Some((mem, pos)) => (mem.clone(), *pos),
                None => return Ok(()),
            }
        };

        let segment = self.write_segment(&frozen)?;
        let cell_count = segment.cell_count();

        {
            let mut tables = self.tables.write();
            tables.segments.insert(0, segment);
            tables.frozen = None;
        }

        self.wal.lock().truncate_before(position)?;

        info!(
            region = %self.name,
            cells = cell_count,
            "flushed memtable to segment"
        );
        Ok(())
    }

    fn write_segment(&self, memtable: &MemTable) -> Result<Arc<Segment>> {
        let id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
        let path = self.segment_dir.join(segment_file_name(id));

        let mut builder = SegmentBuilder::create(&path, self.config.index_interval)?;
        for cell in memtable.scan_all() {
            builder.append(&cell)?;
        }
        builder.finish()?;

        Ok(Arc::new(Segment::open(id, &path)?))
    }

    // =========================================================================
    // Compaction
    // =========================================================================

    /// Run a major compaction now: merge every segment into one, dropping
    /// tombstones and versions beyond the configured retention
    pub fn compact(&self) -> Result<CompactionStats> {
        self.ensure_open()?;
        self.compact_inner(CompactionKind::Major)
    }

    fn compact_inner(&self, kind: CompactionKind) -> Result<CompactionStats> {
        let _compaction_guard = self.compaction_lock.lock();

        let inputs = self.tables.read().segments.clone();
        if inputs.is_empty() || (kind == CompactionKind::Minor && inputs.len() < 2) {
            return Ok(CompactionStats::default());
        }

        let output_id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
        let task = CompactionTask {
            inputs: inputs.clone(),
            kind,
            max_versions: self.config.max_versions,
            index_interval: self.config.index_interval,
            output_path: self.segment_dir.join(segment_file_name(output_id)),
        };
        let (meta, stats) = task.run()?;

        let output = match meta {
            Some(meta) => Some(Arc::new(Segment::open(output_id, &meta.path)?)),
            None => None,
        };

        // Atomic swap: replace the input suffix of the list with the
        // output. Flush may have prepended new segments meanwhile; those
        // stay in front.
        {
            let mut tables = self.tables.write();
            let keep = tables.segments.len() - inputs.len();
            let unchanged = tables.segments[keep..]
                .iter()
                .zip(inputs.iter())
                .all(|(held, input)| Arc::ptr_eq(held, input));
            if !unchanged {
                return Err(StoreError::InternalInconsistency(
                    "segment list changed under a serialized compaction".to_string(),
                ));
            }
            tables.segments.truncate(keep);
            if let Some(output) = output {
                tables.segments.push(output);
            }
        }

        // Retirement: files disappear once the last reader reference drops
        for input in &inputs {
            input.retire();
        }

        Ok(stats)
    }

    fn maybe_request_compaction(&self) {
        let count = self.tables.read().segments.len();
        if count > self.config.max_segments {
            debug!(region = %self.name, segments = count, "requesting compaction");
            if let Some(tx) = self.worker_tx.lock().as_ref() {
                let _ = tx.send(WorkerMsg::Compact);
            }
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close the region: final flush, worker shutdown, WAL sync
    pub fn close(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            match *state {
                RegionState::Open => *state = RegionState::Closing,
                RegionState::Closed | RegionState::Closing => return Ok(()),
                RegionState::Opening => {
                    return Err(StoreError::InternalInconsistency(
                        "close during open".to_string(),
                    ))
                }
            }
        }

        let flush_result = self.flush_inner();

        // Stop the worker regardless of the flush outcome
        if let Some(tx) = self.worker_tx.lock().take() {
            let _ = tx.send(WorkerMsg::Shutdown);
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }

        flush_result?;
        self.wal.lock().sync()?;

        *self.state.write() = RegionState::Closed;
        info!(region = %self.name, "region closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        match *self.state.read() {
            RegionState::Open => Ok(()),
            state => Err(StoreError::RegionClosed(format!(
                "region {:?} is {:?}",
                self.name, state
            ))),
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current memtable size in bytes
    pub fn memtable_size(&self) -> usize {
        self.tables.read().active.size_bytes()
    }

    /// Number of live segments
    pub fn segment_count(&self) -> usize {
        self.tables.read().segments.len()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Clock
    // =========================================================================

    /// Monotonic engine timestamp: wall-clock millis, bumped past the
    /// last handed-out value so same-millisecond writes stay ordered
    fn next_timestamp(&self) -> Timestamp {
        let now = unix_millis();
        let mut last = self.clock.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self.clock.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(observed) => last = observed,
            }
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Discover and open segment files, newest first
fn load_segments(dir: &Path) -> Result<Vec<Arc<Segment>>> {
    let mut found: Vec<(u64, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            if let Some(id) = parse_segment_id(&path) {
                found.push((id, path));
            } else if path.extension().map_or(false, |ext| ext == "tmp") {
                // Leftover from a compaction that never renamed its output
                warn!(path = %path.display(), "removing orphaned segment temp file");
                std::fs::remove_file(&path)?;
            }
        }
    }
    found.sort_by_key(|(id, _)| std::cmp::Reverse(*id));

    let mut segments = Vec::with_capacity(found.len());
    for (id, path) in found {
        segments.push(Arc::new(Segment::open(id, &path)?));
    }
    Ok(segments)
}

// =============================================================================
// Get Options
// =============================================================================

/// Narrowing options for [`Region::get`]
#[derive(Debug, Clone)]
pub struct GetOptions {
    /// Restrict to one family
    pub family: Option<Bytes>,
    /// Restrict to one qualifier (requires `family`)
    pub qualifier: Option<Bytes>,
    /// Live versions returned per coordinate
    pub max_versions: u32,
    /// Inclusive `[min, max]` timestamp window
    pub time_range: Option<(Timestamp, Timestamp)>,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            family: None,
            qualifier: None,
            max_versions: 1,
            time_range: None,
        }
    }
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn family(mut self, family: impl Into<Bytes>) -> Self {
        self.family = Some(family.into());
        self
    }

    pub fn qualifier(mut self, qualifier: impl Into<Bytes>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn max_versions(mut self, versions: u32) -> Self {
        self.max_versions = versions;
        self
    }

    pub fn time_range(mut self, min: Timestamp, max: Timestamp) -> Self {
        self.time_range = Some((min, max));
        self
    }
}

// =============================================================================
// Region Scanner
// =============================================================================

/// One row's live cells, in cell order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCells {
    pub row: Bytes,
    pub cells: Vec<Cell>,
}

/// Lazy row-grouped scanner over a region snapshot
///
/// Holds references to the snapshot's segments, so files retired by a
/// concurrent compaction stay on disk until this scanner drops.
pub struct RegionScanner {
    inner: MaskingScanner<MergeScanner>,
    pending: Option<Cell>,
    done: bool,
    _segments: Vec<Arc<Segment>>,
}

impl Iterator for RegionScanner {
    type Item = Result<RowCells>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let first = match self.pending.take() {
            Some(cell) => cell,
            None => match self.inner.next() {
                Some(Ok(cell)) => cell,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => return None,
            },
        };

        let row = first.row().clone();
        let mut cells = vec![first];

        loop {
            match self.inner.next() {
                Some(Ok(cell)) => {
                    if cell.row() == &row {
                        cells.push(cell);
                    } else {
                        self.pending = Some(cell);
                        break;
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => break,
            }
        }

        Some(Ok(RowCells { row, cells }))
    }
}
