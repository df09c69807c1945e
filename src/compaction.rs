//! Compaction
//!
//! Merges the region's segments into one, bounding read amplification
//! and reclaiming space from obsolete versions and tombstones.
//!
//! Two kinds, mirroring the column-family lineage:
//! - **Minor**: merge-rewrite that keeps delete markers. Cells already
//!   masked by an in-set marker are dropped (the surviving marker keeps
//!   masking everything older), but the markers themselves survive.
//!   This is the automatic, post-flush kind.
//! - **Major**: additionally drops the delete markers themselves and
//!   trims versions beyond the configured retention. Only valid over the
//!   complete segment set — with nothing outside the set, no marker is
//!   still needed and no trimmed version can resurface.
//!
//! The output is written to a temporary file and renamed into place
//! before it is published, so a crash mid-compaction leaves either the
//! old segment set or a superset of the data — never a hole.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::cell::RowBounds;
use crate::error::Result;
use crate::merge::{CellSource, MaskingScanner, MergeScanner};
use crate::segment::{Segment, SegmentBuilder, SegmentMeta};

/// Which rewrite rules apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionKind {
    /// Keep tombstones, no version trimming
    Minor,
    /// Drop tombstones and trim versions (complete-set compactions only)
    Major,
}

/// Counters for one compaction run
#[derive(Debug, Clone, Default)]
pub struct CompactionStats {
    /// Segments merged
    pub input_segments: usize,
    /// Cells across the inputs
    pub input_cells: u64,
    /// Cells written to the output
    pub output_cells: u64,
    /// Output file size in bytes (0 if everything was dropped)
    pub output_bytes: u64,
}

/// One compaction over a fixed input set
pub(crate) struct CompactionTask {
    /// Inputs, newest first (their merge rank order)
    pub inputs: Vec<Arc<Segment>>,
    pub kind: CompactionKind,
    /// Version retention for major compactions
    pub max_versions: u32,
    /// Sparse index granularity of the output
    pub index_interval: usize,
    /// Final path of the output segment
    pub output_path: PathBuf,
}

impl CompactionTask {
    /// Run the merge-rewrite
    ///
    /// Returns `None` metadata when every cell was dropped (a major
    /// compaction over fully-deleted data); the caller then publishes an
    /// empty segment list. Inputs are untouched either way — swapping
    /// and retiring them is the caller's job, after this returns.
    pub fn run(&self) -> Result<(Option<SegmentMeta>, CompactionStats)> {
        let mut stats = CompactionStats {
            input_segments: self.inputs.len(),
            input_cells: self.inputs.iter().map(|s| s.cell_count()).sum(),
            ..Default::default()
        };

        let sources: Vec<CellSource> = self
            .inputs
            .iter()
            .map(|segment| {
                segment
                    .scan(&RowBounds::all())
                    .map(|scanner| Box::new(scanner) as CellSource)
            })
            .collect::<Result<_>>()?;

        let merged = MergeScanner::new(sources);
        let rewrite = match self.kind {
            CompactionKind::Minor => MaskingScanner::for_compaction(merged, true, 0),
            CompactionKind::Major => {
                MaskingScanner::for_compaction(merged, false, self.max_versions)
            }
        };

        let tmp_path = self.output_path.with_extension("seg.tmp");
        let mut builder = SegmentBuilder::create(&tmp_path, self.index_interval)?;
        for cell in rewrite {
            builder.append(&cell?)?;
        }

        if builder.cell_count() == 0 {
            drop(builder);
            std::fs::remove_file(&tmp_path)?;
            info!(
                inputs = stats.input_segments,
                input_cells = stats.input_cells,
                "compaction dropped every cell"
            );
            return Ok((None, stats));
        }

        let meta = builder.finish()?;
        std::fs::rename(&tmp_path, &self.output_path)?;

        stats.output_cells = meta.cell_count;
        stats.output_bytes = meta.file_size;

        info!(
            kind = ?self.kind,
            inputs = stats.input_segments,
            input_cells = stats.input_cells,
            output_cells = stats.output_cells,
            output_bytes = stats.output_bytes,
            "compaction finished"
        );

        // Metadata still points at the temporary path; fix it up.
        Ok((
            Some(SegmentMeta {
                path: self.output_path.clone(),
                ..meta
            }),
            stats,
        ))
    }
}
