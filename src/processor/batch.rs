//! Parallel batch processing over a worker pool
//!
//! Report generation processes whole result sets at once rather than one
//! live record at a time. This helper fans a record vector out across the
//! rayon pool, giving each worker its own [`WorkerContext`] so the match
//! caches stay unsynchronized, and collects the surviving records.

use rayon::prelude::*;

use super::{Disposition, RequestProcessor};
use crate::record::RequestRecord;

/// Result of processing one batch of records
#[derive(Debug)]
pub struct BatchSummary {
    /// Records that survived processing, renamed where rules matched
    pub kept: Vec<RequestRecord>,
    /// Number of records discarded by drop rules
    pub dropped: usize,
    /// Total number of records processed
    pub processed: usize,
}

/// Process a batch of records in parallel
///
/// Worker state is created per pool worker via `map_init`, so no lock is
/// taken on the per-record path. Records are independent; no ordering is
/// guaranteed between them.
pub fn process_batch(processor: &RequestProcessor, records: Vec<RequestRecord>) -> BatchSummary {
    let processed = records.len();
    let kept: Vec<RequestRecord> = records
        .into_par_iter()
        .map_init(
            || processor.new_worker_context(),
            |ctx, mut record| match processor.process(&mut record, ctx) {
                Disposition::Keep => Some(record),
                Disposition::Discard => None,
            },
        )
        .flatten()
        .collect();

    BatchSummary {
        dropped: processed - kept.len(),
        kept,
        processed,
    }
}
