//! Messages exchanged between the pool and its workers, and the batch outcome.

use crate::history::ConversionHistoryEntry;
use crate::{ConversionResult, FileBlob};

/// What a worker sends back for one dispatched task.
#[derive(Debug)]
pub enum WorkerReply {
    Converted(FileBlob),
    Failed(String),
}

/// Result of [`WorkerPool::run_batch`](super::WorkerPool::run_batch).
#[derive(Debug)]
pub enum BatchOutcome {
    /// Every task produced a result. `history` holds one entry per task.
    Finished {
        results: Vec<ConversionResult>,
        history: Vec<ConversionHistoryEntry>,
    },
    /// A halt intervened; the batch's results and history were dropped.
    Halted,
}
