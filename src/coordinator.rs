//! Run coordination: batching, memory budget, halts and caller notification.

use anyhow::Result;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use crate::batch::{Batcher, batch_size_for};
use crate::codec::CodecRegistry;
use crate::history::{ConversionErrorKind, HistoryLedger};
use crate::metrics::MetricsAggregator;
use crate::pipeline::{BatchOutcome, HaltHandle, WorkerPool};
use crate::utils::config::RunConsts;
use crate::utils::memory::{MemorySampler, SystemMemorySampler, default_budget};
use crate::{ConversionResult, ConversionSettings, ConversionTask, ConvertedPair, FileBlob};

/// Caller-side notifications. Every method defaults to a no-op.
///
/// The ledger and metrics are already updated when any of these is called.
pub trait ConversionEvents {
    fn batch_finished(
        &mut self,
        _successful: &[ConvertedPair],
        _failed: &[FileBlob],
        _metrics: &MetricsAggregator,
    ) {
    }

    /// At most once per run.
    fn canceled(&mut self) {}

    fn memory_exceeded(&mut self, _used_bytes: u64, _budget_bytes: u64) {}

    fn finished_with_errors(&mut self, _report: &FailureReport) {}
}

/// Events sink that ignores everything.
#[derive(Debug, Default)]
pub struct NoEvents;

impl ConversionEvents for NoEvents {}

/// Failed file names grouped by error kind. A file can appear under several kinds.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FailureReport {
    by_kind: BTreeMap<ConversionErrorKind, Vec<String>>,
}

impl FailureReport {
    /// Group `failed` names by the error kinds in their current metrics.
    pub fn from_metrics<I, S>(metrics: &MetricsAggregator, failed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_kind: BTreeMap<ConversionErrorKind, Vec<String>> = BTreeMap::new();
        for fm in metrics.metrics_for_many(failed) {
            for (kind, n) in fm.error_counts.iter() {
                if n > 0 {
                    by_kind
                        .entry(kind)
                        .or_default()
                        .push(fm.source_file_name.clone());
                }
            }
        }
        for names in by_kind.values_mut() {
            names.sort();
            names.dedup();
        }
        Self { by_kind }
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }

    pub fn files(&self, kind: ConversionErrorKind) -> &[String] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConversionErrorKind, &[String])> {
        self.by_kind.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// Distinct failed files across all kinds.
    pub fn file_count(&self) -> usize {
        self.by_kind
            .values()
            .flatten()
            .collect::<BTreeSet<_>>()
            .len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// No run has started yet.
    Idle,
    Running,
    /// Last run processed every batch.
    Completed,
    /// Last run was canceled or exceeded its memory budget.
    Halted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing to convert.
    Skipped,
    Completed,
    Canceled,
    MemoryExceeded { used_bytes: u64, budget_bytes: u64 },
}

impl RunOutcome {
    pub fn is_halted(&self) -> bool {
        matches!(
            self,
            RunOutcome::Canceled | RunOutcome::MemoryExceeded { .. }
        )
    }
}

/// Owns the worker pool and the history ledger (with its metrics) for a session.
pub struct ConversionCoordinator {
    pool: WorkerPool,
    ledger: HistoryLedger<MetricsAggregator>,
    sampler: Box<dyn MemorySampler>,
    state: RunState,
    failed_sources: BTreeSet<String>,
}

impl ConversionCoordinator {
    /// Pool of `workers` slots; memory is sampled from this process via sysinfo.
    pub fn new(workers: usize, codecs: Arc<CodecRegistry>) -> Result<Self> {
        Ok(Self {
            pool: WorkerPool::new(workers, codecs)?,
            ledger: HistoryLedger::with_listener(MetricsAggregator::new()),
            sampler: Box::new(SystemMemorySampler::new()),
            state: RunState::Idle,
            failed_sources: BTreeSet::new(),
        })
    }

    pub fn with_memory_sampler(mut self, sampler: Box<dyn MemorySampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Convert `tasks` in batches; blocks until the run completes or halts.
    ///
    /// Per-task failures never abort the run; they are recorded in the history
    /// and reported once at the end. Errors are infrastructure failures only.
    pub fn convert(
        &mut self,
        tasks: Vec<ConversionTask>,
        settings: &ConversionSettings,
        events: &mut dyn ConversionEvents,
    ) -> Result<RunOutcome> {
        if tasks.is_empty() {
            debug!("Nothing to convert");
            return Ok(RunOutcome::Skipped);
        }
        self.state = RunState::Running;
        self.failed_sources.clear();

        let outcome = match self.run(tasks, settings, events) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state = RunState::Halted;
                self.pool.reset_halt();
                return Err(e);
            }
        };

        let report = self.failure_report();
        if !report.is_empty() {
            warn!("{} files failed to convert", report.file_count());
            events.finished_with_errors(&report);
        }
        if outcome.is_halted() {
            self.state = RunState::Halted;
            // The halt is spent on this run; a later cancel starts fresh.
            self.pool.reset_halt();
            events.canceled();
        } else {
            self.state = RunState::Completed;
        }
        info!("Run finished: {:?}", outcome);
        Ok(outcome)
    }

    fn run(
        &mut self,
        tasks: Vec<ConversionTask>,
        settings: &ConversionSettings,
        events: &mut dyn ConversionEvents,
    ) -> Result<RunOutcome> {
        let timeout = settings
            .timeout
            .unwrap_or(Duration::from_millis(RunConsts::MAX_ALLOWED_TIMEOUT_MS));
        let budget = settings
            .memory_limit_bytes
            .or_else(|| self.sampler.heap_limit_bytes().map(default_budget));
        let total = tasks.len();
        let batcher = Batcher::new(tasks, batch_size_for(total));
        info!(
            "Converting {total} files in batches of {} ({} workers)",
            batcher.batch_size(),
            self.pool.size()
        );

        for (index, batch) in batcher.enumerate() {
            if let Some(budget_bytes) = budget
                && let Some(used_bytes) = self.sampler.used_bytes()
                && used_bytes > budget_bytes
            {
                warn!(
                    "Memory use {used_bytes} exceeds budget {budget_bytes}; halting before batch {}",
                    index + 1
                );
                events.memory_exceeded(used_bytes, budget_bytes);
                self.pool.halt_now()?;
                return Ok(RunOutcome::MemoryExceeded {
                    used_bytes,
                    budget_bytes,
                });
            }

            debug!("Batch {} with {} tasks", index + 1, batch.len());
            match self.pool.run_batch(batch, timeout)? {
                BatchOutcome::Finished { results, history } => {
                    self.ledger.replace_all(history);
                    let (successful, failed) = self.split_results(results);
                    events.batch_finished(&successful, &failed, self.ledger.listener());
                }
                BatchOutcome::Halted => {
                    info!("Run canceled during batch {}", index + 1);
                    return Ok(RunOutcome::Canceled);
                }
            }
        }
        Ok(RunOutcome::Completed)
    }

    fn split_results(
        &mut self,
        results: Vec<ConversionResult>,
    ) -> (Vec<ConvertedPair>, Vec<FileBlob>) {
        let mut successful = Vec::new();
        let mut failed = Vec::new();
        for result in results {
            match result.target {
                Some(target) => successful.push(ConvertedPair {
                    source: result.source,
                    target,
                }),
                None => {
                    self.failed_sources.insert(result.source.name.clone());
                    failed.push(result.source);
                }
            }
        }
        (successful, failed)
    }

    /// Failures of the current (or last) run, grouped by kind.
    pub fn failure_report(&self) -> FailureReport {
        FailureReport::from_metrics(self.metrics(), &self.failed_sources)
    }

    /// Halt the active run. Idempotent.
    ///
    /// Cancelling while idle notifies nobody; the pending halt cancels the
    /// next run before its first batch is dispatched.
    pub fn cancel(&self) {
        self.pool.halt_handle().halt();
    }

    /// Handle that cancels runs from another thread (e.g. a Ctrl+C handler).
    pub fn cancel_handle(&self) -> HaltHandle {
        self.pool.halt_handle()
    }

    pub fn clear_history_for<I, S>(&mut self, filenames: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ledger.clear_for(filenames);
    }

    pub fn clear_history(&mut self) {
        self.ledger.clear_all();
    }

    pub fn history(&self) -> &HistoryLedger<MetricsAggregator> {
        &self.ledger
    }

    pub fn metrics(&self) -> &MetricsAggregator {
        self.ledger.listener()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn worker_ids(&self) -> Vec<u64> {
        self.pool.worker_ids()
    }
}
