//! Incrementally maintained metrics over the live history entries.

use log::debug;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use super::file::{ErrorCounts, FileMetrics, round2};
use crate::history::{ConversionHistoryEntry, HistoryListener};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversionExtreme {
    pub source_file_name: String,
    pub time_taken_ms: u64,
}

/// Source minus converted bytes; negative when outputs grew.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SizeReduction {
    pub bytes: i64,
    pub percentage: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Counters {
    pub success: u64,
    pub errors: ErrorCounts,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OverallMetrics {
    pub longest_conversion: Option<ConversionExtreme>,
    pub shortest_conversion: Option<ConversionExtreme>,
    pub average_conversion_time_ms: Option<f64>,
    pub total_converted_size_in_bytes: u64,
    pub total_source_size_in_bytes: u64,
    pub total_size_reduction: SizeReduction,
    pub counters: Counters,
}

/// Derived cache driven by [`HistoryListener`] callbacks. Never touches the ledger.
///
/// Counters, byte totals and the running average are updated on every change.
/// Extremes and size reduction are recomputed on read, only when something changed.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    files: HashMap<String, FileMetrics>,
    overall: RefCell<OverallMetrics>,
    /// Successful conversions with a measured duration (the running average's n).
    timed_samples: u64,
    /// Sum of their durations; the average is always `timed_total_ms / timed_samples`.
    timed_total_ms: u128,
    dirty: Cell<bool>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics_for(&self, filename: &str) -> Option<&FileMetrics> {
        self.files.get(filename)
    }

    /// Metrics for each known name; unknown names are skipped.
    pub fn metrics_for_many<I, S>(&self, filenames: I) -> Vec<&FileMetrics>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        filenames
            .into_iter()
            .filter_map(|n| self.files.get(n.as_ref()))
            .collect()
    }

    /// All live file metrics, sorted by name.
    pub fn all_file_metrics(&self) -> Vec<&FileMetrics> {
        let mut all: Vec<&FileMetrics> = self.files.values().collect();
        all.sort_by(|a, b| a.source_file_name.cmp(&b.source_file_name));
        all
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn overall_metrics(&self) -> OverallMetrics {
        if self.dirty.get() {
            self.recalculate();
        }
        self.overall.borrow().clone()
    }

    fn recalculate(&self) {
        let mut longest: Option<ConversionExtreme> = None;
        let mut shortest: Option<ConversionExtreme> = None;
        for m in self.files.values() {
            let Some(t) = m.timed_success() else {
                continue;
            };
            let name = &m.source_file_name;
            if longest.as_ref().is_none_or(|l| {
                t > l.time_taken_ms || (t == l.time_taken_ms && *name < l.source_file_name)
            }) {
                longest = Some(ConversionExtreme {
                    source_file_name: name.clone(),
                    time_taken_ms: t,
                });
            }
            if shortest.as_ref().is_none_or(|s| {
                t < s.time_taken_ms || (t == s.time_taken_ms && *name < s.source_file_name)
            }) {
                shortest = Some(ConversionExtreme {
                    source_file_name: name.clone(),
                    time_taken_ms: t,
                });
            }
        }

        let mut overall = self.overall.borrow_mut();
        overall.longest_conversion = longest;
        overall.shortest_conversion = shortest;
        let source = overall.total_source_size_in_bytes;
        let bytes = source as i64 - overall.total_converted_size_in_bytes as i64;
        let percentage = if source == 0 {
            0.0
        } else {
            round2(bytes as f64 / source as f64 * 100.0)
        };
        overall.total_size_reduction = SizeReduction { bytes, percentage };
        self.dirty.set(false);
    }

    fn fold_in(&mut self, m: &FileMetrics) {
        let overall = self.overall.get_mut();
        overall.total_source_size_in_bytes += m.source_file_size;
        overall.total_converted_size_in_bytes += m.converted_file_size;
        overall.counters.success += u64::from(m.success);
        overall.counters.errors.add(&m.error_counts);
        if let Some(t) = m.timed_success() {
            self.timed_samples += 1;
            self.timed_total_ms += u128::from(t);
            overall.average_conversion_time_ms =
                average(self.timed_total_ms, self.timed_samples);
        }
    }

    fn fold_out(&mut self, m: &FileMetrics) {
        let overall = self.overall.get_mut();
        overall.total_source_size_in_bytes = overall
            .total_source_size_in_bytes
            .saturating_sub(m.source_file_size);
        overall.total_converted_size_in_bytes = overall
            .total_converted_size_in_bytes
            .saturating_sub(m.converted_file_size);
        overall.counters.success = overall
            .counters
            .success
            .saturating_sub(u64::from(m.success));
        overall.counters.errors.sub(&m.error_counts);
        if let Some(t) = m.timed_success() {
            self.timed_samples = self.timed_samples.saturating_sub(1);
            self.timed_total_ms = self.timed_total_ms.saturating_sub(u128::from(t));
            overall.average_conversion_time_ms =
                average(self.timed_total_ms, self.timed_samples);
        }
    }

    fn upsert(&mut self, entry: &ConversionHistoryEntry) {
        let fresh = FileMetrics::from_entry(entry);
        if let Some(stale) = self.files.remove(entry.filename()) {
            self.fold_out(&stale);
        }
        self.fold_in(&fresh);
        self.files.insert(fresh.source_file_name.clone(), fresh);
        self.dirty.set(true);
    }
}

impl HistoryListener for MetricsAggregator {
    fn entry_added(&mut self, entry: &ConversionHistoryEntry) {
        self.upsert(entry);
    }

    fn entry_updated(&mut self, entry: &ConversionHistoryEntry) {
        self.upsert(entry);
    }

    fn entry_removed(&mut self, filename: &str) {
        if let Some(stale) = self.files.remove(filename) {
            self.fold_out(&stale);
            self.dirty.set(true);
        }
    }

    fn history_cleared(&mut self) {
        debug!("metrics reset ({} files dropped)", self.files.len());
        self.files.clear();
        *self.overall.get_mut() = OverallMetrics::default();
        self.timed_samples = 0;
        self.timed_total_ms = 0;
        self.dirty.set(false);
    }
}

fn average(total_ms: u128, samples: u64) -> Option<f64> {
    (samples > 0).then(|| total_ms as f64 / samples as f64)
}
