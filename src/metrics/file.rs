//! Per-file metrics derived from one history entry.

use serde::Serialize;

use crate::history::{ConversionErrorKind, ConversionHistoryEntry, RecordKind};

/// Count of ERROR records per kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ErrorCounts {
    pub conversion_failed: u32,
    pub timeout: u32,
}

impl ErrorCounts {
    pub fn from_entry(entry: &ConversionHistoryEntry) -> Self {
        let mut counts = Self::default();
        for kind in ConversionErrorKind::ALL {
            *counts.slot_mut(kind) = entry.error_count(kind);
        }
        counts
    }

    pub fn get(&self, kind: ConversionErrorKind) -> u32 {
        match kind {
            ConversionErrorKind::ConversionFailed => self.conversion_failed,
            ConversionErrorKind::Timeout => self.timeout,
        }
    }

    fn slot_mut(&mut self, kind: ConversionErrorKind) -> &mut u32 {
        match kind {
            ConversionErrorKind::ConversionFailed => &mut self.conversion_failed,
            ConversionErrorKind::Timeout => &mut self.timeout,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConversionErrorKind, u32)> + '_ {
        ConversionErrorKind::ALL.into_iter().map(move |k| (k, self.get(k)))
    }

    pub fn total(&self) -> u32 {
        self.iter().map(|(_, n)| n).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    pub(crate) fn add(&mut self, other: &ErrorCounts) {
        for (kind, n) in other.iter() {
            *self.slot_mut(kind) += n;
        }
    }

    pub(crate) fn sub(&mut self, other: &ErrorCounts) {
        for (kind, n) in other.iter() {
            let slot = self.slot_mut(kind);
            *slot = slot.saturating_sub(n);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileMetrics {
    pub source_file_name: String,
    pub source_file_size: u64,
    /// Equals the source size when there is no converted file.
    pub converted_file_size: u64,
    pub size_change_percentage: f64,
    /// First BEGIN to first FINISH, in milliseconds.
    pub time_taken_ms: Option<u64>,
    pub success: bool,
    pub error_counts: ErrorCounts,
}

impl FileMetrics {
    pub fn from_entry(entry: &ConversionHistoryEntry) -> Self {
        let source_file_size = entry.source.size();
        let converted_file_size = entry
            .converted
            .as_ref()
            .map(|c| c.size())
            .unwrap_or(source_file_size);
        let error_counts = ErrorCounts::from_entry(entry);
        Self {
            source_file_name: entry.filename().to_string(),
            source_file_size,
            converted_file_size,
            size_change_percentage: size_change_percentage(source_file_size, converted_file_size),
            time_taken_ms: time_taken_ms(entry),
            success: error_counts.is_clean(),
            error_counts,
        }
    }

    /// Successful with a measured duration; only these feed the average and extremes.
    pub(crate) fn timed_success(&self) -> Option<u64> {
        if self.success { self.time_taken_ms } else { None }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `(source - converted) / source * 100`, two decimals; 0 for an empty source.
pub fn size_change_percentage(source: u64, converted: u64) -> f64 {
    if source == 0 {
        return 0.0;
    }
    round2((source as f64 - converted as f64) / source as f64 * 100.0)
}

fn time_taken_ms(entry: &ConversionHistoryEntry) -> Option<u64> {
    let begin = entry.first(RecordKind::Begin)?;
    let finish = entry.first(RecordKind::Finish)?;
    let elapsed = finish
        .timestamp
        .duration_since(begin.timestamp)
        .unwrap_or_default();
    Some(elapsed.as_millis() as u64)
}
