//! Lifecycle records and per-file history entries.

use serde::Serialize;
use std::fmt;
use std::time::SystemTime;

use crate::FileBlob;

/// Per-task failure taxonomy. Both kinds are non-fatal to a batch or run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionErrorKind {
    /// Codec reported failure, or the worker faulted.
    ConversionFailed,
    /// No reply within the task timeout.
    Timeout,
}

impl ConversionErrorKind {
    pub const ALL: [ConversionErrorKind; 2] =
        [ConversionErrorKind::ConversionFailed, ConversionErrorKind::Timeout];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionErrorKind::ConversionFailed => "CONVERSION_FAILED",
            ConversionErrorKind::Timeout => "TIMEOUT",
        }
    }

    /// Heading used in failure reports.
    pub fn label(&self) -> &'static str {
        match self {
            ConversionErrorKind::ConversionFailed => "CONVERSION FAILED",
            ConversionErrorKind::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for ConversionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Begin,
    Finish,
    Error,
}

/// One lifecycle event of a task.
#[derive(Clone, Debug)]
pub struct HistoryRecord {
    pub kind: RecordKind,
    pub timestamp: SystemTime,
    pub error_kind: Option<ConversionErrorKind>,
    pub message: Option<String>,
}

impl HistoryRecord {
    pub fn at(kind: RecordKind, timestamp: SystemTime) -> Self {
        Self {
            kind,
            timestamp,
            error_kind: None,
            message: None,
        }
    }

    pub fn begin() -> Self {
        Self::at(RecordKind::Begin, SystemTime::now())
    }

    pub fn finish() -> Self {
        Self::at(RecordKind::Finish, SystemTime::now())
    }

    pub fn error(kind: ConversionErrorKind, message: Option<String>) -> Self {
        Self {
            kind: RecordKind::Error,
            timestamp: SystemTime::now(),
            error_kind: Some(kind),
            message,
        }
    }
}

/// History of one source file, keyed by its name. Replaced wholesale on every update.
#[derive(Clone, Debug)]
pub struct ConversionHistoryEntry {
    pub source: FileBlob,
    pub converted: Option<FileBlob>,
    pub records: Vec<HistoryRecord>,
}

impl ConversionHistoryEntry {
    pub fn new(source: FileBlob) -> Self {
        Self {
            source,
            converted: None,
            records: Vec::new(),
        }
    }

    /// Entry with a BEGIN record stamped now.
    pub fn begun(source: FileBlob) -> Self {
        let mut entry = Self::new(source);
        entry.push(HistoryRecord::begin());
        entry
    }

    pub fn filename(&self) -> &str {
        &self.source.name
    }

    pub fn push(&mut self, record: HistoryRecord) {
        self.records.push(record);
    }

    pub fn first(&self, kind: RecordKind) -> Option<&HistoryRecord> {
        self.records.iter().find(|r| r.kind == kind)
    }

    /// Number of ERROR records of `kind`.
    pub fn error_count(&self, kind: ConversionErrorKind) -> u32 {
        self.records
            .iter()
            .filter(|r| r.kind == RecordKind::Error && r.error_kind == Some(kind))
            .count() as u32
    }
}
