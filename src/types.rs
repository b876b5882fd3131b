//! Public and internal types for the fileforge API and pipeline.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::history::ConversionErrorKind;

/// An in-memory file: name, media type and its bytes. Cloning shares the bytes.
#[derive(Clone, Debug)]
pub struct FileBlob {
    pub name: String,
    /// Media type, e.g. `image/png`.
    pub media_type: String,
    pub data: Arc<[u8]>,
}

impl FileBlob {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Media type a task converts toward, e.g. `image/jpeg`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetFormat(String);

impl TargetFormat {
    pub fn new(media_type: impl Into<String>) -> Self {
        Self(media_type.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Subtype part of the media type (`image/jpeg` -> `jpeg`).
    pub fn subtype(&self) -> &str {
        self.0.split_once('/').map(|(_, s)| s).unwrap_or(&self.0)
    }
}

impl From<&str> for TargetFormat {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TargetFormat {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One source paired with the format to convert it to. Consumed once.
#[derive(Clone, Debug)]
pub struct ConversionTask {
    pub source: FileBlob,
    pub target_format: TargetFormat,
}

impl ConversionTask {
    pub fn new(source: FileBlob, target_format: impl Into<TargetFormat>) -> Self {
        Self {
            source,
            target_format: target_format.into(),
        }
    }
}

/// Outcome of one task: a target on success, a failure kind otherwise.
#[derive(Clone, Debug)]
pub struct ConversionResult {
    pub source: FileBlob,
    pub target: Option<FileBlob>,
    pub failure: Option<ConversionErrorKind>,
}

impl ConversionResult {
    pub fn converted(source: FileBlob, target: FileBlob) -> Self {
        Self {
            source,
            target: Some(target),
            failure: None,
        }
    }

    pub fn failed(source: FileBlob, kind: ConversionErrorKind) -> Self {
        Self {
            source,
            target: None,
            failure: Some(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        self.target.is_some()
    }
}

/// A successful conversion as reported to callers.
#[derive(Clone, Debug)]
pub struct ConvertedPair {
    pub source: FileBlob,
    pub target: FileBlob,
}

/// Per-run settings. Omitted fields fall back to the run defaults
/// (effectively no timeout; 80% of the sampler's heap limit).
#[derive(Clone, Debug, Default)]
pub struct ConversionSettings {
    pub timeout: Option<Duration>,
    pub memory_limit_bytes: Option<u64>,
}

impl ConversionSettings {
    /// Overwrite fields that are set in `other`.
    pub fn merge(&mut self, other: &ConversionSettings) {
        if let Some(t) = other.timeout {
            self.timeout = Some(t);
        }
        if let Some(m) = other.memory_limit_bytes {
            self.memory_limit_bytes = Some(m);
        }
    }
}

/// Full options for the CLI (defaults, then `.fileforge.toml`, then flags).
#[derive(Clone, Debug, Default)]
pub struct Opts {
    /// Input files or directories.
    pub inputs: Vec<PathBuf>,
    /// Target media type (e.g. `image/png`) or extension (`png`).
    pub target: Option<String>,
    /// Source media type to keep when inputs mix several supported types.
    pub source_type: Option<String>,
    /// Output directory for converted files. When None, uses the package default.
    pub out_dir: Option<PathBuf>,
    /// Per-task timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Memory budget in megabytes.
    pub memory_limit_mb: Option<u64>,
    /// Worker slot count. When None, uses the pool default.
    pub workers: Option<usize>,
    /// Print metrics as JSON instead of the coloured summary.
    pub json: bool,
    /// Debug logging and progress bar.
    pub verbose: bool,
}

impl Opts {
    pub fn settings(&self) -> ConversionSettings {
        ConversionSettings {
            timeout: self.timeout_ms.map(Duration::from_millis),
            memory_limit_bytes: self
                .memory_limit_mb
                .map(|mb| mb.saturating_mul(1024 * 1024)),
        }
    }
}
