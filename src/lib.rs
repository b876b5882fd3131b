//! Fileforge: local batch file conversion on a bounded pool of isolated workers,
//! with per-file history and derived conversion metrics.

pub mod batch;
pub mod codec;
pub mod coordinator;
pub mod engine;
pub mod history;
pub mod metrics;
pub mod pipeline;
pub mod session;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use codec::{Codec, CodecRegistry};
pub use coordinator::{
    ConversionCoordinator, ConversionEvents, FailureReport, NoEvents, RunOutcome, RunState,
};
pub use session::{AddSourcesReport, ConversionSession};

/// Result alias used by public fileforge API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Convert `tasks` with the built-in image codecs and default settings.
///
/// Convenience for one-off runs; keep a [`ConversionCoordinator`] or
/// [`ConversionSession`] around to accumulate history across runs.
pub fn convert_files(
    tasks: Vec<ConversionTask>,
    settings: &ConversionSettings,
    events: &mut dyn ConversionEvents,
) -> Result<(RunOutcome, metrics::OverallMetrics)> {
    let mut coordinator = ConversionCoordinator::new(
        utils::config::PoolConsts::MAX_WORKERS,
        std::sync::Arc::new(CodecRegistry::images()),
    )?;
    let outcome = coordinator.convert(tasks, settings, events)?;
    Ok((outcome, coordinator.metrics().overall_metrics()))
}
