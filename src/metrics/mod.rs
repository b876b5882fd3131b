//! Conversion metrics derived from the history ledger.

pub mod aggregator;
pub mod file;

pub use aggregator::{ConversionExtreme, Counters, MetricsAggregator, OverallMetrics, SizeReduction};
pub use file::{ErrorCounts, FileMetrics, size_change_percentage};
