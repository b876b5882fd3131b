//! Run summary printing: coloured text or JSON.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use crate::coordinator::{FailureReport, RunOutcome};
use crate::history::ConversionErrorKind;
use crate::metrics::{FileMetrics, MetricsAggregator, OverallMetrics};
use crate::utils::config::BYTES_DECIMALS;
use crate::utils::{Colors, format_bytes};

#[derive(Serialize)]
struct RunReport<'a> {
    outcome: &'static str,
    overall: OverallMetrics,
    files: Vec<&'a FileMetrics>,
    failures: &'a FailureReport,
    written: &'a [PathBuf],
}

pub fn outcome_label(outcome: &RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Skipped => "skipped",
        RunOutcome::Completed => "completed",
        RunOutcome::Canceled => "canceled",
        RunOutcome::MemoryExceeded { .. } => "memory_exceeded",
    }
}

/// Pretty JSON with overall metrics, per-file metrics and failures.
pub fn metrics_json(
    outcome: &RunOutcome,
    metrics: &MetricsAggregator,
    failures: &FailureReport,
    written: &[PathBuf],
) -> Result<String> {
    let report = RunReport {
        outcome: outcome_label(outcome),
        overall: metrics.overall_metrics(),
        files: metrics.all_file_metrics(),
        failures,
        written,
    };
    serde_json::to_string_pretty(&report).context("serialize run report")
}

fn bytes(n: u64) -> String {
    format_bytes(n as i64, BYTES_DECIMALS)
}

pub fn print_summary(outcome: &RunOutcome, metrics: &MetricsAggregator, written: &[PathBuf]) {
    let overall = metrics.overall_metrics();
    println!("{}", Colors::colorize(Colors::HEADING, "Conversion summary"));
    println!("  Outcome:        {}", outcome_label(outcome));
    println!(
        "  Converted:      {}",
        Colors::colorize(Colors::SUCCESS, &overall.counters.success.to_string())
    );
    for (kind, n) in overall.counters.errors.iter() {
        let color = match kind {
            ConversionErrorKind::ConversionFailed => Colors::FAILURE,
            ConversionErrorKind::Timeout => Colors::TIMEOUT,
        };
        println!(
            "  {:<15} {}",
            format!("{}:", kind.label()),
            Colors::colorize(color, &n.to_string())
        );
    }
    if let Some(avg) = overall.average_conversion_time_ms {
        println!("  Average time:   {:.2} ms", avg);
    }
    if let Some(longest) = &overall.longest_conversion {
        println!(
            "  Longest:        {} ({} ms)",
            longest.source_file_name, longest.time_taken_ms
        );
    }
    if let Some(shortest) = &overall.shortest_conversion {
        println!(
            "  Shortest:       {} ({} ms)",
            shortest.source_file_name, shortest.time_taken_ms
        );
    }
    println!(
        "  Source size:    {}",
        bytes(overall.total_source_size_in_bytes)
    );
    println!(
        "  Converted size: {}",
        bytes(overall.total_converted_size_in_bytes)
    );
    println!(
        "  Reduction:      {} ({:.2}%)",
        format_bytes(overall.total_size_reduction.bytes, BYTES_DECIMALS),
        overall.total_size_reduction.percentage
    );
    if !written.is_empty() {
        println!("  Written:        {} files", written.len());
    }
}

pub fn print_failure_report(report: &FailureReport) {
    if report.is_empty() {
        return;
    }
    println!(
        "{}",
        Colors::colorize(Colors::FAILURE, "Some files failed to convert")
    );
    for (kind, files) in report.iter() {
        println!("  {}", kind.label());
        for name in files {
            println!("    - {}", name);
        }
    }
}
