mod common;

use common::*;
use fileforge::FileBlob;
use fileforge::history::{
    ConversionErrorKind, ConversionHistoryEntry, HistoryLedger, HistoryListener, HistoryRecord,
    RecordKind,
};
use fileforge::metrics::{FileMetrics, MetricsAggregator, OverallMetrics, size_change_percentage};
use std::time::{Duration, SystemTime};

const MB: usize = 1024 * 1024;

/// Entry with BEGIN at a fixed instant, plus FINISH after `ms` and/or the given errors.
fn entry(
    name: &str,
    source_size: usize,
    converted_size: Option<usize>,
    ms: Option<u64>,
    errors: &[ConversionErrorKind],
) -> ConversionHistoryEntry {
    let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let mut e = ConversionHistoryEntry::new(blob(name, source_size));
    e.push(HistoryRecord::at(RecordKind::Begin, t0));
    for kind in errors {
        e.push(HistoryRecord::error(*kind, None));
    }
    if let Some(ms) = ms {
        e.push(HistoryRecord::at(
            RecordKind::Finish,
            t0 + Duration::from_millis(ms),
        ));
    }
    e.converted = converted_size.map(|n| FileBlob::new(name, JPEG, vec![0u8; n]));
    e
}

fn ok(name: &str, source_size: usize, converted_size: usize, ms: u64) -> ConversionHistoryEntry {
    entry(name, source_size, Some(converted_size), Some(ms), &[])
}

fn ledger() -> HistoryLedger<MetricsAggregator> {
    HistoryLedger::with_listener(MetricsAggregator::new())
}

fn overall(l: &HistoryLedger<MetricsAggregator>) -> OverallMetrics {
    l.listener().overall_metrics()
}

// --- per-file metrics ---

#[test]
fn test_size_change_ten_mb_to_two_mb_is_eighty_percent() {
    assert_eq!(size_change_percentage(10 * MB as u64, 2 * MB as u64), 80.0);
    let m = FileMetrics::from_entry(&ok("big.png", 10 * MB, 2 * MB, 40));
    assert_eq!(m.size_change_percentage, 80.0);
    assert_eq!(m.time_taken_ms, Some(40));
    assert!(m.success);
}

#[test]
fn test_size_change_rounds_to_two_decimals_and_handles_empty() {
    assert_eq!(size_change_percentage(3, 2), 33.33);
    assert_eq!(size_change_percentage(0, 10), 0.0);
    assert_eq!(size_change_percentage(100, 150), -50.0);
}

#[test]
fn test_converted_size_defaults_to_source_size() {
    let m = FileMetrics::from_entry(&entry(
        "x.png",
        500,
        None,
        None,
        &[ConversionErrorKind::Timeout],
    ));
    assert_eq!(m.converted_file_size, 500);
    assert_eq!(m.size_change_percentage, 0.0);
    assert_eq!(m.time_taken_ms, None);
    assert!(!m.success);
    assert_eq!(m.error_counts.timeout, 1);
}

// --- ledger semantics ---

#[derive(Default)]
struct Counting {
    added: usize,
    updated: usize,
    removed: Vec<String>,
    cleared: usize,
}

impl HistoryListener for Counting {
    fn entry_added(&mut self, _entry: &ConversionHistoryEntry) {
        self.added += 1;
    }
    fn entry_updated(&mut self, _entry: &ConversionHistoryEntry) {
        self.updated += 1;
    }
    fn entry_removed(&mut self, filename: &str) {
        self.removed.push(filename.to_string());
    }
    fn history_cleared(&mut self) {
        self.cleared += 1;
    }
}

#[test]
fn test_replace_notifies_added_then_updated() {
    let mut l = HistoryLedger::with_listener(Counting::default());
    l.replace(ok("a.png", 10, 5, 1));
    l.replace(ok("a.png", 10, 5, 2));
    l.replace(ok("b.png", 10, 5, 1));
    assert_eq!(l.len(), 2);
    assert_eq!(l.listener().added, 2);
    assert_eq!(l.listener().updated, 1);

    l.clear_for(["a.png"]);
    assert_eq!(l.listener().removed, vec!["a.png".to_string()]);
    l.clear_all();
    assert!(l.is_empty());
    assert_eq!(l.listener().cleared, 1);
}

#[test]
fn test_replace_does_not_merge_records() {
    let mut l = ledger();
    l.replace(entry(
        "a.png",
        100,
        None,
        None,
        &[ConversionErrorKind::ConversionFailed, ConversionErrorKind::ConversionFailed],
    ));
    l.replace(ok("a.png", 100, 40, 10));
    let stored = l.get("a.png").map(|e| e.records.len());
    assert_eq!(stored, Some(2));
    let o = overall(&l);
    assert_eq!(o.counters.success, 1);
    assert_eq!(o.counters.errors.conversion_failed, 0);
}

// --- overall metrics ---

#[test]
fn test_total_source_size_tracks_live_entries() {
    let mut l = ledger();
    let check = |l: &HistoryLedger<MetricsAggregator>| {
        let sum: u64 = l
            .listener()
            .all_file_metrics()
            .iter()
            .map(|m| m.source_file_size)
            .sum();
        assert_eq!(overall(l).total_source_size_in_bytes, sum);
    };
    l.replace(ok("a.png", 100, 50, 5));
    check(&l);
    l.replace(ok("b.png", 300, 100, 5));
    check(&l);
    l.replace(entry("c.png", 700, None, None, &[ConversionErrorKind::Timeout]));
    check(&l);
    l.replace(ok("b.png", 900, 100, 5));
    check(&l);
    l.clear_for(["a.png", "missing.png"]);
    check(&l);
    assert_eq!(overall(&l).total_source_size_in_bytes, 1600);
}

#[test]
fn test_average_and_extremes_follow_removals() {
    let mut l = ledger();
    l.replace(ok("a.png", 10, 5, 100));
    l.replace(ok("b.png", 10, 5, 300));
    l.replace(entry(
        "c.png",
        10,
        None,
        Some(900),
        &[ConversionErrorKind::ConversionFailed],
    ));
    let o = overall(&l);
    assert_eq!(o.average_conversion_time_ms, Some(200.0));
    assert_eq!(
        o.longest_conversion.map(|e| (e.source_file_name, e.time_taken_ms)),
        Some(("b.png".to_string(), 300))
    );
    assert_eq!(
        o.shortest_conversion.map(|e| e.source_file_name),
        Some("a.png".to_string())
    );

    l.clear_for(["b.png"]);
    let o = overall(&l);
    assert_eq!(o.average_conversion_time_ms, Some(100.0));
    assert_eq!(
        o.longest_conversion.map(|e| e.source_file_name),
        Some("a.png".to_string())
    );

    l.clear_for(["a.png"]);
    let o = overall(&l);
    assert_eq!(o.average_conversion_time_ms, None);
    assert!(o.longest_conversion.is_none());
    assert!(o.shortest_conversion.is_none());
}

#[test]
fn test_average_stays_exact_after_many_removals() {
    let mut l = ledger();
    l.replace(ok("keep.png", 10, 5, 333));
    let names: Vec<String> = (0..500).map(|i| format!("f{i}.png")).collect();
    for (i, name) in names.iter().enumerate() {
        l.replace(ok(name, 10, 5, 1 + (i as u64 * 7919) % 1000));
    }
    l.replace(ok("f7.png", 10, 5, 100));
    l.clear_for(names.iter().filter(|n| n.as_str() != "f7.png"));
    assert_eq!(overall(&l).average_conversion_time_ms, Some(216.5));

    l.clear_for(["f7.png"]);
    assert_eq!(overall(&l).average_conversion_time_ms, Some(333.0));
}

#[test]
fn test_extremes_tie_break_by_name() {
    let mut l = ledger();
    l.replace(ok("m.png", 10, 5, 50));
    l.replace(ok("b.png", 10, 5, 50));
    l.replace(ok("z.png", 10, 5, 50));
    let o = overall(&l);
    assert_eq!(
        o.longest_conversion.map(|e| e.source_file_name),
        Some("b.png".to_string())
    );
    assert_eq!(
        o.shortest_conversion.map(|e| e.source_file_name),
        Some("b.png".to_string())
    );
}

#[test]
fn test_counters_and_size_reduction() {
    let mut l = ledger();
    l.replace(ok("a.png", 1000, 400, 10));
    l.replace(ok("b.png", 1000, 1600, 10));
    l.replace(entry(
        "c.png",
        2000,
        None,
        None,
        &[ConversionErrorKind::Timeout],
    ));
    let o = overall(&l);
    assert_eq!(o.counters.success, 2);
    assert_eq!(o.counters.errors.timeout, 1);
    assert_eq!(o.total_source_size_in_bytes, 4000);
    assert_eq!(o.total_converted_size_in_bytes, 4000);
    assert_eq!(o.total_size_reduction.bytes, 0);

    l.clear_for(["a.png"]);
    let o = overall(&l);
    assert_eq!(o.total_size_reduction.bytes, -600);
    assert_eq!(o.total_size_reduction.percentage, -20.0);
}

#[test]
fn test_metrics_lookup_skips_unknown_names() {
    let mut l = ledger();
    l.replace(ok("b.png", 10, 5, 1));
    l.replace(ok("a.png", 10, 5, 1));
    let m = l.listener();
    assert!(m.metrics_for("nope.png").is_none());
    assert_eq!(m.metrics_for_many(["a.png", "nope.png"]).len(), 1);
    let names: Vec<&str> = m
        .all_file_metrics()
        .iter()
        .map(|f| f.source_file_name.as_str())
        .collect();
    assert_eq!(names, vec!["a.png", "b.png"]);
}

#[test]
fn test_clear_all_resets_to_zero_state() {
    let mut l = ledger();
    l.replace(ok("a.png", 10, 5, 1));
    l.replace(entry("b.png", 10, None, None, &[ConversionErrorKind::Timeout]));
    l.clear_all();
    assert_eq!(l.listener().file_count(), 0);
    assert_eq!(overall(&l), OverallMetrics::default());
}
