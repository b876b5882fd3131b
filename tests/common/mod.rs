//! Shared fixtures: in-memory blobs, mock codecs, event recorder, memory sampler.
#![allow(dead_code)]

use anyhow::anyhow;
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use fileforge::codec::converted_file_name;
use fileforge::metrics::MetricsAggregator;
use fileforge::utils::MemorySampler;
use fileforge::{
    Codec, CodecRegistry, ConversionEvents, ConversionTask, ConvertedPair, FailureReport,
    FileBlob, TargetFormat,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const PNG: &str = "image/png";
pub const JPEG: &str = "image/jpeg";
pub const BMP: &str = "image/bmp";

pub fn blob(name: &str, size: usize) -> FileBlob {
    FileBlob::new(name, PNG, vec![7u8; size])
}

pub fn task(name: &str, size: usize, target: &str) -> ConversionTask {
    ConversionTask::new(blob(name, size), target)
}

/// `n` tasks named `f0.png`, `f1.png`, ... targeting JPEG.
pub fn tasks(n: usize) -> Vec<ConversionTask> {
    (0..n).map(|i| task(&format!("f{i}.png"), 100, JPEG)).collect()
}

/// Succeeds with half the source bytes.
pub fn halving_codec() -> Arc<dyn Codec> {
    Arc::new(
        |source: &FileBlob, target: &TargetFormat| -> anyhow::Result<FileBlob> {
            let half = source.bytes()[..source.bytes().len() / 2].to_vec();
            Ok(FileBlob::new(
                converted_file_name(&source.name, target),
                target.as_str(),
                half,
            ))
        },
    )
}

pub fn failing_codec(message: &'static str) -> Arc<dyn Codec> {
    Arc::new(
        move |_: &FileBlob, _: &TargetFormat| -> anyhow::Result<FileBlob> {
            Err(anyhow!(message))
        },
    )
}

pub fn panicking_codec() -> Arc<dyn Codec> {
    Arc::new(
        |source: &FileBlob, _: &TargetFormat| -> anyhow::Result<FileBlob> {
            panic!("decoder blew up on {}", source.name)
        },
    )
}

/// Codec that blocks until the gate is dropped. Reports each start on `started`.
pub struct Gate {
    pub started: Receiver<String>,
    _release: Sender<()>,
}

impl Gate {
    /// Let every blocked and future call return its error.
    pub fn release(self) {}
}

pub fn blocking_codec() -> (Arc<dyn Codec>, Gate) {
    let (started_tx, started_rx) = unbounded::<String>();
    let (release_tx, release_rx) = bounded::<()>(0);
    let codec = move |source: &FileBlob, _: &TargetFormat| -> anyhow::Result<FileBlob> {
        let _ = started_tx.send(source.name.clone());
        let _ = release_rx.recv();
        Err(anyhow!("released"))
    };
    (
        Arc::new(codec),
        Gate {
            started: started_rx,
            _release: release_tx,
        },
    )
}

/// Same codec for every image target.
pub fn registry(codec: Arc<dyn Codec>) -> Arc<CodecRegistry> {
    Arc::new(CodecRegistry::uniform(codec, [PNG, JPEG, BMP]))
}

/// Records every event for later assertions.
#[derive(Default)]
pub struct Recorder {
    /// (successful source names, failed source names) per batch.
    pub batches: Vec<(Vec<String>, Vec<String>)>,
    pub canceled: usize,
    pub memory: Vec<(u64, u64)>,
    pub reports: Vec<FailureReport>,
    /// Success counter as seen from inside each `batch_finished`.
    pub success_seen: Vec<u64>,
}

impl ConversionEvents for Recorder {
    fn batch_finished(
        &mut self,
        successful: &[ConvertedPair],
        failed: &[FileBlob],
        metrics: &MetricsAggregator,
    ) {
        let mut ok: Vec<String> = successful.iter().map(|p| p.source.name.clone()).collect();
        let mut bad: Vec<String> = failed.iter().map(|f| f.name.clone()).collect();
        ok.sort();
        bad.sort();
        self.batches.push((ok, bad));
        self.success_seen
            .push(metrics.overall_metrics().counters.success);
    }

    fn canceled(&mut self) {
        self.canceled += 1;
    }

    fn memory_exceeded(&mut self, used_bytes: u64, budget_bytes: u64) {
        self.memory.push((used_bytes, budget_bytes));
    }

    fn finished_with_errors(&mut self, report: &FailureReport) {
        self.reports.push(report.clone());
    }
}

/// Reports `low` bytes until call `high_from_call` (0-based), then `high`.
pub struct StepSampler {
    pub calls: Arc<AtomicUsize>,
    pub high_from_call: usize,
    pub low: u64,
    pub high: u64,
    pub heap_limit: Option<u64>,
}

impl MemorySampler for StepSampler {
    fn used_bytes(&mut self) -> Option<u64> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Some(if n >= self.high_from_call {
            self.high
        } else {
            self.low
        })
    }

    fn heap_limit_bytes(&mut self) -> Option<u64> {
        self.heap_limit
    }
}
