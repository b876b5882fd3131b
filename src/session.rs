//! Conversion session: the source set, the chosen target format and converted files.

use anyhow::{Result, bail};
use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::codec::{CodecRegistry, FormatGuide, describe_media_type};
use crate::coordinator::{ConversionCoordinator, ConversionEvents, FailureReport, RunOutcome};
use crate::history::HistoryLedger;
use crate::metrics::{MetricsAggregator, file::round2};
use crate::pipeline::HaltHandle;
use crate::{ConversionSettings, ConversionTask, ConvertedPair, FileBlob, TargetFormat};

/// What [`ConversionSession::add_sources`] did with each incoming file.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AddSourcesReport {
    pub added: Vec<String>,
    /// Already present (or repeated in the same call).
    pub duplicates: Vec<String>,
    /// Not of the session's source type.
    pub dropped: Vec<String>,
}

/// One source type, one target format, at most one converted file per source.
pub struct ConversionSession {
    coordinator: ConversionCoordinator,
    sources: Vec<FileBlob>,
    source_type: Option<&'static str>,
    target_format: Option<TargetFormat>,
    /// Source name -> converted file.
    targets: HashMap<String, FileBlob>,
    settings: ConversionSettings,
}

impl ConversionSession {
    pub fn new(workers: usize, codecs: Arc<CodecRegistry>) -> Result<Self> {
        Ok(Self::with_coordinator(ConversionCoordinator::new(
            workers, codecs,
        )?))
    }

    pub fn with_coordinator(coordinator: ConversionCoordinator) -> Self {
        Self {
            coordinator,
            sources: Vec::new(),
            source_type: None,
            target_format: None,
            targets: HashMap::new(),
            settings: ConversionSettings::default(),
        }
    }

    /// Add files of the session's source type.
    ///
    /// The first addition fixes the source type: the only supported type
    /// present, or `preferred_type` when several are. Files of any other type
    /// are dropped and names already present are skipped.
    pub fn add_sources(
        &mut self,
        files: Vec<FileBlob>,
        preferred_type: Option<&str>,
    ) -> Result<AddSourcesReport> {
        let mut report = AddSourcesReport::default();
        if files.is_empty() {
            return Ok(report);
        }
        let allowed = match self.source_type {
            Some(t) if !self.sources.is_empty() => t,
            _ => {
                let chosen = choose_source_type(&files, preferred_type)?;
                debug!("Source type set to {chosen}");
                self.source_type = Some(chosen);
                chosen
            }
        };

        let mut known: HashSet<String> =
            self.sources.iter().map(|s| s.name.clone()).collect();
        for file in files {
            if file.media_type != allowed {
                report.dropped.push(file.name);
            } else if !known.insert(file.name.clone()) {
                report.duplicates.push(file.name);
            } else {
                report.added.push(file.name.clone());
                self.sources.push(file);
            }
        }
        info!(
            "Added {} sources ({} duplicates, {} dropped)",
            report.added.len(),
            report.duplicates.len(),
            report.dropped.len()
        );
        Ok(report)
    }

    /// Remove sources by name along with their targets and history.
    /// Removing the last source resets the session like [`Self::remove_all_sources`].
    pub fn remove_sources<I, S>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: HashSet<String> = names
            .into_iter()
            .map(|n| n.as_ref().to_string())
            .collect();
        let mut removed: Vec<String> = Vec::new();
        self.sources.retain(|s| {
            let keep = !names.contains(&s.name);
            if !keep {
                removed.push(s.name.clone());
            }
            keep
        });
        if self.sources.is_empty() {
            self.remove_all_sources();
            return removed.len();
        }
        for name in &removed {
            self.targets.remove(name);
        }
        self.coordinator.clear_history_for(&removed);
        debug!("Removed {} sources", removed.len());
        removed.len()
    }

    /// Drop every source, the source type, all targets, the target format and all history.
    pub fn remove_all_sources(&mut self) {
        self.sources.clear();
        self.source_type = None;
        self.targets.clear();
        self.target_format = None;
        self.coordinator.clear_history();
    }

    /// Remove every source that already has a converted file.
    pub fn remove_sources_with_targets(&mut self) -> usize {
        let converted: Vec<String> = self.targets.keys().cloned().collect();
        self.remove_sources(converted)
    }

    /// Choose the output format. Changing it discards converted files and clears
    /// the history; returns whether any converted files were discarded.
    pub fn select_target_format(&mut self, target: impl Into<TargetFormat>) -> Result<bool> {
        let target = target.into();
        let Some(source_type) = self.source_type else {
            bail!("Add sources before choosing a target format");
        };
        if !FormatGuide::get().is_valid_target(source_type, &target) {
            bail!(
                "{} files cannot be converted to {}",
                describe_media_type(source_type),
                target
            );
        }
        if self.target_format.as_ref() == Some(&target) {
            return Ok(false);
        }
        let discarded = !self.targets.is_empty();
        if discarded {
            info!(
                "Target format changed; discarding {} converted files",
                self.targets.len()
            );
        }
        self.targets.clear();
        self.target_format = Some(target);
        self.coordinator.clear_history();
        Ok(discarded)
    }

    /// Overwrite the settings fields set in `settings`.
    pub fn update_settings(&mut self, settings: &ConversionSettings) {
        self.settings.merge(settings);
    }

    /// Convert every source that has no converted file yet.
    pub fn convert_all(&mut self, events: &mut dyn ConversionEvents) -> Result<RunOutcome> {
        let pending: Vec<FileBlob> = self.sources.clone();
        self.convert_sources(pending, events)
    }

    pub fn convert_source(
        &mut self,
        name: &str,
        events: &mut dyn ConversionEvents,
    ) -> Result<RunOutcome> {
        let Some(source) = self.sources.iter().find(|s| s.name == name).cloned() else {
            bail!("Unknown source: {name}");
        };
        self.convert_sources(vec![source], events)
    }

    fn convert_sources(
        &mut self,
        files: Vec<FileBlob>,
        events: &mut dyn ConversionEvents,
    ) -> Result<RunOutcome> {
        let Some(target_format) = self.target_format.clone() else {
            bail!("No target format selected");
        };
        let tasks: Vec<ConversionTask> = files
            .into_iter()
            .filter(|f| !self.targets.contains_key(&f.name))
            .map(|f| ConversionTask::new(f, target_format.clone()))
            .collect();
        let mut collector = TargetCollector {
            targets: &mut self.targets,
            inner: events,
        };
        self.coordinator
            .convert(tasks, &self.settings, &mut collector)
    }

    /// Percentage of sources with a converted file, two decimals.
    pub fn progress(&self) -> f64 {
        if self.sources.is_empty() {
            return 0.0;
        }
        round2(self.targets.len() as f64 / self.sources.len() as f64 * 100.0)
    }

    pub fn sources(&self) -> &[FileBlob] {
        &self.sources
    }

    /// Converted files, in source order.
    pub fn targets(&self) -> Vec<ConvertedPair> {
        self.sources
            .iter()
            .filter_map(|s| {
                self.targets.get(&s.name).map(|t| ConvertedPair {
                    source: s.clone(),
                    target: t.clone(),
                })
            })
            .collect()
    }

    pub fn target_for(&self, source_name: &str) -> Option<&FileBlob> {
        self.targets.get(source_name)
    }

    pub fn source_type(&self) -> Option<&'static str> {
        self.source_type
    }

    pub fn target_format(&self) -> Option<&TargetFormat> {
        self.target_format.as_ref()
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &MetricsAggregator {
        self.coordinator.metrics()
    }

    pub fn history(&self) -> &HistoryLedger<MetricsAggregator> {
        self.coordinator.history()
    }

    pub fn failure_report(&self) -> FailureReport {
        self.coordinator.failure_report()
    }

    pub fn cancel_handle(&self) -> HaltHandle {
        self.coordinator.cancel_handle()
    }

    pub fn coordinator(&self) -> &ConversionCoordinator {
        &self.coordinator
    }
}

/// Pick the source type for a first addition.
fn choose_source_type(files: &[FileBlob], preferred: Option<&str>) -> Result<&'static str> {
    let guide = FormatGuide::get();
    let mut supported: BTreeSet<&'static str> = BTreeSet::new();
    let mut unsupported: BTreeSet<&str> = BTreeSet::new();
    for file in files {
        match guide.source(&file.media_type) {
            Some(spec) => {
                supported.insert(spec.media_type);
            }
            None => {
                unsupported.insert(&file.media_type);
            }
        }
    }
    match (supported.len(), supported.first()) {
        (0, _) => {
            let names: Vec<String> = unsupported
                .iter()
                .map(|t| describe_media_type(t))
                .collect();
            bail!("Unsupported file types: {}", names.join(", "))
        }
        (1, Some(only)) => Ok(*only),
        _ => match preferred.and_then(|p| guide.resolve_media_type(p)) {
            Some(p) if supported.contains(p) => Ok(p),
            _ => {
                let names: Vec<String> = supported
                    .iter()
                    .map(|t| describe_media_type(t))
                    .collect();
                bail!(
                    "Inputs mix several supported types ({}); choose one with --source-type",
                    names.join(", ")
                )
            }
        },
    }
}

/// Stores successful conversions as targets, then forwards to the caller.
struct TargetCollector<'a> {
    targets: &'a mut HashMap<String, FileBlob>,
    inner: &'a mut dyn ConversionEvents,
}

impl ConversionEvents for TargetCollector<'_> {
    fn batch_finished(
        &mut self,
        successful: &[ConvertedPair],
        failed: &[FileBlob],
        metrics: &MetricsAggregator,
    ) {
        for pair in successful {
            self.targets
                .insert(pair.source.name.clone(), pair.target.clone());
        }
        self.inner.batch_finished(successful, failed, metrics);
    }

    fn canceled(&mut self) {
        self.inner.canceled();
    }

    fn memory_exceeded(&mut self, used_bytes: u64, budget_bytes: u64) {
        self.inner.memory_exceeded(used_bytes, budget_bytes);
    }

    fn finished_with_errors(&mut self, report: &FailureReport) {
        self.inner.finished_with_errors(report);
    }
}
