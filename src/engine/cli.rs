//! CLI command handler: load inputs, convert them, write targets, print the report.

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Opts;
use crate::codec::{CodecRegistry, FormatGuide, describe_media_type};
use crate::coordinator::{ConversionEvents, FailureReport, RunOutcome};
use crate::engine::arg_parser::Cli;
use crate::engine::files::{collect_input_paths, load_sources, write_targets};
use crate::engine::progress::{
    ProgressBar, finish_progress, setup_progress, update_progress_bar,
};
use crate::engine::report::{metrics_json, print_failure_report, print_summary};
use crate::metrics::MetricsAggregator;
use crate::session::ConversionSession;
use crate::utils::config::{PackagePaths, PoolConsts};
use crate::utils::{apply_file_to_opts, bytes_to_mb, load_fileforge_toml, setup_logging};
use crate::{ConvertedPair, FileBlob};

/// Exit status for a second Ctrl+C (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Defaults, then `.fileforge.toml` in the working directory, then CLI flags.
pub fn build_opts(cli: &Cli) -> Opts {
    let mut opts = Opts::default();
    if let Ok(cwd) = std::env::current_dir()
        && let Some(file) = load_fileforge_toml(&cwd)
    {
        apply_file_to_opts(&file, &mut opts);
    }
    opts.inputs = cli.inputs.clone();
    if cli.to.is_some() {
        opts.target = cli.to.clone();
    }
    if cli.out.is_some() {
        opts.out_dir = cli.out.clone();
    }
    if cli.source_type.is_some() {
        opts.source_type = cli.source_type.clone();
    }
    if cli.timeout_ms.is_some() {
        opts.timeout_ms = cli.timeout_ms;
    }
    if cli.memory_limit_mb.is_some() {
        opts.memory_limit_mb = cli.memory_limit_mb;
    }
    if cli.workers.is_some() {
        opts.workers = cli.workers;
    }
    if let Some(v) = cli.json {
        opts.json = v;
    }
    if let Some(v) = cli.verbose {
        opts.verbose = v;
    }
    opts
}

/// Events sink for the CLI: drives the progress bar and logs run-level events.
struct CliEvents {
    bar: Option<ProgressBar>,
}

impl ConversionEvents for CliEvents {
    fn batch_finished(
        &mut self,
        successful: &[ConvertedPair],
        failed: &[FileBlob],
        _metrics: &MetricsAggregator,
    ) {
        if let Some(bar) = &self.bar {
            update_progress_bar(bar, successful.len() + failed.len());
        }
    }

    fn canceled(&mut self) {
        warn!("Conversion canceled; remaining files were not converted");
    }

    fn memory_exceeded(&mut self, used_bytes: u64, budget_bytes: u64) {
        warn!(
            "Memory use {} MB exceeds the {} MB budget",
            bytes_to_mb(used_bytes),
            bytes_to_mb(budget_bytes)
        );
    }

    fn finished_with_errors(&mut self, report: &FailureReport) {
        debug!("{} files failed", report.file_count());
    }
}

/// Run a conversion from CLI arguments.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = build_opts(cli);
    setup_logging(opts.verbose);
    debug!(
        "{} CONFIG:{:#?}",
        PackagePaths::get().pkg_name().to_uppercase(),
        opts
    );

    let target = opts
        .target
        .as_deref()
        .ok_or_else(|| anyhow!("No target format; pass --to or set `to` in the config file"))?;
    let target = FormatGuide::get()
        .resolve_media_type(target)
        .with_context(|| format!("Unsupported target format: {target}"))?;
    let out_dir = opts
        .out_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(PackagePaths::get().output_dir_name()));

    let paths = collect_input_paths(&opts.inputs, Some(&out_dir));
    if paths.is_empty() {
        bail!("No convertible files found in the given inputs");
    }
    let sources = load_sources(&paths)?;

    let workers = opts.workers.unwrap_or(PoolConsts::MAX_WORKERS);
    let mut session = ConversionSession::new(workers, Arc::new(CodecRegistry::images()))?;
    let added = session.add_sources(sources, opts.source_type.as_deref())?;
    if !added.duplicates.is_empty() {
        warn!("Files already added: {}", added.duplicates.join(", "));
    }
    if !added.dropped.is_empty() {
        let kept = session.source_type().unwrap_or_default();
        warn!(
            "{} files that were not {} were not added",
            added.dropped.len(),
            describe_media_type(kept)
        );
    }
    session.select_target_format(target)?;
    session.update_settings(&opts.settings());

    // First Ctrl+C cancels the run (even before it starts); a second one exits.
    let cancel = session.cancel_handle();
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_handler = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        if interrupted_handler.swap(true, Ordering::SeqCst) {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
        cancel.halt();
    })
    .context("set Ctrl+C handler")?;

    let mut events = CliEvents {
        bar: setup_progress(opts.verbose, session.sources().len()),
    };
    let outcome = session.convert_all(&mut events)?;
    finish_progress(&events.bar);

    if interrupted.load(Ordering::SeqCst) {
        info!("Interrupted; writing converted files (Ctrl+C again to stop)");
    }
    let written = write_targets(&out_dir, &session.targets())?;
    info!("Wrote {} files to {}", written.len(), out_dir.display());

    let failures = session.failure_report();
    if opts.json {
        println!(
            "{}",
            metrics_json(&outcome, session.metrics(), &failures, &written)?
        );
    } else {
        print_summary(&outcome, session.metrics(), &written);
        print_failure_report(&failures);
    }

    match outcome {
        RunOutcome::Canceled => Err(anyhow!(
            "Conversion cancelled by user; converted files were written"
        )),
        RunOutcome::MemoryExceeded { budget_bytes, .. } => Err(anyhow!(
            "Memory budget of {} MB exceeded; converted files were written",
            bytes_to_mb(budget_bytes)
        )),
        RunOutcome::Skipped | RunOutcome::Completed => Ok(()),
    }
}
