//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    output_dir_name: String,
    worker_thread_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!(".{pkg}.toml"),
                output_dir_name: format!("{pkg}-out"),
                worker_thread_prefix: format!("{pkg}-worker"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Config file looked up in the working directory (CLI only).
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Default output directory for converted files.
    pub fn output_dir_name(&self) -> &str {
        &self.output_dir_name
    }

    /// Thread name for the worker with identity `id`.
    pub fn worker_thread_name(&self, id: u64) -> String {
        format!("{}-{id}", self.worker_thread_prefix)
    }
}

// ---- Worker pool ----

/// Worker pool sizing.
pub struct PoolConsts;

impl PoolConsts {
    /// Default number of worker slots (max conversions in flight).
    pub const MAX_WORKERS: usize = 3;
    /// Request channel capacity per worker. A slot never holds more than one task.
    pub const REQUEST_CHANNEL_CAP: usize = 1;
}

// ---- Run ----

/// Per-run defaults used by the coordinator.
pub struct RunConsts;

impl RunConsts {
    /// Timeout used when none is configured (24 h, effectively disabled).
    pub const MAX_ALLOWED_TIMEOUT_MS: u64 = 86_400_000;
    /// Share of the heap limit used as memory budget when none is configured.
    pub const MEMORY_BUDGET_FRACTION: f64 = 0.8;
    /// A run is split into roughly this many batches.
    pub const BATCH_DIVISOR: usize = 10;
}

// ---- Reporting ----

/// Decimal places used when formatting byte sizes in reports.
pub const BYTES_DECIMALS: usize = 2;
