//! Load `.fileforge.toml` from a directory (CLI only). Lib callers pass settings directly.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct FileforgeToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    to: Option<String>,
    out: Option<String>,
    source_type: Option<String>,
    timeout_ms: Option<u64>,
    memory_limit_mb: Option<u64>,
    workers: Option<usize>,
    json: Option<bool>,
    verbose: Option<bool>,
}

/// Load the config file from `dir` if present. Returns None if missing or unreadable.
pub fn load_fileforge_toml(dir: &Path) -> Option<FileforgeToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_fileforge_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

pub fn parse_fileforge_toml(s: &str) -> Result<FileforgeToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $opts:expr, $sec_field:ident => $opts_field:ident) => {
        if let Some(ref v) = $sec.$sec_field {
            $opts.$opts_field = Some(v.clone());
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI flags.
pub fn apply_file_to_opts(file: &FileforgeToml, opts: &mut Opts) {
    let sec = &file.settings;
    apply_file_opt!(sec, opts, to => target);
    apply_file_opt!(sec, opts, source_type => source_type);
    apply_file_opt!(sec, opts, timeout_ms => timeout_ms);
    apply_file_opt!(sec, opts, memory_limit_mb => memory_limit_mb);
    apply_file_opt!(sec, opts, workers => workers);
    if let Some(ref p) = sec.out {
        opts.out_dir = Some(PathBuf::from(p));
    }
    if let Some(v) = sec.json {
        opts.json = v;
    }
    if let Some(v) = sec.verbose {
        opts.verbose = v;
    }
}
