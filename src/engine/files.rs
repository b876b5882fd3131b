//! Filesystem side of the CLI: collecting inputs, reading sources, writing targets.

use anyhow::{Context, Result};
use log::{debug, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::codec::media_type_for_path;
use crate::{ConvertedPair, FileBlob};

/// Media type used for files with an unknown extension.
const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

/// Expand inputs into file paths.
///
/// Files named explicitly are always kept (so unsupported ones are reported).
/// Directories are walked and only files with a known media type are kept.
/// `skip_dir` (the output directory) is never descended into.
pub fn collect_input_paths(inputs: &[PathBuf], skip_dir: Option<&Path>) -> Vec<PathBuf> {
    let skip = skip_dir.and_then(|d| d.canonicalize().ok());
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_file() {
            paths.push(input.clone());
            continue;
        }
        let walker = WalkDir::new(input)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir()
                    && skip.is_some()
                    && e.path().canonicalize().ok() == skip)
            });
        for entry_result in walker {
            match entry_result {
                Ok(entry) => {
                    if entry.file_type().is_file() && media_type_for_path(entry.path()).is_some() {
                        paths.push(entry.into_path());
                    }
                }
                Err(err) => {
                    warn!("Permission denied or error accessing path: {}", err);
                }
            }
        }
    }
    debug!("Collected {} input files", paths.len());
    paths
}

/// Read every path into a [`FileBlob`] in parallel, preserving order.
pub fn load_sources(paths: &[PathBuf]) -> Result<Vec<FileBlob>> {
    paths.par_iter().map(|p| read_source(p)).collect()
}

fn read_source(path: &Path) -> Result<FileBlob> {
    let data = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let media_type = media_type_for_path(path).unwrap_or(UNKNOWN_MEDIA_TYPE);
    Ok(FileBlob::new(name, media_type, data))
}

/// Write each converted file into `out_dir`. Returns the written paths.
pub fn write_targets(out_dir: &Path, pairs: &[ConvertedPair]) -> Result<Vec<PathBuf>> {
    if pairs.is_empty() {
        return Ok(Vec::new());
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create output directory {}", out_dir.display()))?;
    pairs
        .par_iter()
        .map(|pair| {
            let path = out_dir.join(&pair.target.name);
            std::fs::write(&path, pair.target.bytes())
                .with_context(|| format!("write {}", path.display()))?;
            Ok(path)
        })
        .collect()
}
