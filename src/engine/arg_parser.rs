use clap::Parser;
use std::path::PathBuf;

struct DefaultArgs;

impl DefaultArgs {
    pub const INPUT: &'static str = ".";
}

/// Local batch file converter with per-file timeouts and conversion metrics.
#[derive(Clone, Parser)]
#[command(name = "fileforge")]
#[command(about = "Convert image files locally; prints per-run conversion metrics.")]
pub struct Cli {
    /// Files or directories to convert. Directories are walked recursively. Default: current directory.
    #[arg(value_name = "INPUTS", default_value = DefaultArgs::INPUT)]
    pub inputs: Vec<PathBuf>,

    /// Target format: media type (image/jpeg) or extension (jpeg, png, bmp).
    #[arg(long, short = 't')]
    pub to: Option<String>,

    /// Output directory for converted files. Default: `fileforge-out` in the working directory.
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Per-file timeout in milliseconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: Option<u64>,

    /// Memory budget in megabytes. Default: 80% of system memory.
    #[arg(long, short = 'm', value_parser = clap::value_parser!(u64).range(1..))]
    pub memory_limit_mb: Option<u64>,

    /// Number of concurrent conversion workers.
    #[arg(long, short = 'w', value_parser = clap::value_parser!(usize))]
    pub workers: Option<usize>,

    /// Source type to keep when inputs mix several supported types.
    #[arg(long, short = 's')]
    pub source_type: Option<String>,

    /// Print metrics as JSON instead of the coloured summary.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub json: Option<bool>,

    /// Verbose output (debug logs and a progress bar).
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
