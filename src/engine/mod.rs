//! Engine module for the command-line front end

pub mod arg_parser;
pub mod cli;
pub mod files;
pub mod progress;
pub mod report;

pub use arg_parser::Cli;
pub use cli::{build_opts, handle_run};
pub use files::{collect_input_paths, load_sources, write_targets};
