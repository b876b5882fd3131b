//! Fileforge CLI: convert image files locally and report conversion metrics.

use anyhow::Result;
use clap::Parser;
use fileforge::engine::arg_parser::Cli;
use fileforge::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
