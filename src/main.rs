//! # `datainsight` command-line entry point
//!
//! Every subcommand loads a CSV file into an [`Engine`](datainsight::engine::Engine),
//! runs one analysis or a pipeline spec, and prints the result. Analysis results are
//! printed as JSON on stdout; logs go to stderr and, when configured, to rolling files.
//!
//! ```bash
//! datainsight stats data.csv
//! datainsight cluster data.csv -k 4
//! datainsight run -i data.csv -p clean.json -o cleaned.csv
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)] // results are the program's output

mod cli;

use anyhow::{Context as _, Result};
use clap::Parser as _;
use datainsight::config::EngineSettings;
use datainsight::logging;
use std::path::PathBuf;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let settings = match &cli.config {
        Some(path) => EngineSettings::from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => EngineSettings::default(),
    };

    let log_dir = cli
        .log_dir
        .clone()
        .or_else(|| settings.log_dir.as_ref().map(PathBuf::from));
    logging::init(log_dir.as_deref())?;

    cli::run_command(cli.command, &settings)
}
