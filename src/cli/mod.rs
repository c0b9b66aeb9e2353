//! CLI command definitions and handlers

mod doctor;
mod init;
mod rescore;
mod run;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use crate::config::{load_config, Config};
use crate::dataset::DatasetMode;
use crate::matrix::ProgressCallback;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// goodtooth - dental clinic enrichment
///
/// Geocodes a clinic listing, builds walking-time matrices against a
/// transit station, nearby clinics and schools, and writes a scored dataset.
#[derive(Parser, Debug)]
#[command(name = "goodtooth")]
#[command(
    version,
    about = "Geocode dental clinics, build walking-time matrices and score them",
    after_help = "\
Examples:
  goodtooth init                                 Write an example goodtooth.toml
  goodtooth run --listing data/listing.json      Scored dataset in data/goodtooth.json
  goodtooth run --mode separate --fail-fast      Legacy five-file layout, abort on first failure
  goodtooth rescore --data data --total-page 12  Rescore stored matrices without any API call
  goodtooth doctor                               Check API key and config"
)]
pub struct Cli {
    /// Config file (default: ./goodtooth.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example goodtooth.toml in the current directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Run the full pipeline over a listing snapshot
    Run {
        /// Listing snapshot JSON (default: listing.snapshot from config)
        #[arg(long, short = 'l')]
        listing: Option<PathBuf>,

        /// Artifact layout: inline or separate
        #[arg(long, value_parser = ["inline", "separate"])]
        mode: Option<String>,

        /// Output directory (default: output.dir from config)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Abort on the first failed lookup instead of marking it unresolved
        #[arg(long)]
        fail_fast: bool,

        /// Number of concurrent oracle calls (1-64)
        #[arg(long, value_parser = parse_workers)]
        workers: Option<usize>,

        /// Skip geocoding schools and the clinic-to-school matrix
        #[arg(long)]
        no_schools: bool,
    },

    /// Rebuild a scored dataset from stored separate-layout files
    Rescore {
        /// Directory holding clinics.json, nearByMRTs.json, nearByClinics.json
        #[arg(long, short = 'd')]
        data: PathBuf,

        /// Output directory (default: output.dir from config)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Page count to record in the dataset
        #[arg(long, default_value = "0")]
        total_page: u32,
    },

    /// Check API key and configuration
    Doctor,
}

/// Run the CLI. The single place where errors surface to the user.
pub fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;

    match cli.command {
        Commands::Init { force } => init::run(&cwd, force),

        Commands::Run {
            listing,
            mode,
            out,
            fail_fast,
            workers,
            no_schools,
        } => {
            let mut config = load(&cli.config, &cwd)?;
            if let Some(mode) = mode {
                config.output.mode = parse_mode(&mode);
            }
            if fail_fast {
                config.matrix.failure_mode = crate::matrix::FailureMode::FailFast;
            }
            if let Some(workers) = workers {
                config.matrix.workers = workers;
            }
            if no_schools {
                config.matrix.include_schools = false;
            }
            if let Some(out) = out {
                config.output.dir = out;
            }
            let listing = listing
                .or_else(|| config.listing.snapshot.clone())
                .context("No listing snapshot: pass --listing or set listing.snapshot")?;
            run::run(config, &listing)
        }

        Commands::Rescore {
            data,
            out,
            total_page,
        } => {
            let mut config = load(&cli.config, &cwd)?;
            if let Some(out) = out {
                config.output.dir = out;
            }
            rescore::run(config, &data, total_page)
        }

        Commands::Doctor => doctor::run(cli.config.as_deref(), &cwd),
    }
}

fn load(path: &Option<PathBuf>, cwd: &Path) -> Result<Config> {
    load_config(path.as_deref(), cwd).context("Failed to load configuration")
}

fn parse_mode(mode: &str) -> DatasetMode {
    match mode {
        "separate" => DatasetMode::Separate,
        _ => DatasetMode::Inline,
    }
}

/// Create bar progress style
fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
}

/// Drive `bar` from pipeline progress. One bar is reused for every stage.
fn bar_callback(bar: ProgressBar) -> ProgressCallback {
    Box::new(move |label: &str, done: usize, total: usize| {
        if bar.length() != Some(total as u64) {
            bar.set_length(total as u64);
        }
        bar.set_message(label.to_string());
        bar.set_position(done as u64);
    })
}
