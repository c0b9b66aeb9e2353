//! goodtooth - dental clinic enrichment CLI
//!
//! Geocodes a scraped clinic listing, builds pedestrian travel-time matrices
//! and writes the scored dataset a static page loads.

use anyhow::Result;
use clap::Parser;
use goodtooth::cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("goodtooth={}", cli.log_level)));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli::run(cli)
}
