//! Run command - full enrichment from a listing snapshot

use anyhow::{Context, Result};
use console::style;
use indicatif::ProgressBar;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use super::{bar_callback, create_bar_style};
use crate::config::Config;
use crate::listing::JsonListingSource;
use crate::oracle::HereOracle;
use crate::pipeline::Pipeline;

pub fn run(config: Config, listing: &Path) -> Result<()> {
    let start = Instant::now();
    let api_key = config.resolve_api_key()?;
    let source = JsonListingSource::from_file(listing)?;

    println!("\n{} Enriching {}\n", style("🦷").bold(), style(listing.display()).cyan());

    let bar = ProgressBar::new(0);
    bar.set_style(create_bar_style());

    let oracle = Arc::new(HereOracle::new(&config.oracle, api_key));
    let out_dir = config.output.dir.clone();
    let out_file = config.output.file.clone();
    let pipeline = Pipeline::new(oracle, config)?.with_progress(bar_callback(bar.clone()));

    let output = pipeline.run_source(&source);
    bar.finish_and_clear();
    let output = output?;

    let written = output
        .artifact
        .write(&out_dir, &out_file)
        .with_context(|| format!("Failed to write dataset to {}", out_dir.display()))?;

    for path in &written {
        println!("{} Wrote {}", style("✓").green(), style(path.display()).cyan());
    }

    let summary = &output.summary;
    if summary.is_complete() {
        println!(
            "\n{} {} in {:.1}s",
            style("✅").green(),
            summary.summary(),
            start.elapsed().as_secs_f64()
        );
    } else {
        println!(
            "\n{} Incomplete dataset: {} in {:.1}s",
            style("⚠️ ").yellow(),
            summary.summary(),
            start.elapsed().as_secs_f64()
        );
    }
    Ok(())
}
