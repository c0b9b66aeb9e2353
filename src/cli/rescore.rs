//! Rescore command - rebuild scores from stored matrices

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use crate::config::Config;
use crate::dataset::read_separate;
use crate::pipeline::rescore;

pub fn run(config: Config, data: &Path, total_page: u32) -> Result<()> {
    let stored = read_separate(data)
        .with_context(|| format!("Failed to read stored dataset from {}", data.display()))?;
    let output = rescore(stored, total_page, &config)?;

    let written = output.artifact.write(&config.output.dir, &config.output.file)?;
    for path in &written {
        println!("{} Wrote {}", style("✓").green(), style(path.display()).cyan());
    }
    println!("{} Rescored {}", style("✅").green(), output.summary.summary());
    Ok(())
}
