//! Doctor command - check environment

use anyhow::Result;
use console::style;
use std::path::Path;

use crate::config::{load_config, UserConfig, API_KEY_ENV_VARS};

pub fn run(config_path: Option<&Path>, cwd: &Path) -> Result<()> {
    println!("🩺 goodtooth Doctor\n");
    let mut ok = true;

    let config = match load_config(config_path, cwd) {
        Ok(config) => {
            println!("{} Configuration: OK", style("✓").green());
            Some(config)
        }
        Err(e) => {
            println!("{} Configuration: {}", style("✗").red(), e);
            ok = false;
            None
        }
    };

    let key_source = API_KEY_ENV_VARS
        .iter()
        .find(|name| std::env::var(name).is_ok_and(|v| !v.trim().is_empty()))
        .map(|name| format!("${}", name))
        .or_else(|| {
            config
                .as_ref()
                .and_then(|c| c.oracle.api_key.as_ref())
                .map(|_| "oracle.api_key".to_string())
        })
        .or_else(|| {
            UserConfig::load()
                .filter(|u| u.api_key().is_some())
                .and(UserConfig::user_config_path())
                .map(|p| p.display().to_string())
        });
    match key_source {
        Some(source) => println!("{} API key: from {}", style("✓").green(), source),
        None => {
            println!("{} API key: not found", style("✗").red());
            println!("  Set {} or run with oracle.api_key in goodtooth.toml", API_KEY_ENV_VARS[0]);
            ok = false;
        }
    }

    if let Some(config) = &config {
        match &config.listing.snapshot {
            Some(path) if path.exists() => {
                println!("{} Listing snapshot: {}", style("✓").green(), path.display())
            }
            Some(path) => {
                println!("{} Listing snapshot missing: {}", style("○").yellow(), path.display())
            }
            None => println!("{} Listing snapshot: none configured (pass --listing)", style("○").yellow()),
        }
        println!(
            "{} Station: {} ({})",
            style("✓").green(),
            config.station.name,
            config.station.coordinates()
        );
    }

    if ok {
        println!("\n✅ All checks passed!");
        Ok(())
    } else {
        anyhow::bail!("doctor found problems")
    }
}
