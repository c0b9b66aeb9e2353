//! Init command - write an example configuration

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use crate::config::{CONFIG_FILE_NAME, EXAMPLE_CONFIG};

/// Run the init command
pub fn run(dir: &Path, force: bool) -> Result<()> {
    println!("\n{} Initializing goodtooth\n", style("🦷").bold());

    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() && !force {
        println!(
            "{} Already initialized at {} (use --force to overwrite)",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
        return Ok(());
    }

    std::fs::write(&config_path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!(
        "{} Created {}",
        style("✓").green(),
        style(config_path.display()).cyan()
    );
    println!(
        "\nSet {} and run {}",
        style("HERE_API_KEY").yellow(),
        style("goodtooth run --listing <snapshot.json>").cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_writes_example_once() {
        let dir = tempdir().unwrap();
        run(dir.path(), false).unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), EXAMPLE_CONFIG);

        std::fs::write(&path, "# edited").unwrap();
        run(dir.path(), false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# edited");

        run(dir.path(), true).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), EXAMPLE_CONFIG);
    }
}
