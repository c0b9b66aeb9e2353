//! User-level configuration for goodtooth
//!
//! Holds secrets that should not live in a project directory:
//! - ~/.config/goodtooth/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UserConfig {
    #[serde(default)]
    pub here: HereSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HereSection {
    /// HERE platform API key
    pub api_key: Option<String>,
}

impl UserConfig {
    /// Load the user config if one exists. Unreadable or malformed files are
    /// logged and ignored; the key can still come from the environment.
    pub fn load() -> Option<Self> {
        let path = Self::user_config_path().filter(|p| p.exists())?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };
        match toml::from_str::<UserConfig>(&content) {
            Ok(config) => {
                debug!("Loaded user config from {}", path.display());
                Some(config)
            }
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Get the user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("goodtooth").join("config.toml"))
    }

    pub fn api_key(&self) -> Option<&str> {
        self.here.api_key.as_deref()
    }
}
