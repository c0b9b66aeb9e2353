//! Configuration module for goodtooth
//!
//! This module handles:
//! - Project-level run configuration (goodtooth.toml)
//! - User-level secrets (~/.config/goodtooth/config.toml)
//! - API key resolution from the environment

mod project_config;
mod user_config;

pub use project_config::{
    load_config, parse_config, Config, DensityRuleConfig, ListingConfig, MatrixConfig,
    OracleConfig, OutputConfig, ScoringConfig, TransitRuleConfig, API_KEY_ENV_VARS,
    CONFIG_FILE_NAME, EXAMPLE_CONFIG,
};
pub use user_config::UserConfig;

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating configuration. All of them are
/// fatal preconditions: the run never starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing API key: set {env_var} (or oracle.api_key in goodtooth.toml)")]
    MissingApiKey { env_var: String },

    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
