//! Project-level configuration support
//!
//! Loads run configuration from `goodtooth.toml` in the working directory,
//! or from an explicit path given on the command line. Every field has a
//! default, so an absent file means "run with the historical settings".
//!
//! # Configuration Format
//!
//! ```toml
//! # goodtooth.toml
//!
//! [oracle]
//! timeout_secs = 10
//! max_retries = 2
//! backoff_ms = 500
//! requests_per_second = 5.0
//!
//! [station]
//! name = "MRT Shilin"
//! lat = 25.1008
//! lng = 121.52231
//!
//! [matrix]
//! workers = 4
//! failure_mode = "lenient"   # or "fail-fast"
//!
//! [scoring]
//! rule_order = ["transit", "density"]
//! transit = { threshold = 300 }
//! density = { threshold = 500 }
//!
//! [output]
//! mode = "inline"            # or "separate"
//! dir = "data"
//! ```

use super::{ConfigError, ConfigResult, UserConfig};
use crate::dataset::DatasetMode;
use crate::matrix::FailureMode;
use crate::models::Station;
use crate::oracle::RetryPolicy;
use crate::scoring::RuleKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// File name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "goodtooth.toml";

/// Environment variables checked for the oracle API key, in order
pub const API_KEY_ENV_VARS: &[&str] = &["HERE_API_KEY", "APIKey"];

/// Complete run configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub oracle: OracleConfig,
    pub station: Station,
    pub matrix: MatrixConfig,
    pub scoring: ScoringConfig,
    pub output: OutputConfig,
    pub listing: ListingConfig,
}

/// Oracle endpoints, query parameters and call budget
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OracleConfig {
    /// API key; environment variables take priority
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub geocode_url: String,
    pub route_url: String,
    /// Units parameter sent to the routing endpoint
    pub units: String,
    pub lang: String,
    /// Per-call timeout
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    /// Shared request budget across all workers; 0 disables the gate
    pub requests_per_second: f64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            geocode_url: "https://geocode.search.hereapi.com/v1/geocode".to_string(),
            route_url: "https://router.hereapi.com/v8/routes".to_string(),
            units: "imperial".to_string(),
            lang: "zh-tw".to_string(),
            timeout_secs: 10,
            max_retries: 2,
            backoff_ms: 500,
            requests_per_second: 5.0,
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.backoff_ms))
    }
}

/// Matrix construction settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MatrixConfig {
    /// Concurrent oracle calls (1-64)
    pub workers: usize,
    pub failure_mode: FailureMode,
    /// Geocode schools and build the clinic-to-school matrix
    pub include_schools: bool,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            failure_mode: FailureMode::default(),
            include_schools: true,
        }
    }
}

/// Scoring rules: thresholds, points, note templates and evaluation order.
///
/// Templates accept `{threshold}` and, for neighbour notes, `{name}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub rule_order: Vec<RuleKind>,
    pub transit: TransitRuleConfig,
    pub density: DensityRuleConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rule_order: vec![RuleKind::Transit, RuleKind::Density],
            transit: TransitRuleConfig::default(),
            density: DensityRuleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransitRuleConfig {
    /// Inclusive cutoff, compared against the routed duration in seconds
    pub threshold: u32,
    pub near_points: u32,
    pub far_points: u32,
    pub near_note: String,
    pub far_note: String,
    pub unresolved_note: String,
}

impl Default for TransitRuleConfig {
    fn default() -> Self {
        Self {
            threshold: 300,
            near_points: 5,
            far_points: 3,
            near_note: "within {threshold}m of a transit station".to_string(),
            far_note: "transit station beyond {threshold}m".to_string(),
            unresolved_note: "transit duration unresolved".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DensityRuleConfig {
    /// Inclusive cutoff, compared against the routed duration in seconds
    pub threshold: u32,
    /// No other clinic in range
    pub isolated_points: u32,
    /// Exactly one other clinic in range
    pub single_points: u32,
    /// More than one other clinic in range
    pub crowded_points: u32,
    pub neighbour_note: String,
}

impl Default for DensityRuleConfig {
    fn default() -> Self {
        Self {
            threshold: 500,
            isolated_points: 5,
            single_points: 3,
            crowded_points: 1,
            neighbour_note: "within {threshold} units of {name}".to_string(),
        }
    }
}

/// Where and how the artifact is written
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub mode: DatasetMode,
    pub dir: PathBuf,
    /// File name of the inline document
    pub file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: DatasetMode::default(),
            dir: PathBuf::from("data"),
            file: "goodtooth.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Names must contain this marker to count as a clinic
    pub clinic_marker: String,
    /// Listing snapshot used when `run` gets no `--listing`
    pub snapshot: Option<PathBuf>,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            clinic_marker: "診所".to_string(),
            snapshot: None,
        }
    }
}

impl Config {
    /// Check values serde cannot check on its own.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=64).contains(&self.matrix.workers) {
            return Err(ConfigError::Invalid(format!(
                "matrix.workers must be between 1 and 64, got {}",
                self.matrix.workers
            )));
        }
        if self.scoring.rule_order.is_empty() {
            return Err(ConfigError::Invalid(
                "scoring.rule_order must name at least one rule".to_string(),
            ));
        }
        for (i, kind) in self.scoring.rule_order.iter().enumerate() {
            if self.scoring.rule_order[..i].contains(kind) {
                return Err(ConfigError::Invalid(format!(
                    "scoring.rule_order lists '{}' twice",
                    kind
                )));
            }
        }
        if self.oracle.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "oracle.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the oracle API key from the environment, this config, or the
    /// user config, in that order.
    pub fn resolve_api_key(&self) -> ConfigResult<String> {
        let user = UserConfig::load();
        self.resolve_api_key_with(|name| std::env::var(name).ok(), user.as_ref())
    }

    pub fn resolve_api_key_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
        user: Option<&UserConfig>,
    ) -> ConfigResult<String> {
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| env(name))
            .chain(self.oracle.api_key.clone())
            .chain(user.and_then(|u| u.api_key().map(str::to_string)))
            .find(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey {
                env_var: API_KEY_ENV_VARS[0].to_string(),
            })
    }
}

/// Load configuration.
///
/// An explicit `path` must exist. Without one, `goodtooth.toml` in `dir` is
/// used when present and defaults otherwise.
pub fn load_config(path: Option<&Path>, dir: &Path) -> ConfigResult<Config> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if !candidate.exists() {
                debug!("No {} in {}, using defaults", CONFIG_FILE_NAME, dir.display());
                return Ok(Config::default());
            }
            candidate
        }
    };

    let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
        path: config_path.clone(),
        source,
    })?;
    let config = parse_config(&content).map_err(|e| match e {
        ConfigError::Parse { source, .. } => ConfigError::Parse {
            path: config_path.clone(),
            source,
        },
        other => other,
    })?;
    debug!("Loaded config from {}", config_path.display());
    Ok(config)
}

/// Parse and validate TOML configuration text.
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: PathBuf::from(CONFIG_FILE_NAME),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Example file written by `goodtooth init`
pub const EXAMPLE_CONFIG: &str = r#"# goodtooth configuration

[oracle]
# API key: prefer the HERE_API_KEY environment variable
# api_key = "..."
units = "imperial"
lang = "zh-tw"
timeout_secs = 10
max_retries = 2
backoff_ms = 500
requests_per_second = 5.0

[station]
name = "MRT Shilin"
lat = 25.1008
lng = 121.52231

[matrix]
workers = 4
# "lenient" marks failed pairs unresolved, "fail-fast" aborts the run
failure_mode = "lenient"
include_schools = true

[scoring]
rule_order = ["transit", "density"]

[scoring.transit]
threshold = 300
near_points = 5
far_points = 3

[scoring.density]
threshold = 500
isolated_points = 5
single_points = 3
crowded_points = 1

[output]
# "inline" writes one scored document, "separate" writes the five legacy files
mode = "inline"
dir = "data"
file = "goodtooth.json"

[listing]
clinic_marker = "診所"
# snapshot = "data/listing.json"
"#;
