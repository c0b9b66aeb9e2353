//! Distance oracle: geocoding and pedestrian routing
//!
//! The oracle is the external HTTP service that answers "where is this
//! address" and "how long does it take to walk from A to B". Everything
//! else in the crate talks to it through the [`Oracle`] trait, so tests can
//! swap in a stub and the pipeline never depends on a concrete vendor.
//!
//! # Environment Variables
//!
//! - `HERE_API_KEY`: API key for [`HereOracle`]
//! - `APIKey`: legacy name, read when `HERE_API_KEY` is unset
//!
//! # Example
//!
//! ```rust,ignore
//! use goodtooth::oracle::{HereOracle, Oracle};
//!
//! let oracle = HereOracle::new(&config.oracle, api_key);
//! let position = oracle.geocode("臺北市士林區中正路1號")?;
//! ```

mod here;
mod rate_limit;
mod retry;

pub use here::HereOracle;
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;

use crate::models::Coordinates;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur talking to the oracle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    /// Transport failure or non-success HTTP status. `status` is `None` when
    /// no response was received (DNS, connect, timeout).
    #[error("Oracle request failed{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Fetch { status: Option<u16>, message: String },

    #[error("Failed to parse oracle response: {0}")]
    Parse(String),

    #[error("No geocoding results for address: {0}")]
    Geocode(String),

    #[error("No route available: {0}")]
    Route(String),
}

impl OracleError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::Fetch { status: None, .. } => true,
            OracleError::Fetch {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the failure means every further call will fail too
    /// (rejected credentials), so the run must stop regardless of mode.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OracleError::Fetch {
                status: Some(401 | 403),
                ..
            }
        )
    }
}

pub type OracleResult<T> = Result<T, OracleError>;

/// Travel mode requested from the routing endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    #[default]
    Pedestrian,
}

impl TravelMode {
    pub fn as_query(&self) -> &'static str {
        match self {
            TravelMode::Pedestrian => "pedestrian",
        }
    }
}

/// An external geocoding + routing service.
///
/// Implementations make exactly one outbound request per call and keep no
/// per-call state; retries and self-route short-circuits live in the
/// adapters built on top.
pub trait Oracle: Send + Sync {
    /// Resolve a free-text address to its first matching position.
    fn geocode(&self, address: &str) -> OracleResult<Coordinates>;

    /// Base travel duration in seconds from `origin` to `destination`.
    fn route_duration(
        &self,
        origin: Coordinates,
        destination: Coordinates,
        mode: TravelMode,
    ) -> OracleResult<u32>;
}
