//! HERE platform oracle: geocode v1 and router v8
//!
//! Uses ureq (sync HTTP). Both endpoints go through one helper that gates
//! the request rate, performs the GET, checks the status and hands the JSON
//! body to a per-endpoint field extractor.
//!
//! Connection errors, timeouts and body read failures are `Fetch` errors
//! with no status, which the retry policy treats as transient. Only a body
//! that arrived in full but is not JSON is a `Parse` error.

use super::{Oracle, OracleError, OracleResult, RateLimiter, TravelMode};
use crate::config::OracleConfig;
use crate::models::Coordinates;
use serde_json::Value;
use std::time::Duration;
use tracing::trace;

pub struct HereOracle {
    config: OracleConfig,
    api_key: String,
    agent: ureq::Agent,
    limiter: RateLimiter,
}

fn make_agent(timeout: Duration) -> ureq::Agent {
    ureq::config::Config::builder()
        .http_status_as_error(false) // Status codes are classified below
        .timeout_global(Some(timeout))
        .build()
        .new_agent()
}

impl HereOracle {
    pub fn new(config: &OracleConfig, api_key: impl Into<String>) -> Self {
        Self {
            config: config.clone(),
            api_key: api_key.into(),
            agent: make_agent(config.timeout()),
            limiter: RateLimiter::per_second(config.requests_per_second),
        }
    }

    /// GET `url` with `query` plus the API key and return the parsed body.
    fn fetch_json(&self, url: &str, query: &[(&str, String)]) -> OracleResult<Value> {
        self.limiter.acquire();

        let mut req = self.agent.get(url);
        for (key, value) in query {
            req = req.query(*key, value);
        }
        trace!("GET {} {:?}", url, query);

        let response = req
            .query("apiKey", &self.api_key)
            .call()
            .map_err(|e| OracleError::Fetch {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_text = response.into_body().read_to_string().unwrap_or_default();
            return Err(OracleError::Fetch {
                status: Some(status),
                message: error_text,
            });
        }

        // A body that stalls or drops is a transport failure, not bad JSON.
        let text = response
            .into_body()
            .read_to_string()
            .map_err(|e| OracleError::Fetch {
                status: None,
                message: e.to_string(),
            })?;
        serde_json::from_str(&text).map_err(|e| OracleError::Parse(e.to_string()))
    }

    /// One oracle round trip: fetch, then extract the wanted field.
    fn call<T>(
        &self,
        url: &str,
        query: &[(&str, String)],
        extract: impl FnOnce(&Value) -> OracleResult<T>,
    ) -> OracleResult<T> {
        let body = self.fetch_json(url, query)?;
        extract(&body)
    }
}

impl Oracle for HereOracle {
    fn geocode(&self, address: &str) -> OracleResult<Coordinates> {
        let query = [("q", address.to_string())];
        self.call(&self.config.geocode_url, &query, |body| {
            parse_geocode(body, address)
        })
    }

    fn route_duration(
        &self,
        origin: Coordinates,
        destination: Coordinates,
        mode: TravelMode,
    ) -> OracleResult<u32> {
        let query = [
            ("transportMode", mode.as_query().to_string()),
            ("origin", origin.to_query()),
            ("destination", destination.to_query()),
            ("return", "travelSummary".to_string()),
            ("units", self.config.units.clone()),
            ("lang", self.config.lang.clone()),
        ];
        self.call(&self.config.route_url, &query, |body| {
            parse_route(body, origin, destination)
        })
    }
}

/// First element of the array at `key`, or `on_empty` when the array has
/// no elements. A missing or non-array `key` is a parse error.
fn first_item<'a>(
    body: &'a Value,
    key: &str,
    on_empty: impl FnOnce() -> OracleError,
) -> OracleResult<&'a Value> {
    let items = body
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| OracleError::Parse(format!("response has no '{}' list", key)))?;
    items.first().ok_or_else(on_empty)
}

fn parse_geocode(body: &Value, address: &str) -> OracleResult<Coordinates> {
    let item = first_item(body, "items", || OracleError::Geocode(address.to_string()))?;
    let field = |name: &str| {
        item.pointer(&format!("/position/{}", name))
            .and_then(Value::as_f64)
            .ok_or_else(|| OracleError::Parse(format!("geocode result has no position.{}", name)))
    };
    Ok(Coordinates::new(field("lat")?, field("lng")?))
}

fn parse_route(body: &Value, origin: Coordinates, destination: Coordinates) -> OracleResult<u32> {
    let route = first_item(body, "routes", || {
        OracleError::Route(format!("no routes from {} to {}", origin, destination))
    })?;
    let seconds = route
        .pointer("/sections/0/travelSummary/baseDuration")
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            OracleError::Route(format!(
                "route from {} to {} has no baseDuration",
                origin, destination
            ))
        })?;
    u32::try_from(seconds)
        .map_err(|_| OracleError::Parse(format!("baseDuration {} out of range", seconds)))
}
