use crate::models::Coordinates;
use crate::oracle::{Oracle, OracleResult, RetryPolicy, TravelMode};

/// Resolves pedestrian travel durations between coordinate pairs.
#[derive(Clone, Copy)]
pub struct TravelTime<'a> {
    oracle: &'a dyn Oracle,
    retry: RetryPolicy,
    mode: TravelMode,
}

impl<'a> TravelTime<'a> {
    pub fn new(oracle: &'a dyn Oracle, retry: RetryPolicy) -> Self {
        Self {
            oracle,
            retry,
            mode: TravelMode::Pedestrian,
        }
    }

    pub fn mode(&self) -> TravelMode {
        self.mode
    }

    /// Travel duration in seconds. A point is zero seconds from itself; the
    /// oracle is not called for that case.
    pub fn duration(&self, origin: Coordinates, destination: Coordinates) -> OracleResult<u32> {
        if origin == destination {
            return Ok(0);
        }
        self.retry.run("route", || {
            self.oracle.route_duration(origin, destination, self.mode)
        })
    }
}
