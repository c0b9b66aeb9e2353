//! Leaf adapters over the oracle
//!
//! Each adapter wraps one oracle endpoint with the retry policy and the
//! small amount of policy the callers rely on (self-route short-circuit).
//! Adapters borrow the oracle and keep nothing between calls.

mod geocoder;
mod travel_time;

pub use geocoder::Geocoder;
pub use travel_time::TravelTime;
