//! Request-rate gate shared by all matrix workers
//!
//! Each caller reserves the next free start slot under a lock, then sleeps
//! outside the lock until that slot arrives. Slots are `1 / rps` apart, so
//! concurrent workers together never exceed the configured rate.

use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RateLimiter {
    interval: Option<Duration>,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    /// Gate to at most `rps` request starts per second. Zero or a negative
    /// rate disables the gate.
    pub fn per_second(rps: f64) -> Self {
        let interval = (rps.is_finite() && rps > 0.0).then(|| Duration::from_secs_f64(1.0 / rps));
        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    pub fn unlimited() -> Self {
        Self::per_second(0.0)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Block until the caller may start its request.
    pub fn acquire(&self) {
        let wait = self.reserve(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }

    /// Reserve the next slot at or after `now` and return how long to wait.
    fn reserve(&self, now: Instant) -> Duration {
        let Some(interval) = self.interval else {
            return Duration::ZERO;
        };
        let mut next = self.next_slot.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = (*next).max(now);
        *next = slot + interval;
        slot.saturating_duration_since(now)
    }
}
