use crate::models::Coordinates;
use crate::oracle::{Oracle, OracleResult, RetryPolicy};

/// Resolves free-text addresses to coordinates.
#[derive(Clone, Copy)]
pub struct Geocoder<'a> {
    oracle: &'a dyn Oracle,
    retry: RetryPolicy,
}

impl<'a> Geocoder<'a> {
    pub fn new(oracle: &'a dyn Oracle, retry: RetryPolicy) -> Self {
        Self { oracle, retry }
    }

    /// Resolve `address`, retrying transient failures only. Zero results and
    /// malformed responses fail on the first attempt.
    pub fn resolve(&self, address: &str) -> OracleResult<Coordinates> {
        self.retry
            .run("geocode", || self.oracle.geocode(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{OracleError, TravelMode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyGeocoder {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl Oracle for FlakyGeocoder {
        fn geocode(&self, address: &str) -> OracleResult<Coordinates> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if address.is_empty() {
                return Err(OracleError::Geocode(address.to_string()));
            }
            if n < self.fail_first {
                return Err(OracleError::Fetch {
                    status: None,
                    message: "connection reset".into(),
                });
            }
            Ok(Coordinates::new(25.0, 121.0))
        }

        fn route_duration(&self, _: Coordinates, _: Coordinates, _: TravelMode) -> OracleResult<u32> {
            unreachable!("geocoder never routes")
        }
    }

    #[test]
    fn test_resolve_retries_transient() {
        let oracle = FlakyGeocoder {
            calls: AtomicUsize::new(0),
            fail_first: 2,
        };
        let geocoder = Geocoder::new(&oracle, RetryPolicy::new(2, std::time::Duration::ZERO));

        assert_eq!(geocoder.resolve("士林區"), Ok(Coordinates::new(25.0, 121.0)));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_resolve_zero_results_not_retried() {
        let oracle = FlakyGeocoder {
            calls: AtomicUsize::new(0),
            fail_first: 0,
        };
        let geocoder = Geocoder::new(&oracle, RetryPolicy::default());

        assert!(matches!(geocoder.resolve(""), Err(OracleError::Geocode(_))));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }
}
