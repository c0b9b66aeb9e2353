//! Distance matrices
//!
//! Builds the travel-duration matrices the scoring and export stages read:
//!
//! - clinics → clinics (all ordered pairs, self-pairs skipped)
//! - clinics → schools (every pair across two lists)
//! - clinics → station (one duration per clinic)
//!
//! # Cost
//!
//! Every entry is one oracle call, so a matrix over N origins and M
//! destinations costs O(N×M) calls, and clinics-to-clinics costs N×(N−1).
//! This dominates the run time. The builder spreads calls over a bounded
//! worker pool and the oracle's rate gate keeps the pool within quota.
//!
//! # Determinism
//!
//! Tasks are enumerated origin-major in input order and results are
//! collected in that same order, so completion order never shows up in the
//! output.

mod builder;

pub use builder::{MatrixBuilder, ProgressCallback};

use crate::oracle::OracleError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// What to do when a single pair cannot be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureMode {
    /// Abort the whole run on the first failure
    FailFast,
    /// Record the pair as unresolved and keep going
    #[default]
    Lenient,
}

/// A matrix entry that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedPair {
    pub origin: usize,
    /// `None` for single-destination matrices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<usize>,
    pub reason: String,
}

fn pair_label(origin: &usize, destination: &Option<usize>) -> String {
    match destination {
        Some(d) => format!("pair ({}, {})", origin, d),
        None => format!("origin {}", origin),
    }
}

#[derive(Error, Debug)]
pub enum MatrixError {
    #[error("Failed to resolve duration for {}: {source}", pair_label(.origin, .destination))]
    Pair {
        origin: usize,
        destination: Option<usize>,
        #[source]
        source: OracleError,
    },

    #[error("Failed to start matrix workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl MatrixError {
    /// The oracle error behind a pair failure, if any
    pub fn oracle_error(&self) -> Option<&OracleError> {
        match self {
            MatrixError::Pair { source, .. } => Some(source),
            MatrixError::Pool(_) => None,
        }
    }
}

pub type MatrixResult<T> = Result<T, MatrixError>;

/// Directed durations keyed by (origin index, destination index)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DurationMatrix {
    origins: usize,
    destinations: usize,
    entries: BTreeMap<(usize, usize), u32>,
    unresolved: Vec<UnresolvedPair>,
}

impl DurationMatrix {
    pub fn new(origins: usize, destinations: usize) -> Self {
        Self {
            origins,
            destinations,
            ..Default::default()
        }
    }

    /// Rebuild a matrix from per-origin rows, as stored in the legacy
    /// `nearByClinics.json` layout.
    pub fn from_rows(destinations: usize, rows: Vec<BTreeMap<usize, u32>>) -> Self {
        let mut matrix = Self::new(rows.len(), destinations);
        for (origin, row) in rows.into_iter().enumerate() {
            for (destination, seconds) in row {
                matrix.insert(origin, destination, seconds);
            }
        }
        matrix
    }

    pub fn insert(&mut self, origin: usize, destination: usize, seconds: u32) {
        self.entries.insert((origin, destination), seconds);
    }

    pub fn mark_unresolved(&mut self, origin: usize, destination: usize, reason: impl Into<String>) {
        self.unresolved.push(UnresolvedPair {
            origin,
            destination: Some(destination),
            reason: reason.into(),
        });
    }

    pub fn get(&self, origin: usize, destination: usize) -> Option<u32> {
        self.entries.get(&(origin, destination)).copied()
    }

    /// All resolved durations out of `origin`, by destination index
    pub fn row(&self, origin: usize) -> BTreeMap<usize, u32> {
        self.entries
            .range((origin, 0)..=(origin, usize::MAX))
            .map(|(&(_, d), &s)| (d, s))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), u32)> + '_ {
        self.entries.iter().map(|(&k, &v)| (k, v))
    }

    pub fn origins(&self) -> usize {
        self.origins
    }

    pub fn destinations(&self) -> usize {
        self.destinations
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unresolved(&self) -> &[UnresolvedPair] {
        &self.unresolved
    }
}

/// One duration per origin to a single fixed destination
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationDurations {
    origins: usize,
    entries: BTreeMap<usize, u32>,
    unresolved: Vec<UnresolvedPair>,
}

impl StationDurations {
    pub fn new(origins: usize) -> Self {
        Self {
            origins,
            ..Default::default()
        }
    }

    /// Rebuild from a dense list, as stored in the legacy `nearByMRTs.json`.
    pub fn from_list(durations: Vec<u32>) -> Self {
        let mut station = Self::new(durations.len());
        for (origin, seconds) in durations.into_iter().enumerate() {
            station.insert(origin, seconds);
        }
        station
    }

    pub fn insert(&mut self, origin: usize, seconds: u32) {
        self.entries.insert(origin, seconds);
    }

    pub fn mark_unresolved(&mut self, origin: usize, reason: impl Into<String>) {
        self.unresolved.push(UnresolvedPair {
            origin,
            destination: None,
            reason: reason.into(),
        });
    }

    pub fn get(&self, origin: usize) -> Option<u32> {
        self.entries.get(&origin).copied()
    }

    pub fn origins(&self) -> usize {
        self.origins
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unresolved(&self) -> &[UnresolvedPair] {
        &self.unresolved
    }
}
