//! Enrichment pipeline
//!
//! Drives a cleaned listing through every stage:
//! 1. Geocode clinics and schools
//! 2. Build the station, clinic and school duration matrices
//! 3. Score clinics (inline datasets only)
//! 4. Assemble the artifact
//!
//! The pipeline owns the abort-vs-continue decision. In fail-fast mode the
//! first per-record failure ends the run; in lenient mode the record is
//! marked unresolved and the run continues. Rejected credentials end the
//! run in either mode.

use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::adapters::{Geocoder, TravelTime};
use crate::config::{Config, ConfigError};
use crate::dataset::{
    Artifact, Assembler, DatasetError, DatasetMode, DatasetParts, SeparateArtifacts,
};
use crate::listing::{collect_listing, Listing, ListingError, ListingSource};
use crate::matrix::{FailureMode, MatrixBuilder, MatrixError, ProgressCallback};
use crate::models::{Clinic, Coordinates, School};
use crate::oracle::{Oracle, OracleError};
use crate::scoring::ScoringEngine;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to geocode {kind} #{index} ({address}): {source}")]
    Geocode {
        kind: &'static str,
        index: usize,
        address: String,
        #[source]
        source: OracleError,
    },

    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to start geocoding workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Counts from one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages: u32,
    pub clinics: usize,
    pub schools: usize,
    pub unresolved_clinics: usize,
    pub unresolved_schools: usize,
    pub unresolved_pairs: usize,
}

impl RunSummary {
    fn from_artifact(pages: u32, schools: usize, artifact: &Artifact) -> Self {
        let report = artifact.unresolved();
        Self {
            pages,
            clinics: artifact.clinics().len(),
            schools,
            unresolved_clinics: report.clinics.len(),
            unresolved_schools: report.schools.len(),
            unresolved_pairs: report.pair_count(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved_clinics == 0 && self.unresolved_schools == 0 && self.unresolved_pairs == 0
    }

    /// Get a summary string.
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} pages", self.pages),
            format!("{} clinics", self.clinics),
            format!("{} schools", self.schools),
        ];
        if !self.is_complete() {
            parts.push(format!(
                "unresolved: {} clinics, {} schools, {} pairs",
                self.unresolved_clinics, self.unresolved_schools, self.unresolved_pairs
            ));
        }
        parts.join(", ")
    }
}

/// Result of a run: the artifact plus its counts
#[derive(Debug)]
pub struct RunOutput {
    pub artifact: Artifact,
    pub summary: RunSummary,
}

/// Full enrichment pipeline.
pub struct Pipeline {
    oracle: Arc<dyn Oracle>,
    config: Config,
    progress: Option<ProgressCallback>,
}

impl Pipeline {
    /// Create a pipeline over `oracle`. Fails if `config` is invalid.
    pub fn new(oracle: Arc<dyn Oracle>, config: Config) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self {
            oracle,
            config,
            progress: None,
        })
    }

    /// Report progress as (stage label, completed, total).
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Collect the listing from `source`, then run.
    pub fn run_source(&self, source: &dyn ListingSource) -> PipelineResult<RunOutput> {
        let listing = collect_listing(source, &self.config.listing.clinic_marker)?;
        self.run(listing)
    }

    /// Run every stage over an already cleaned listing.
    pub fn run(&self, listing: Listing) -> PipelineResult<RunOutput> {
        let mode = self.config.output.mode;
        let include_schools = self.config.matrix.include_schools && !listing.schools.is_empty();
        info!(
            "Enriching {} clinics and {} schools ({:?} dataset, {:?})",
            listing.clinics.len(),
            if include_schools { listing.schools.len() } else { 0 },
            mode,
            self.config.matrix.failure_mode
        );

        let clinic_addresses: Vec<&str> = listing.clinics.iter().map(|c| c.address.as_str()).collect();
        let clinic_points = self.geocode_all("clinic", &clinic_addresses)?;
        let clinics: Vec<Clinic> = listing
            .clinics
            .into_iter()
            .zip(&clinic_points)
            .map(|(raw, point)| Clinic::from_raw(raw, *point))
            .collect();

        let schools: Option<Vec<School>> = if include_schools {
            let addresses: Vec<&str> = listing.schools.iter().map(|s| s.address.as_str()).collect();
            let points = self.geocode_all("school", &addresses)?;
            Some(
                listing
                    .schools
                    .into_iter()
                    .zip(points)
                    .map(|(raw, point)| School::from_raw(raw, point))
                    .collect(),
            )
        } else {
            None
        };

        let travel = TravelTime::new(self.oracle.as_ref(), self.config.oracle.retry_policy());
        let mut builder = MatrixBuilder::new(travel)
            .with_workers(self.config.matrix.workers)
            .with_failure_mode(self.config.matrix.failure_mode);
        if let Some(callback) = &self.progress {
            builder = builder.with_progress(callback);
        }

        let station = builder.to_single("station", &clinic_points, self.config.station.coordinates())?;
        let clinic_matrix = builder.pairwise("clinics", &clinic_points)?;
        let school_matrix = match &schools {
            Some(schools) => {
                let school_points: Vec<Option<Coordinates>> =
                    schools.iter().map(School::coordinates).collect();
                Some(builder.cross("schools", &clinic_points, &school_points)?)
            }
            None => None,
        };

        let clinics = match mode {
            DatasetMode::Inline => {
                ScoringEngine::new(&self.config.scoring).score_all(&clinics, &station, &clinic_matrix)
            }
            DatasetMode::Separate => clinics,
        };

        let school_count = schools.as_ref().map_or(0, Vec::len);
        let artifact = Assembler::new(mode).assemble(DatasetParts {
            total_page: listing.total_page,
            clinics,
            schools,
            station: Some(station),
            clinic_matrix: Some(clinic_matrix),
            school_matrix,
        })?;

        let summary = RunSummary::from_artifact(listing.total_page, school_count, &artifact);
        info!("Run finished: {}", summary.summary());
        Ok(RunOutput { artifact, summary })
    }

    /// Geocode `addresses` on the worker pool. Output order matches input.
    fn geocode_all(&self, kind: &'static str, addresses: &[&str]) -> PipelineResult<Vec<Option<Coordinates>>> {
        let geocoder = Geocoder::new(self.oracle.as_ref(), self.config.oracle.retry_policy());
        let lenient = self.config.matrix.failure_mode == FailureMode::Lenient;
        let total = addresses.len();
        let label = format!("geocode {}s", kind);
        debug!("Geocoding {} {} addresses", total, kind);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.matrix.workers)
            .build()?;

        let completed = AtomicUsize::new(0);
        let points: PipelineResult<Vec<Option<Coordinates>>> = pool.install(|| {
            addresses
                .par_iter()
                .enumerate()
                .map(|(index, address)| {
                    let result = geocoder.resolve(address);

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(callback) = &self.progress {
                        callback(label.as_str(), done, total);
                    }

                    match result {
                        Ok(point) => Ok(Some(point)),
                        Err(source) if lenient && !source.is_fatal() => {
                            warn!("Unresolved {} #{} ({}): {}", kind, index, address, source);
                            Ok(None)
                        }
                        Err(source) => Err(PipelineError::Geocode {
                            kind,
                            index,
                            address: address.to_string(),
                            source,
                        }),
                    }
                })
                .collect()
        });
        let points = points?;

        let unresolved = points.iter().filter(|p| p.is_none()).count();
        info!("Geocoded {}/{} {} addresses", total - unresolved, total, kind);
        Ok(points)
    }
}

/// Rebuild a scored inline dataset from a stored separate-layout artifact.
///
/// Makes no oracle calls: every duration comes from the stored matrices.
pub fn rescore(stored: SeparateArtifacts, total_page: u32, config: &Config) -> PipelineResult<RunOutput> {
    config.validate()?;
    let mut parts = stored.into_parts(total_page);
    let (Some(station), Some(matrix)) = (&parts.station, &parts.clinic_matrix) else {
        return Err(DatasetError::Missing {
            mode: DatasetMode::Inline,
            what: "stored station durations and clinic matrix",
        }
        .into());
    };

    parts.clinics = ScoringEngine::new(&config.scoring).score_all(&parts.clinics, station, matrix);
    let school_count = parts.schools.as_ref().map_or(0, Vec::len);

    let artifact = Assembler::new(DatasetMode::Inline).assemble(parts)?;
    let summary = RunSummary::from_artifact(total_page, school_count, &artifact);
    info!("Rescored stored dataset: {}", summary.summary());
    Ok(RunOutput { artifact, summary })
}
