//! Dataset assembly and persistence
//!
//! The assembler owns the final, export-ready structure. It merges the
//! clinic list, optional schools and whichever matrices the chosen mode
//! needs, checks the schema invariants, and hands back an [`Artifact`] that
//! serializes to the exact documents the downstream page loads.
//!
//! # Modes
//!
//! - [`DatasetMode::Inline`]: one document with scores and notes folded into
//!   each clinic.
//! - [`DatasetMode::Separate`]: the earlier five-file layout (`clinics.json`,
//!   `nearByMRTs.json`, `nearByClinics.json`, `nearBySchools.json`,
//!   `schools.json`) with the raw matrices and no scores.
//!
//! Clinic order is always the scraping order; consumers sort client-side.

mod assembler;
mod writer;

pub use assembler::{
    Artifact, Assembler, DatasetParts, NearByRow, NearByStation, ScoredDataset,
    SeparateArtifacts, UnresolvedReport,
};
pub use writer::{read_separate, write_documents, PARTIAL_MARKER, SEPARATE_FILES, UNRESOLVED_FILE};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Artifact layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetMode {
    #[default]
    Inline,
    Separate,
}

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("{mode:?} dataset requires {what}")]
    Missing { mode: DatasetMode, what: &'static str },

    #[error("Clinic {id} is resolved but has no score")]
    Unscored { id: String },

    #[error("Duplicate clinic id: {0}")]
    DuplicateClinicId(String),

    #[error("{what} has {actual} origins, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{what} entry ({origin}, {destination}) is out of range")]
    OutOfRange {
        what: &'static str,
        origin: usize,
        destination: usize,
    },

    #[error("Failed to serialize dataset: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Stored dataset in {} was only partly written; rerun to regenerate it", path.display())]
    Incomplete { path: PathBuf },
}

pub type DatasetResult<T> = Result<T, DatasetError>;
