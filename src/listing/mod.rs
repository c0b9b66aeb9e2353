//! Listing source
//!
//! The listing source yields raw clinic records one page at a time plus the
//! school list. Scraping the government pages lives outside this crate; what
//! ships here is a reader for JSON snapshots of those pages and the record
//! clean-up every listing goes through before geocoding.

mod normalize;

pub use normalize::{is_clinic_name, normalize_clinic_address, normalize_school_address};

use crate::models::{RawClinic, RawSchool};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Failed to read listing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse listing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Listing page {page} out of range (total {total})")]
    PageOutOfRange { page: u32, total: u32 },

    #[error("Listing source unavailable: {0}")]
    Unavailable(String),
}

pub type ListingResult<T> = Result<T, ListingError>;

/// Something that can hand out scraped listing pages
pub trait ListingSource {
    /// Page count as reported by the source
    fn total_pages(&self) -> ListingResult<u32>;

    /// Raw clinic rows of page `index` (zero based)
    fn page(&self, index: u32) -> ListingResult<Vec<RawClinic>>;

    fn schools(&self) -> ListingResult<Vec<RawSchool>>;
}

/// Snapshot file layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingSnapshot {
    /// Falls back to `pages.len()` when absent
    #[serde(default)]
    pub total_page: Option<u32>,
    #[serde(default)]
    pub pages: Vec<Vec<RawClinic>>,
    #[serde(default)]
    pub schools: Vec<RawSchool>,
}

/// Listing source backed by a JSON snapshot
#[derive(Debug, Clone)]
pub struct JsonListingSource {
    snapshot: ListingSnapshot,
}

impl JsonListingSource {
    pub fn new(snapshot: ListingSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_file(path: &Path) -> ListingResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ListingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot = serde_json::from_str(&content).map_err(|source| ListingError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded listing snapshot from {}", path.display());
        Ok(Self::new(snapshot))
    }
}

impl ListingSource for JsonListingSource {
    fn total_pages(&self) -> ListingResult<u32> {
        Ok(self
            .snapshot
            .total_page
            .unwrap_or(self.snapshot.pages.len() as u32))
    }

    fn page(&self, index: u32) -> ListingResult<Vec<RawClinic>> {
        // A snapshot may report more pages than it captured; missing pages are empty.
        let total = self.total_pages()?;
        if index >= total {
            return Err(ListingError::PageOutOfRange { page: index, total });
        }
        Ok(self
            .snapshot
            .pages
            .get(index as usize)
            .cloned()
            .unwrap_or_default())
    }

    fn schools(&self) -> ListingResult<Vec<RawSchool>> {
        Ok(self.snapshot.schools.clone())
    }
}

/// Cleaned listing, ready for geocoding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub total_page: u32,
    pub clinics: Vec<RawClinic>,
    pub schools: Vec<RawSchool>,
}

/// Walk every page in order and clean up the records.
///
/// Keeps rows whose name contains `marker`, normalizes addresses and drops
/// repeated clinic ids (first occurrence wins).
pub fn collect_listing(source: &dyn ListingSource, marker: &str) -> ListingResult<Listing> {
    let total_page = source.total_pages()?;
    let mut seen = HashSet::new();
    let mut clinics = Vec::new();
    let mut skipped = 0usize;

    for index in 0..total_page {
        let rows = source.page(index)?;
        debug!("Listing page {}/{}: {} rows", index + 1, total_page, rows.len());
        for row in rows {
            if !is_clinic_name(&row.name, marker) {
                skipped += 1;
                continue;
            }
            let id = row.id.trim().to_string();
            if !seen.insert(id.clone()) {
                warn!("Dropping repeated clinic id {} ({})", id, row.name.trim());
                continue;
            }
            clinics.push(RawClinic {
                id,
                name: row.name.trim().to_string(),
                phone: row.phone.trim().to_string(),
                address: normalize_clinic_address(&row.address),
            });
        }
    }

    let schools: Vec<RawSchool> = source
        .schools()?
        .into_iter()
        .map(|s| RawSchool {
            name: s.name.trim().to_string(),
            address: normalize_school_address(&s.address),
        })
        .collect();

    info!(
        "Listing: {} clinics over {} pages ({} rows skipped), {} schools",
        clinics.len(),
        total_page,
        skipped,
        schools.len()
    );
    Ok(Listing {
        total_page,
        clinics,
        schools,
    })
}
