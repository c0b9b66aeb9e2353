//! goodtooth - dental clinic enrichment pipeline
//!
//! Raw listing records go through the geocoder, the matrix builder and the
//! scoring engine, and come out as one export-ready dataset.
//!
//! ```rust,ignore
//! use goodtooth::{config::Config, listing::JsonListingSource, oracle::HereOracle, pipeline::Pipeline};
//!
//! let config = Config::default();
//! let oracle = Arc::new(HereOracle::new(&config.oracle, config.resolve_api_key()?));
//! let output = Pipeline::new(oracle, config)?.run_source(&JsonListingSource::from_file(path)?)?;
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod listing;
pub mod matrix;
pub mod models;
pub mod oracle;
pub mod pipeline;
pub mod scoring;
