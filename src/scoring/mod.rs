//! Clinic scoring
//!
//! Turns travel durations into a score and a list of notes per clinic.
//! Each rule is a pure function of one clinic's already-resolved
//! durations; rules are independent and their points add up.
//!
//! # Scoring Rules
//!
//! ```text
//! score = transit(d_station) + density(R)
//!
//! transit:  d_station <= 300  → 5   "within 300m of a transit station"
//!           d_station >  300  → 3   "transit station beyond 300m"
//!
//! density:  R = other clinics with d <= 500 from this clinic
//!           |R| == 0 → 5
//!           |R| == 1 → 3
//!           |R| >  1 → 1            one "within 500 units of <name>" per clinic in R
//! ```
//!
//! Isolation scores higher than clustering. There is no upper bound.
//!
//! # Units
//!
//! Both thresholds are compared against routed *durations* in seconds even
//! though the note wording says metres. The published dataset has always
//! been computed this way.
//!
//! Thresholds, points, note templates and rule order all come from
//! [`ScoringConfig`](crate::config::ScoringConfig).

mod rules;

pub use rules::{DensityRule, TransitRule};

use crate::config::ScoringConfig;
use crate::matrix::{DurationMatrix, StationDurations};
use crate::models::Clinic;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Identifies a scoring rule in config and breakdowns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Transit,
    Density,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Transit => write!(f, "transit"),
            RuleKind::Density => write!(f, "density"),
        }
    }
}

/// Another clinic as seen from the clinic being scored
#[derive(Debug, Clone, Copy)]
pub struct Neighbour<'a> {
    pub name: &'a str,
    /// Duration from the scored clinic to this one; `None` when unresolved
    pub duration: Option<u32>,
}

/// Everything the rules need to score one clinic
#[derive(Debug, Clone)]
pub struct ClinicContext<'a> {
    pub clinic: &'a Clinic,
    pub station_duration: Option<u32>,
    pub neighbours: Vec<Neighbour<'a>>,
}

/// Points and notes produced by one rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub kind: RuleKind,
    pub points: u32,
    pub notes: Vec<String>,
}

/// A scoring rule: a pure function from one clinic's durations to points.
pub trait ScoringRule: Send + Sync {
    fn kind(&self) -> RuleKind;

    fn evaluate(&self, ctx: &ClinicContext<'_>) -> RuleOutcome;
}

/// Total score with the per-rule breakdown it was summed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicScore {
    pub score: u32,
    pub notes: Vec<String>,
    pub breakdown: Vec<RuleOutcome>,
}

impl ClinicScore {
    pub fn points_for(&self, kind: RuleKind) -> Option<u32> {
        self.breakdown
            .iter()
            .find(|o| o.kind == kind)
            .map(|o| o.points)
    }
}

/// Applies the configured rules in order
pub struct ScoringEngine {
    rules: Vec<Box<dyn ScoringRule>>,
}

impl ScoringEngine {
    /// Build the rules named in `config.rule_order`, in that order.
    pub fn new(config: &ScoringConfig) -> Self {
        let rules = config
            .rule_order
            .iter()
            .map(|kind| -> Box<dyn ScoringRule> {
                match kind {
                    RuleKind::Transit => Box::new(TransitRule::new(config.transit.clone())),
                    RuleKind::Density => Box::new(DensityRule::new(config.density.clone())),
                }
            })
            .collect();
        Self { rules }
    }

    pub fn with_rules(rules: Vec<Box<dyn ScoringRule>>) -> Self {
        Self { rules }
    }

    pub fn rule_kinds(&self) -> Vec<RuleKind> {
        self.rules.iter().map(|r| r.kind()).collect()
    }

    /// Score one clinic.
    pub fn score(&self, ctx: &ClinicContext<'_>) -> ClinicScore {
        let breakdown: Vec<RuleOutcome> = self.rules.iter().map(|r| r.evaluate(ctx)).collect();
        let score = breakdown.iter().map(|o| o.points).sum();
        let notes = breakdown.iter().flat_map(|o| o.notes.iter().cloned()).collect();
        ClinicScore {
            score,
            notes,
            breakdown,
        }
    }

    /// Score every clinic from the station durations and the clinic matrix.
    ///
    /// Returns new records in input order. Clinics without coordinates are
    /// returned unscored.
    pub fn score_all(
        &self,
        clinics: &[Clinic],
        station: &StationDurations,
        matrix: &DurationMatrix,
    ) -> Vec<Clinic> {
        clinics
            .iter()
            .enumerate()
            .map(|(i, clinic)| {
                if clinic.coordinates().is_none() {
                    return clinic.unscored();
                }
                let ctx = context_for(i, clinics, station, matrix);
                let result = self.score(&ctx);
                debug!("Scored {} ({}): {}", clinic.name, clinic.id, result.score);
                clinic.scored(result.score, result.notes)
            })
            .collect()
    }
}

/// Collect the lookups for clinic `index`. Neighbours keep clinic order.
pub fn context_for<'a>(
    index: usize,
    clinics: &'a [Clinic],
    station: &StationDurations,
    matrix: &DurationMatrix,
) -> ClinicContext<'a> {
    let neighbours = clinics
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != index)
        .map(|(j, other)| Neighbour {
            name: &other.name,
            duration: matrix.get(index, j),
        })
        .collect();

    ClinicContext {
        clinic: &clinics[index],
        station_duration: station.get(index),
        neighbours,
    }
}

/// Substitute `{threshold}` and `{name}` in a note template.
pub(crate) fn render_note(template: &str, threshold: u32, name: Option<&str>) -> String {
    let note = template.replace("{threshold}", &threshold.to_string());
    match name {
        Some(name) => note.replace("{name}", name),
        None => note,
    }
}
