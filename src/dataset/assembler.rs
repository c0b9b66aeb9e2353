use super::{DatasetError, DatasetMode, DatasetResult};
use crate::matrix::{DurationMatrix, StationDurations, UnresolvedPair};
use crate::models::{Clinic, School};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// `nearByMRTs` entry: one clinic's duration to the station
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearByStation {
    /// `null` when unresolved
    pub distance: Option<u32>,
}

/// `nearByClinics` / `nearBySchools` entry: one clinic's row of durations,
/// keyed by destination index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearByRow {
    pub distance: BTreeMap<usize, u32>,
}

/// Everything that could not be resolved during a run. Empty for a
/// complete dataset, in which case it is left out of the artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedReport {
    /// Ids of clinics whose address did not geocode
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clinics: Vec<String>,
    /// Names of schools whose address did not geocode
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schools: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub station: Vec<UnresolvedPair>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clinic_pairs: Vec<UnresolvedPair>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub school_pairs: Vec<UnresolvedPair>,
}

impl UnresolvedReport {
    pub fn is_empty(&self) -> bool {
        self.clinics.is_empty()
            && self.schools.is_empty()
            && self.station.is_empty()
            && self.clinic_pairs.is_empty()
            && self.school_pairs.is_empty()
    }

    pub fn pair_count(&self) -> usize {
        self.station.len() + self.clinic_pairs.len() + self.school_pairs.len()
    }
}

/// The single inline document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDataset {
    pub total_page: u32,
    pub clinics: Vec<Clinic>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schools: Vec<School>,
    #[serde(rename = "nearBySchools", default, skip_serializing_if = "Vec::is_empty")]
    pub near_by_schools: Vec<NearByRow>,
    #[serde(default, skip_serializing_if = "UnresolvedReport::is_empty")]
    pub unresolved: UnresolvedReport,
}

/// The five-document layout
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeparateArtifacts {
    pub clinics: Vec<Clinic>,
    pub near_by_mrts: Vec<NearByStation>,
    pub near_by_clinics: Vec<NearByRow>,
    pub near_by_schools: Vec<NearByRow>,
    pub schools: Vec<School>,
    pub unresolved: UnresolvedReport,
}

impl SeparateArtifacts {
    /// Turn the stored matrices back into assembler input, so a stored run
    /// can be rescored without calling the oracle.
    /// Unresolved pairs come back from the stored report with their reasons.
    pub fn into_parts(self, total_page: u32) -> DatasetParts {
        let report = self.unresolved;

        let mut station = StationDurations::new(self.near_by_mrts.len());
        for (origin, entry) in self.near_by_mrts.iter().enumerate() {
            if let Some(seconds) = entry.distance {
                station.insert(origin, seconds);
                continue;
            }
            let reason = report
                .station
                .iter()
                .find(|p| p.origin == origin)
                .map(|p| p.reason.clone())
                .unwrap_or_else(|| "unresolved in stored artifact".to_string());
            station.mark_unresolved(origin, reason);
        }

        let mut clinic_matrix = DurationMatrix::from_rows(
            self.clinics.len(),
            self.near_by_clinics.into_iter().map(|r| r.distance).collect(),
        );
        restore_pairs(&mut clinic_matrix, &report.clinic_pairs);

        let (schools, school_matrix) = if self.schools.is_empty() {
            (None, None)
        } else {
            let mut matrix = DurationMatrix::from_rows(
                self.schools.len(),
                self.near_by_schools.into_iter().map(|r| r.distance).collect(),
            );
            restore_pairs(&mut matrix, &report.school_pairs);
            (Some(self.schools), Some(matrix))
        };

        DatasetParts {
            total_page,
            clinics: self.clinics,
            schools,
            station: Some(station),
            clinic_matrix: Some(clinic_matrix),
            school_matrix,
        }
    }
}

/// Assembler input
#[derive(Debug, Clone, Default)]
pub struct DatasetParts {
    pub total_page: u32,
    pub clinics: Vec<Clinic>,
    pub schools: Option<Vec<School>>,
    pub station: Option<StationDurations>,
    pub clinic_matrix: Option<DurationMatrix>,
    pub school_matrix: Option<DurationMatrix>,
}

/// Assembled, validated output
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Inline(ScoredDataset),
    Separate(SeparateArtifacts),
}

impl Artifact {
    pub fn unresolved(&self) -> &UnresolvedReport {
        match self {
            Artifact::Inline(d) => &d.unresolved,
            Artifact::Separate(s) => &s.unresolved,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved().is_empty()
    }

    pub fn clinics(&self) -> &[Clinic] {
        match self {
            Artifact::Inline(d) => &d.clinics,
            Artifact::Separate(s) => &s.clinics,
        }
    }
}

pub struct Assembler {
    mode: DatasetMode,
}

impl Assembler {
    pub fn new(mode: DatasetMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> DatasetMode {
        self.mode
    }

    /// Validate `parts` for the configured mode and build the artifact.
    pub fn assemble(&self, parts: DatasetParts) -> DatasetResult<Artifact> {
        check_unique_ids(&parts.clinics)?;
        let clinic_count = parts.clinics.len();

        if parts.school_matrix.is_some() && parts.schools.is_none() {
            return Err(self.missing("schools for the school matrix"));
        }
        if let Some(station) = &parts.station {
            check_origins("station durations", clinic_count, station.origins())?;
        }
        if let Some(matrix) = &parts.clinic_matrix {
            check_matrix("clinic matrix", matrix, clinic_count, clinic_count)?;
        }
        if let (Some(matrix), Some(schools)) = (&parts.school_matrix, &parts.schools) {
            check_matrix("school matrix", matrix, clinic_count, schools.len())?;
        }

        let unresolved = unresolved_report(&parts);
        if !unresolved.is_empty() {
            warn!(
                "Dataset is incomplete: {} clinics, {} schools, {} pairs unresolved",
                unresolved.clinics.len(),
                unresolved.schools.len(),
                unresolved.pair_count()
            );
        }

        let artifact = match self.mode {
            DatasetMode::Inline => self.inline(parts, unresolved)?,
            DatasetMode::Separate => self.separate(parts, unresolved)?,
        };
        debug!("Assembled {:?} dataset with {} clinics", self.mode, clinic_count);
        Ok(artifact)
    }

    fn inline(&self, parts: DatasetParts, unresolved: UnresolvedReport) -> DatasetResult<Artifact> {
        if let Some(clinic) = parts
            .clinics
            .iter()
            .find(|c| c.coordinates().is_some() && (c.score.is_none() || c.note.is_none()))
        {
            return Err(DatasetError::Unscored {
                id: clinic.id.clone(),
            });
        }

        let near_by_schools = parts
            .school_matrix
            .as_ref()
            .map(|m| rows(m, parts.clinics.len()))
            .unwrap_or_default();

        Ok(Artifact::Inline(ScoredDataset {
            total_page: parts.total_page,
            clinics: parts.clinics,
            schools: parts.schools.unwrap_or_default(),
            near_by_schools,
            unresolved,
        }))
    }

    fn separate(&self, parts: DatasetParts, unresolved: UnresolvedReport) -> DatasetResult<Artifact> {
        let station = parts
            .station
            .as_ref()
            .ok_or_else(|| self.missing("station durations"))?;
        let clinic_matrix = parts
            .clinic_matrix
            .as_ref()
            .ok_or_else(|| self.missing("the clinic matrix"))?;
        if parts.schools.as_ref().is_some_and(|s| !s.is_empty()) && parts.school_matrix.is_none() {
            return Err(self.missing("the school matrix when schools are present"));
        }

        let clinic_count = parts.clinics.len();
        let near_by_mrts = (0..clinic_count)
            .map(|i| NearByStation {
                distance: station.get(i),
            })
            .collect();

        Ok(Artifact::Separate(SeparateArtifacts {
            clinics: parts.clinics.iter().map(Clinic::unscored).collect(),
            near_by_mrts,
            near_by_clinics: rows(clinic_matrix, clinic_count),
            near_by_schools: parts
                .school_matrix
                .as_ref()
                .map(|m| rows(m, clinic_count))
                .unwrap_or_default(),
            schools: parts.schools.unwrap_or_default(),
            unresolved,
        }))
    }

    fn missing(&self, what: &'static str) -> DatasetError {
        DatasetError::Missing {
            mode: self.mode,
            what,
        }
    }
}

/// One row per origin, empty rows included, so row index == clinic index.
fn rows(matrix: &DurationMatrix, origins: usize) -> Vec<NearByRow> {
    (0..origins)
        .map(|i| NearByRow {
            distance: matrix.row(i),
        })
        .collect()
}

fn restore_pairs(matrix: &mut DurationMatrix, pairs: &[UnresolvedPair]) {
    for pair in pairs {
        if let Some(destination) = pair.destination {
            matrix.mark_unresolved(pair.origin, destination, pair.reason.clone());
        }
    }
}

fn check_unique_ids(clinics: &[Clinic]) -> DatasetResult<()> {
    let mut seen = HashSet::new();
    for clinic in clinics {
        if !seen.insert(clinic.id.as_str()) {
            return Err(DatasetError::DuplicateClinicId(clinic.id.clone()));
        }
    }
    Ok(())
}

fn check_origins(what: &'static str, expected: usize, actual: usize) -> DatasetResult<()> {
    if expected != actual {
        return Err(DatasetError::ShapeMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_matrix(
    what: &'static str,
    matrix: &DurationMatrix,
    origins: usize,
    destinations: usize,
) -> DatasetResult<()> {
    check_origins(what, origins, matrix.origins())?;
    let resolved = matrix.iter().map(|(pair, _)| pair);
    let unresolved = matrix
        .unresolved()
        .iter()
        .filter_map(|p| p.destination.map(|d| (p.origin, d)));
    if let Some((origin, destination)) = resolved
        .chain(unresolved)
        .find(|(o, d)| *o >= origins || *d >= destinations)
    {
        return Err(DatasetError::OutOfRange {
            what,
            origin,
            destination,
        });
    }
    Ok(())
}

fn unresolved_report(parts: &DatasetParts) -> UnresolvedReport {
    UnresolvedReport {
        clinics: parts
            .clinics
            .iter()
            .filter(|c| c.coordinates().is_none())
            .map(|c| c.id.clone())
            .collect(),
        schools: parts
            .schools
            .iter()
            .flatten()
            .filter(|s| s.coordinates().is_none())
            .map(|s| s.name.clone())
            .collect(),
        station: parts
            .station
            .as_ref()
            .map(|s| s.unresolved().to_vec())
            .unwrap_or_default(),
        clinic_pairs: parts
            .clinic_matrix
            .as_ref()
            .map(|m| m.unresolved().to_vec())
            .unwrap_or_default(),
        school_pairs: parts
            .school_matrix
            .as_ref()
            .map(|m| m.unresolved().to_vec())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, RawClinic, RawSchool};

    fn clinic(id: &str, resolved: bool) -> Clinic {
        Clinic::from_raw(
            RawClinic {
                id: id.to_string(),
                name: format!("{}診所", id),
                phone: "02-0000".to_string(),
                address: "臺北市".to_string(),
            },
            resolved.then(|| Coordinates::new(25.0, 121.0)),
        )
    }

    fn parts() -> DatasetParts {
        let mut clinic_matrix = DurationMatrix::new(2, 2);
        clinic_matrix.insert(0, 1, 240);
        clinic_matrix.insert(1, 0, 250);
        DatasetParts {
            total_page: 3,
            clinics: vec![clinic("b", true).scored(8, vec![]), clinic("a", true).scored(6, vec![])],
            schools: None,
            station: Some(StationDurations::from_list(vec![200, 400])),
            clinic_matrix: Some(clinic_matrix),
            school_matrix: None,
        }
    }

    #[test]
    fn test_inline_keeps_scraping_order() {
        let artifact = Assembler::new(DatasetMode::Inline).assemble(parts()).unwrap();
        let ids: Vec<&str> = artifact.clinics().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(artifact.is_complete());

        let Artifact::Inline(dataset) = artifact else {
            panic!("expected inline artifact");
        };
        assert_eq!(dataset.total_page, 3);
    }

    #[test]
    fn test_inline_requires_scores() {
        let mut p = parts();
        p.clinics[1] = clinic("a", true);
        let err = Assembler::new(DatasetMode::Inline).assemble(p).unwrap_err();
        assert!(matches!(err, DatasetError::Unscored { id } if id == "a"));
    }

    #[test]
    fn test_separate_requires_matrices() {
        let mut p = parts();
        p.clinic_matrix = None;
        let err = Assembler::new(DatasetMode::Separate).assemble(p).unwrap_err();
        assert!(matches!(err, DatasetError::Missing { .. }));

        let mut p = parts();
        p.station = None;
        let err = Assembler::new(DatasetMode::Separate).assemble(p).unwrap_err();
        assert!(err.to_string().contains("station durations"));

        // Inline does not need them
        let mut p = parts();
        p.station = None;
        p.clinic_matrix = None;
        assert!(Assembler::new(DatasetMode::Inline).assemble(p).is_ok());
    }

    #[test]
    fn test_separate_layout() {
        let artifact = Assembler::new(DatasetMode::Separate).assemble(parts()).unwrap();
        let Artifact::Separate(s) = artifact else {
            panic!("expected separate artifact");
        };
        assert!(s.clinics.iter().all(|c| c.score.is_none()));
        assert_eq!(s.near_by_mrts[0], NearByStation { distance: Some(200) });
        assert_eq!(s.near_by_clinics[0].distance, BTreeMap::from([(1, 240)]));
        assert_eq!(s.near_by_clinics[1].distance, BTreeMap::from([(0, 250)]));
        assert!(s.near_by_schools.is_empty());

        let json = serde_json::to_string(&s.near_by_clinics).unwrap();
        assert_eq!(json, r#"[{"distance":{"1":240}},{"distance":{"0":250}}]"#);
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let mut p = parts();
        p.clinics[1].id = "b".to_string();
        let err = Assembler::new(DatasetMode::Inline).assemble(p).unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateClinicId(id) if id == "b"));
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        let mut p = parts();
        p.station = Some(StationDurations::from_list(vec![200]));
        let err = Assembler::new(DatasetMode::Separate).assemble(p).unwrap_err();
        assert!(matches!(err, DatasetError::ShapeMismatch { expected: 2, actual: 1, .. }));

        let mut p = parts();
        let mut matrix = DurationMatrix::new(2, 2);
        matrix.insert(0, 7, 100);
        p.clinic_matrix = Some(matrix);
        let err = Assembler::new(DatasetMode::Separate).assemble(p).unwrap_err();
        assert!(matches!(err, DatasetError::OutOfRange { destination: 7, .. }));
    }

    #[test]
    fn test_school_matrix_needs_schools() {
        let mut p = parts();
        p.school_matrix = Some(DurationMatrix::new(2, 0));
        let err = Assembler::new(DatasetMode::Inline).assemble(p).unwrap_err();
        assert!(matches!(err, DatasetError::Missing { .. }));

        let mut p = parts();
        p.schools = Some(vec![School::from_raw(
            RawSchool {
                name: "士林國小".into(),
                address: "x".into(),
            },
            Some(Coordinates::new(25.0, 121.0)),
        )]);
        let err = Assembler::new(DatasetMode::Separate).assemble(p).unwrap_err();
        assert!(err.to_string().contains("school matrix"));
    }

    #[test]
    fn test_unresolved_report_flags_everything() {
        let mut p = parts();
        p.clinics.push(clinic("c", false));
        let mut station = StationDurations::new(3);
        station.insert(0, 200);
        station.insert(1, 400);
        station.mark_unresolved(2, "origin has no coordinates");
        p.station = Some(station);
        let mut matrix = DurationMatrix::new(3, 3);
        matrix.insert(0, 1, 240);
        matrix.mark_unresolved(0, 2, "origin has no coordinates");
        p.clinic_matrix = Some(matrix);

        let artifact = Assembler::new(DatasetMode::Inline).assemble(p).unwrap();
        assert!(!artifact.is_complete());
        let report = artifact.unresolved();
        assert_eq!(report.clinics, vec!["c".to_string()]);
        assert_eq!(report.station.len(), 1);
        assert_eq!(report.clinic_pairs.len(), 1);

        let Artifact::Inline(dataset) = artifact else {
            panic!("expected inline artifact");
        };
        let json = serde_json::to_value(&dataset).unwrap();
        assert_eq!(json["unresolved"]["clinics"][0], "c");
        assert_eq!(json["unresolved"]["clinicPairs"][0]["destination"], 2);
        assert!(json["clinics"][2]["lat"].is_null());
    }

    #[test]
    fn test_complete_dataset_omits_unresolved() {
        let artifact = Assembler::new(DatasetMode::Inline).assemble(parts()).unwrap();
        let Artifact::Inline(dataset) = artifact else {
            panic!("expected inline artifact");
        };
        let json = serde_json::to_value(&dataset).unwrap();
        assert!(json.get("unresolved").is_none());
        assert!(json.get("schools").is_none());
        assert_eq!(json["clinics"][0]["score"], 8);
    }

    #[test]
    fn test_separate_round_trips_to_parts() {
        let Artifact::Separate(stored) = Assembler::new(DatasetMode::Separate).assemble(parts()).unwrap() else {
            panic!("expected separate artifact");
        };
        let restored = stored.into_parts(3);
        assert_eq!(restored.station.as_ref().unwrap().get(1), Some(400));
        assert_eq!(restored.clinic_matrix.as_ref().unwrap().get(1, 0), Some(250));
        assert!(restored.schools.is_none());
        assert!(restored.clinics.iter().all(|c| c.score.is_none()));
    }

    #[test]
    fn test_rejects_unresolved_pair_out_of_range() {
        let mut p = parts();
        let mut matrix = DurationMatrix::new(2, 2);
        matrix.insert(0, 1, 240);
        matrix.mark_unresolved(1, 9, "No route available: none");
        p.clinic_matrix = Some(matrix);
        let err = Assembler::new(DatasetMode::Separate).assemble(p).unwrap_err();
        assert!(matches!(err, DatasetError::OutOfRange { origin: 1, destination: 9, .. }));
    }

    #[test]
    fn test_stored_report_out_of_range_is_rejected() {
        let Artifact::Separate(mut stored) = Assembler::new(DatasetMode::Separate).assemble(parts()).unwrap() else {
            panic!("expected separate artifact");
        };
        stored.unresolved.clinic_pairs.push(UnresolvedPair {
            origin: 5,
            destination: Some(0),
            reason: "edited by hand".to_string(),
        });

        let err = Assembler::new(DatasetMode::Inline)
            .assemble(stored.into_parts(3))
            .unwrap_err();
        assert!(matches!(err, DatasetError::OutOfRange { origin: 5, .. }));
    }
}
