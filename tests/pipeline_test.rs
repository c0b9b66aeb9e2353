//! End-to-end pipeline tests against a stub oracle
//!
//! The stub geocodes from a fixed address book and routes with a
//! Manhattan-style duration of 10 000 seconds per degree, so every expected
//! duration below can be worked out by hand.

use goodtooth::config::Config;
use goodtooth::dataset::{read_separate, write_documents, Artifact, DatasetMode};
use goodtooth::listing::{JsonListingSource, Listing, ListingSnapshot};
use goodtooth::matrix::FailureMode;
use goodtooth::models::{Coordinates, RawClinic, RawSchool, Station};
use goodtooth::oracle::{Oracle, OracleError, OracleResult, TravelMode};
use goodtooth::pipeline::{rescore, Pipeline, PipelineError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct StubOracle {
    book: HashMap<String, Coordinates>,
    routes: Mutex<Vec<(Coordinates, Coordinates)>>,
}

impl StubOracle {
    fn new(entries: &[(&str, f64, f64)]) -> Arc<Self> {
        Arc::new(Self {
            book: entries
                .iter()
                .map(|&(address, lat, lng)| (address.to_string(), Coordinates::new(lat, lng)))
                .collect(),
            routes: Mutex::new(Vec::new()),
        })
    }

    fn route_calls(&self) -> Vec<(Coordinates, Coordinates)> {
        self.routes.lock().unwrap().clone()
    }
}

impl Oracle for StubOracle {
    fn geocode(&self, address: &str) -> OracleResult<Coordinates> {
        if address == "revoked號" {
            return Err(OracleError::Fetch {
                status: Some(401),
                message: "invalid apiKey".into(),
            });
        }
        self.book
            .get(address)
            .copied()
            .ok_or_else(|| OracleError::Geocode(address.to_string()))
    }

    fn route_duration(&self, origin: Coordinates, destination: Coordinates, _: TravelMode) -> OracleResult<u32> {
        self.routes.lock().unwrap().push((origin, destination));
        let degrees = (origin.lat - destination.lat).abs() + (origin.lng - destination.lng).abs();
        Ok((degrees * 10_000.0).round() as u32)
    }
}

fn clinic(id: &str, name: &str, address: &str) -> RawClinic {
    RawClinic {
        id: id.to_string(),
        name: name.to_string(),
        phone: "02-2888".to_string(),
        address: address.to_string(),
    }
}

/// Station at (25.0, 121.0).
///
/// - A: 200s to the station, B 200s away, C 1200s away → 5 + 3
/// - B: 400s to the station, A 200s away, C 1400s away → 3 + 3
/// - C: 1000s to the station, nobody within 500s → 3 + 5
fn scenario() -> (Arc<StubOracle>, Listing) {
    let oracle = StubOracle::new(&[
        ("A路1號", 25.02, 121.0),
        ("B路2號", 25.04, 121.0),
        ("C路3號", 25.0, 121.1),
        ("校路9號", 25.0, 121.01),
    ]);
    let listing = Listing {
        total_page: 2,
        clinics: vec![
            clinic("a", "A診所", "A路1號"),
            clinic("b", "B診所", "B路2號"),
            clinic("c", "C診所", "C路3號"),
        ],
        schools: vec![RawSchool {
            name: "士林國小".to_string(),
            address: "校路9號".to_string(),
        }],
    };
    (oracle, listing)
}

fn config(mode: DatasetMode) -> Config {
    let mut config = Config::default();
    config.station = Station {
        name: "Test station".to_string(),
        lat: 25.0,
        lng: 121.0,
    };
    config.output.mode = mode;
    config
}

fn inline(artifact: Artifact) -> goodtooth::dataset::ScoredDataset {
    match artifact {
        Artifact::Inline(dataset) => dataset,
        Artifact::Separate(_) => panic!("expected inline artifact"),
    }
}

#[test]
fn test_scenario_scores_and_notes() {
    let (oracle, listing) = scenario();
    let output = Pipeline::new(oracle, config(DatasetMode::Inline))
        .unwrap()
        .run(listing)
        .unwrap();
    assert!(output.summary.is_complete());

    let dataset = inline(output.artifact);
    assert_eq!(dataset.total_page, 2);
    let scores: Vec<Option<u32>> = dataset.clinics.iter().map(|c| c.score).collect();
    assert_eq!(scores, vec![Some(8), Some(6), Some(8)]);

    assert_eq!(
        dataset.clinics[0].note.as_deref().unwrap(),
        [
            "within 300m of a transit station".to_string(),
            "within 500 units of B診所".to_string()
        ]
    );
    assert_eq!(
        dataset.clinics[2].note.as_deref().unwrap(),
        ["transit station beyond 300m".to_string()]
    );

    assert_eq!(dataset.schools.len(), 1);
    assert_eq!(dataset.near_by_schools[0].distance.get(&0), Some(&300));
}

#[test]
fn test_self_pairs_never_routed() {
    let (oracle, listing) = scenario();
    Pipeline::new(oracle.clone(), config(DatasetMode::Inline))
        .unwrap()
        .run(listing)
        .unwrap();

    let calls = oracle.route_calls();
    // 3 to the station, 3 × 2 between clinics, 3 × 1 to the school
    assert_eq!(calls.len(), 3 + 6 + 3);
    assert!(calls.iter().all(|(a, b)| a != b));
}

#[test]
fn test_identical_runs_give_identical_bytes() {
    let run = |workers: usize| {
        let (oracle, listing) = scenario();
        let mut config = config(DatasetMode::Inline);
        config.matrix.workers = workers;
        let output = Pipeline::new(oracle, config).unwrap().run(listing).unwrap();
        output.artifact.documents("goodtooth.json").unwrap()
    };

    let first = run(4);
    assert_eq!(first, run(4));
    assert_eq!(first, run(1));
    assert_eq!(first, run(16));
}

fn five_with_one_bad() -> (Arc<StubOracle>, Listing) {
    let oracle = StubOracle::new(&[
        ("A路1號", 25.02, 121.0),
        ("B路2號", 25.04, 121.0),
        ("D路4號", 25.06, 121.0),
        ("E路5號", 25.08, 121.0),
    ]);
    let listing = Listing {
        total_page: 1,
        clinics: vec![
            clinic("a", "A診所", "A路1號"),
            clinic("b", "B診所", "B路2號"),
            clinic("x", "X診所", "查無此路號"),
            clinic("d", "D診所", "D路4號"),
            clinic("e", "E診所", "E路5號"),
        ],
        schools: vec![],
    };
    (oracle, listing)
}

#[test]
fn test_fail_fast_aborts_on_bad_address() {
    let (oracle, listing) = five_with_one_bad();
    let mut config = config(DatasetMode::Inline);
    config.matrix.failure_mode = FailureMode::FailFast;

    let err = Pipeline::new(oracle.clone(), config).unwrap().run(listing).unwrap_err();
    match err {
        PipelineError::Geocode { kind, index, .. } => {
            assert_eq!(kind, "clinic");
            assert_eq!(index, 2);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(oracle.route_calls().is_empty());
}

#[test]
fn test_lenient_marks_bad_address_unresolved() {
    let (oracle, listing) = five_with_one_bad();
    let output = Pipeline::new(oracle, config(DatasetMode::Inline))
        .unwrap()
        .run(listing)
        .unwrap();

    assert_eq!(output.summary.clinics, 5);
    assert_eq!(output.summary.unresolved_clinics, 1);
    // station pair plus 4 outgoing and 4 incoming clinic pairs
    assert_eq!(output.summary.unresolved_pairs, 1 + 8);

    let dataset = inline(output.artifact);
    let resolved: Vec<_> = dataset.clinics.iter().filter(|c| c.resolved).collect();
    assert_eq!(resolved.len(), 4);
    assert!(resolved.iter().all(|c| c.score.is_some() && c.lat.is_some()));

    let bad = &dataset.clinics[2];
    assert!(!bad.resolved);
    assert_eq!(bad.lat, None);
    assert_eq!(bad.lng, None);
    assert!(bad.score.is_none());
    assert_eq!(dataset.unresolved.clinics, vec!["x".to_string()]);

    let json = serde_json::to_value(&dataset).unwrap();
    assert!(json["clinics"][2]["lat"].is_null());
    assert_eq!(json["clinics"][2]["resolved"], false);
}

#[test]
fn test_rejected_key_aborts_even_when_lenient() {
    let oracle = StubOracle::new(&[("A路1號", 25.02, 121.0)]);
    let listing = Listing {
        total_page: 1,
        clinics: vec![clinic("a", "A診所", "A路1號"), clinic("r", "R診所", "revoked號")],
        schools: vec![],
    };

    let err = Pipeline::new(oracle, config(DatasetMode::Inline))
        .unwrap()
        .run(listing)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Geocode { index: 1, .. }));
}

#[test]
fn test_no_schools_skips_school_matrix() {
    let (oracle, listing) = scenario();
    let mut config = config(DatasetMode::Inline);
    config.matrix.include_schools = false;

    let output = Pipeline::new(oracle.clone(), config).unwrap().run(listing).unwrap();
    assert_eq!(oracle.route_calls().len(), 3 + 6);

    let dataset = inline(output.artifact);
    assert!(dataset.schools.is_empty());
    assert!(dataset.near_by_schools.is_empty());
}

#[test]
fn test_separate_then_rescore_matches_inline() {
    let dir = TempDir::new().unwrap();

    let (oracle, listing) = scenario();
    let separate = Pipeline::new(oracle, config(DatasetMode::Separate))
        .unwrap()
        .run(listing)
        .unwrap();
    let docs = separate.artifact.documents("unused.json").unwrap();
    let names: Vec<&str> = docs.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "clinics.json",
            "nearByMRTs.json",
            "nearByClinics.json",
            "nearBySchools.json",
            "schools.json"
        ]
    );
    write_documents(dir.path(), &docs).unwrap();

    let near_by_clinics = std::fs::read_to_string(dir.path().join("nearByClinics.json")).unwrap();
    assert_eq!(
        near_by_clinics,
        r#"[{"distance":{"1":200,"2":1200}},{"distance":{"0":200,"2":1400}},{"distance":{"0":1200,"1":1400}}]"#
    );

    let stored = read_separate(dir.path()).unwrap();
    let rescored = inline(rescore(stored, 2, &config(DatasetMode::Inline)).unwrap().artifact);

    let (oracle, listing) = scenario();
    let direct = inline(
        Pipeline::new(oracle, config(DatasetMode::Inline))
            .unwrap()
            .run(listing)
            .unwrap()
            .artifact,
    );
    assert_eq!(rescored, direct);
}

#[test]
fn test_run_from_snapshot_source() {
    let (oracle, _) = scenario();
    let source = JsonListingSource::new(ListingSnapshot {
        total_page: Some(1),
        pages: vec![vec![
            clinic("a", "A診所", "A路1號、5號"),
            clinic("h", "士林醫院", "H路1號"),
            clinic("b", "B診所", "B路2(2樓)"),
        ]],
        schools: vec![],
    });

    let output = Pipeline::new(oracle, config(DatasetMode::Inline))
        .unwrap()
        .run_source(&source)
        .unwrap();
    let dataset = inline(output.artifact);
    let ids: Vec<&str> = dataset.clinics.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(dataset.clinics.iter().all(|c| c.resolved));
}

#[test]
fn test_invalid_config_rejected() {
    let (oracle, _) = scenario();
    let mut config = config(DatasetMode::Inline);
    config.matrix.workers = 0;
    assert!(matches!(
        Pipeline::new(oracle, config),
        Err(PipelineError::Config(_))
    ));
}
