use std::path::PathBuf;

use comparables_recon::config::ReconConfig;
use comparables_recon::engine::run;
use comparables_recon::evidence::Finding;
use comparables_recon::model::{ReconInput, ReconResult, Slot, SourceDocument, TextField};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load(name: &str) -> SourceDocument {
    let path = fixtures_dir().join(name);
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    SourceDocument::new(name, text.split('\x0c').map(str::to_string).collect())
}

fn load_and_run(config: &ReconConfig, appraisals: &[&str]) -> ReconResult {
    let input = ReconInput {
        listings: vec![load("listings.txt")],
        appraisals: appraisals.iter().map(|name| load(name)).collect(),
        prior: Default::default(),
    };
    run(config, &input).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

// -------------------------------------------------------------------------
// Listings
// -------------------------------------------------------------------------

#[test]
fn listings_in_discovery_order() {
    let result = load_and_run(&ReconConfig::default(), &[]);

    assert_eq!(result.summary.listing_documents, 1);
    assert_eq!(result.summary.sections, 4);
    assert_eq!(result.summary.listings, 3);

    let rows: Vec<(u32, &str, &str, &str)> = result
        .listings
        .iter()
        .map(|r| (r.slot().0, r.identifier().as_str(), r.address().as_str(), r.price().as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![
            (0, "10001", "123-125 rue Principale", "629 000 $"),
            (1, "10002", "400 boul. Saint-Laurent", "449 000 $"),
            (2, "10003", "77 avenue des Pins", "515 500 $"),
        ]
    );
}

#[test]
fn repeated_listing_reported_once() {
    let result = load_and_run(&ReconConfig::default(), &[]);

    assert_eq!(result.duplicates.len(), 1);
    let dup = &result.duplicates[0];
    assert_eq!(dup.identifier, "10002");
    assert_eq!(dup.section, 2);
    assert_eq!(dup.kept_slot, Slot(1));
    assert_eq!(result.summary.finding_counts.get("duplicate_identifier"), Some(&1));
}

// -------------------------------------------------------------------------
// Reconciliation
// -------------------------------------------------------------------------

#[test]
fn rolls_accumulate_on_matching_listing() {
    let result = load_and_run(
        &ReconConfig::default(),
        &["roll-123.txt", "roll-125.txt", "roll-77.txt", "roll-lac.txt"],
    );

    assert_eq!(result.summary.appraisals, 4);
    assert_eq!(result.summary.matched, 3);
    assert_eq!(result.summary.unmatched, 1);

    let building = result.listings.get(Slot(0)).unwrap().totals();
    assert!(close(building.building_area, 2696.29 * 2.0));
    assert!(close(building.floor_area, 1937.46 + 1886.33));
    assert!(close(building.assessed_value, 615_000.0));

    let untouched = result.listings.get(Slot(1)).unwrap().totals();
    assert_eq!(untouched.assessed_value, 0.0);
    assert_eq!(untouched.floor_area, 0.0);

    let pins = result.listings.get(Slot(2)).unwrap().totals();
    assert!(close(pins.assessed_value, 420_000.0));
    assert_eq!(pins.building_area, 0.0);
}

#[test]
fn first_address_in_roll_wins() {
    let result = load_and_run(&ReconConfig::default(), &["roll-125.txt"]);
    assert_eq!(result.matches.len(), 1);
    let m = &result.matches[0];
    assert_eq!(m.address, TextField::Found("125 rue Principale".into()));
    assert_eq!(m.target_slot, Slot(0));
    assert!(m.civic_overlap);
}

#[test]
fn unmatched_roll_is_reported() {
    let result = load_and_run(&ReconConfig::default(), &["roll-lac.txt"]);

    assert_eq!(result.unmatched.len(), 1);
    assert_eq!(result.unmatched[0].address.as_str(), "5 chemin du Lac");
    assert!(result.findings.iter().any(|f| matches!(
        f,
        Finding::NoMatch { address, .. } if address == "5 chemin du Lac"
    )));
    assert!(result.findings.iter().any(|f| matches!(
        f,
        Finding::UnparsableNumber { field, .. } if field == "assessed_value"
    )));
    assert!(result.findings.iter().any(|f| matches!(
        f,
        Finding::FieldNotFound { field, section: None, .. } if field == "floor_area"
    )));
    for listing in &result.listings {
        assert_eq!(listing.totals().building_area, 0.0);
    }
}

#[test]
fn shared_civic_number_bypasses_threshold() {
    let config = ReconConfig::from_toml("[matching]\nthreshold = 95\n").unwrap();
    let result = load_and_run(&config, &["roll-77.txt"]);
    assert_eq!(result.meta.threshold, 95);
    assert_eq!(result.summary.matched, 1);
    let m = &result.matches[0];
    assert_eq!(m.target_slot, Slot(2));
    assert!(m.score < 95.0);
    assert!(m.civic_overlap);
}

#[test]
fn result_serializes_with_sentinels() {
    let input = ReconInput {
        listings: vec![SourceDocument::new(
            "mls.pdf",
            vec!["no price here\nPage 1 de 1".into()],
        )],
        ..Default::default()
    };
    let result = run(&ReconConfig::default(), &input).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["listings"][0]["address"], "not found");
    assert_eq!(json["listings"][0]["slot"], 0);
    assert_eq!(json["summary"]["listings"], 1);
    assert_eq!(json["findings"][0]["kind"], "field_not_found");
}
