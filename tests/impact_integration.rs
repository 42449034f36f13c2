//! Catalog import → relationships → impact analysis, against an on-disk database

use itrack::catalog::parse_catalog_file;
use itrack::models::{RelationshipInput, RelationshipType, SystemCategory, SystemInput};
use itrack::store::Store;
use std::io::Write;
use tempfile::TempDir;

/// Helper to create a temporary directory for the test database
fn setup_temp_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("itrack.db");
    let store = Store::new(db_path).unwrap();
    (temp_dir, store)
}

const CATALOG: &str = r#"
Banner 9 Admin:
  type: core
  group: Core Systems
  inputs: [Manual Entry]
Ellucian ODS:
  type: core
  group: Core Systems
  inputs: [Banner 9 Admin]
Argos Reports:
  type: integration
  group: Reporting
  inputs: [Ellucian ODS, Banner 9 Admin]
Degree Audit:
  type: custom
  inputs: [Argos Reports]
Manual Entry:
  type: external
  group: External & Other
  inputs: []
"#;

#[test]
fn test_catalog_import_then_impact() {
    let (temp_dir, store) = setup_temp_store();

    let path = temp_dir.path().join("catalog.yaml");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(CATALOG.as_bytes())
        .unwrap();

    let catalog = parse_catalog_file(&path).unwrap();
    let summary = store.import_catalog(&catalog).unwrap();
    assert_eq!(summary.systems_created, 5);
    assert_eq!(summary.relationships_created, 5);
    assert!(summary.missing.is_empty());

    let source = store.find_system_by_name("Manual Entry").unwrap().unwrap();
    let report = store.impact_analysis(source.id).unwrap();

    let levels: Vec<(&str, usize)> = report
        .affected
        .iter()
        .map(|a| (a.name.as_str(), a.impact_level))
        .collect();
    assert_eq!(
        levels,
        vec![
            ("Banner 9 Admin", 1),
            ("Argos Reports", 2),
            ("Ellucian ODS", 2),
            ("Degree Audit", 3),
        ]
    );
    assert_eq!(report.max_depth, 3);
    assert!(!report.has_cycles);

    // Argos is reached directly from Banner, not through ODS
    let argos = &report.affected[1];
    let path: Vec<&str> = argos.path.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(path, vec!["Manual Entry", "Banner 9 Admin", "Argos Reports"]);
}

#[test]
fn test_impact_survives_cycles_and_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("cycle.db");

    let (a, c) = {
        let store = Store::new(&db_path).unwrap();
        let a = store
            .create_system(&SystemInput::new("A", SystemCategory::Core))
            .unwrap();
        let b = store
            .create_system(&SystemInput::new("B", SystemCategory::Core))
            .unwrap();
        let c = store
            .create_system(&SystemInput::new("C", SystemCategory::Core))
            .unwrap();

        let edge = |source: i64, target: i64| RelationshipInput {
            source_system_id: Some(source),
            target_system_id: Some(target),
            relationship_type: Some(RelationshipType::DependsOn),
            ..Default::default()
        };
        store
            .save_relationships(b.id, &[edge(a.id, b.id), edge(b.id, c.id)])
            .unwrap();
        store.save_relationships(c.id, &[edge(b.id, c.id), edge(c.id, a.id)]).unwrap();
        (a.id, c.id)
    };

    // Reopen to make sure everything was persisted
    let store = Store::new(&db_path).unwrap();
    let report = store.impact_analysis(a).unwrap();
    assert!(report.has_cycles);
    assert_eq!(report.total_affected(), 2);
    assert!(report.affected.iter().all(|s| s.system_id != a));

    let disaster = store.disaster_analysis(c).unwrap();
    assert_eq!(disaster.impact.total_affected(), 2);
    assert!(disaster.recovery_steps.is_empty());
}
