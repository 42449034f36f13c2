//! YAML system catalog import.
//!
//! A catalog maps each system name to its category (`type`), a group label
//! and the names of the systems it takes input from:
//!
//! ```yaml
//! Banner 9 Admin:
//!   type: core
//!   group: Core Systems
//!   inputs: [Manual Entry]
//! Manual Entry:
//!   type: external
//!   group: External & Other
//!   inputs: []
//! ```
//!
//! Importing upserts every system by name and one `depends_on` relationship
//! per input, all inside a single transaction.

use crate::error::{Result, TrackerError};
use crate::models::{RelationshipType, SystemCategory, SystemInput, SystemStatus};
use crate::store::{insert_system, now, Store};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Maximum catalog size (1MB)
pub const MAX_CATALOG_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub group: String,
}

impl CatalogEntry {
    /// Unknown or empty `type` values fall back to `core`.
    pub fn category(&self) -> SystemCategory {
        self.kind.trim().parse().unwrap_or(SystemCategory::Core)
    }

    fn description(&self) -> String {
        if self.group.trim().is_empty() {
            String::new()
        } else {
            format!("Part of {}", self.group.trim())
        }
    }
}

/// System name → entry, in name order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct SystemCatalog {
    pub systems: BTreeMap<String, CatalogEntry>,
}

/// An input that names no known system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissingInput {
    pub system: String,
    pub input: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub systems_created: usize,
    pub systems_updated: usize,
    pub relationships_created: usize,
    pub missing: Vec<MissingInput>,
}

pub fn parse_catalog_file<P: AsRef<Path>>(path: P) -> Result<SystemCatalog> {
    let content = fs::read_to_string(path)?;
    parse_catalog_yaml(&content)
}

pub fn parse_catalog_yaml(content: &str) -> Result<SystemCatalog> {
    if content.len() > MAX_CATALOG_SIZE {
        return Err(TrackerError::CatalogSizeExceeded(content.len()));
    }

    let catalog: SystemCatalog = serde_yaml::from_str(content)?;

    let mut seen = HashSet::new();
    for (name, entry) in &catalog.systems {
        let name = name.trim();
        if name.is_empty() {
            return Err(TrackerError::Validation(
                "catalog system names must not be empty".to_string(),
            ));
        }
        if !seen.insert(name) {
            return Err(TrackerError::Validation(format!(
                "system '{name}' is listed more than once"
            )));
        }
        if entry.inputs.iter().any(|input| input.trim() == name) {
            return Err(TrackerError::Validation(format!(
                "system '{name}' lists itself as an input"
            )));
        }
    }

    Ok(catalog)
}

fn find_by_name(conn: &Connection, name: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM systems WHERE name = ?1 ORDER BY id LIMIT 1",
            params![name],
            |row| row.get(0),
        )
        .optional()?)
}

/// Returns true when the relationship did not exist before.
fn upsert_dependency(
    conn: &Connection,
    source: i64,
    target: i64,
    description: &str,
) -> Result<bool> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM system_relationships
             WHERE source_system_id = ?1 AND target_system_id = ?2 AND relationship_type = ?3",
            params![source, target, RelationshipType::DependsOn],
            |row| row.get(0),
        )
        .optional()?;

    let ts = now();
    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE system_relationships SET description = ?1, updated_at = ?2 WHERE id = ?3",
                params![description, ts, id],
            )?;
            Ok(false)
        }
        None => {
            conn.execute(
                "INSERT INTO system_relationships (source_system_id, target_system_id,
                     relationship_type, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![source, target, RelationshipType::DependsOn, description, ts],
            )?;
            Ok(true)
        }
    }
}

impl Store {
    pub fn import_catalog(&self, catalog: &SystemCatalog) -> Result<ImportSummary> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut summary = ImportSummary::default();
        let mut ids: BTreeMap<&str, i64> = BTreeMap::new();

        for (name, entry) in &catalog.systems {
            let name = name.trim();
            let id = match find_by_name(&tx, name)? {
                Some(id) => {
                    tx.execute(
                        "UPDATE systems SET category = ?1, status = ?2, description = ?3,
                             updated_at = ?4
                         WHERE id = ?5",
                        params![
                            entry.category(),
                            SystemStatus::Active,
                            entry.description(),
                            now(),
                            id
                        ],
                    )?;
                    summary.systems_updated += 1;
                    id
                }
                None => {
                    let mut input = SystemInput::new(name, entry.category());
                    input.status = SystemStatus::Active;
                    input.description = entry.description();
                    let id = insert_system(&tx, &input)?;
                    summary.systems_created += 1;
                    id
                }
            };
            ids.insert(name, id);
        }

        for (name, entry) in &catalog.systems {
            let name = name.trim();
            let Some(&target) = ids.get(name) else {
                continue;
            };
            for input in &entry.inputs {
                let source = match ids.get(input.trim()) {
                    Some(&id) => Some(id),
                    None => find_by_name(&tx, input.trim())?,
                };
                let Some(source) = source else {
                    warn!(system = name, input = %input, "Catalog input names no known system");
                    summary.missing.push(MissingInput {
                        system: name.to_string(),
                        input: input.clone(),
                    });
                    continue;
                };
                let description = format!("{name} depends on {}", input.trim());
                if upsert_dependency(&tx, source, target, &description)? {
                    summary.relationships_created += 1;
                }
            }
        }

        tx.commit()?;
        info!(
            created = summary.systems_created,
            updated = summary.systems_updated,
            relationships = summary.relationships_created,
            missing = summary.missing.len(),
            "Imported system catalog"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
Banner 9 Admin:
  type: core
  group: Core Systems
  inputs: [Manual Entry, Constituo]
Ellucian ODS:
  type: core
  group: Core Systems
  inputs: [Banner 9 Admin]
Manual Entry:
  type: external
  group: External & Other
  inputs: []
Slate Integration:
  type: bespoke
  inputs: [Banner 9 Admin]
"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = parse_catalog_yaml(CATALOG).unwrap();
        assert_eq!(catalog.systems.len(), 4);
        let banner = &catalog.systems["Banner 9 Admin"];
        assert_eq!(banner.category(), SystemCategory::Core);
        assert_eq!(banner.inputs.len(), 2);
        assert_eq!(
            catalog.systems["Slate Integration"].category(),
            SystemCategory::Core
        );
    }

    #[test]
    fn test_catalog_size_limit() {
        let large = "a:\n  inputs: []\n".repeat(100_000);
        assert!(matches!(
            parse_catalog_yaml(&large),
            Err(TrackerError::CatalogSizeExceeded(_))
        ));
    }

    #[test]
    fn test_self_input_rejected() {
        let yaml = "Loop:\n  type: core\n  inputs: [Loop]\n";
        assert!(matches!(
            parse_catalog_yaml(yaml),
            Err(TrackerError::Validation(_))
        ));
    }

    #[test]
    fn test_self_input_rejected_despite_whitespace() {
        let yaml = "Loop:\n  type: core\n  inputs: [\"Loop \"]\n";
        assert!(matches!(
            parse_catalog_yaml(yaml),
            Err(TrackerError::Validation(_))
        ));

        let yaml = "\" Loop\":\n  inputs: [Loop]\n";
        assert!(matches!(
            parse_catalog_yaml(yaml),
            Err(TrackerError::Validation(_))
        ));
    }

    #[test]
    fn test_names_duplicated_after_trim_rejected() {
        let yaml = "Banner:\n  inputs: []\n\"Banner \":\n  inputs: []\n";
        let err = parse_catalog_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_import_upserts() {
        let store = Store::in_memory().unwrap();
        let catalog = parse_catalog_yaml(CATALOG).unwrap();

        let first = store.import_catalog(&catalog).unwrap();
        assert_eq!(first.systems_created, 4);
        assert_eq!(first.systems_updated, 0);
        assert_eq!(first.relationships_created, 3);
        assert_eq!(
            first.missing,
            vec![MissingInput {
                system: "Banner 9 Admin".to_string(),
                input: "Constituo".to_string(),
            }]
        );

        let again = store.import_catalog(&catalog).unwrap();
        assert_eq!(again.systems_created, 0);
        assert_eq!(again.systems_updated, 4);
        assert_eq!(again.relationships_created, 0);

        let banner = store.find_system_by_name("Banner 9 Admin").unwrap().unwrap();
        assert_eq!(banner.description, "Part of Core Systems");
        let dependents: Vec<String> = store
            .dependents(banner.id)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(dependents, vec!["Ellucian ODS", "Slate Integration"]);

        let report = store.impact_analysis(
            store.find_system_by_name("Manual Entry").unwrap().unwrap().id,
        );
        assert_eq!(report.unwrap().total_affected(), 3);
    }
}
