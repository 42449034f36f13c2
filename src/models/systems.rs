//! Systems, their relationships, notes and recovery steps

use super::{require_non_negative, require_text, NamedRef};
use crate::error::{Result, TrackerError};
use crate::impact::ImpactReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

choice_enum! {
    /// Broad classification of a tracked system
    pub enum SystemCategory {
        Core => ("core", "Core System"),
        Integration => ("integration", "Integration"),
        Custom => ("custom", "Custom Component"),
        External => ("external", "External System"),
    }
}

choice_enum! {
    /// Lifecycle status of a tracked system
    pub enum SystemStatus {
        Active => ("active", "Going-Concern"),
        Review => ("review", "In Review"),
        Deprecation => ("deprecation", "Scheduled for Deprecation"),
        Deprecated => ("deprecated", "Deprecated"),
    }
}

impl Default for SystemStatus {
    fn default() -> Self {
        SystemStatus::Active
    }
}

choice_enum! {
    /// Kind of edge between two systems.
    ///
    /// For `DependsOn` the target depends on the source.
    pub enum RelationshipType {
        DependsOn => ("depends_on", "Depends On"),
        ProvidesDataTo => ("provides_data_to", "Provides Data To"),
        IntegratesWith => ("integrates_with", "Integrates With"),
    }
}

/// A tracked software or infrastructure asset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct System {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: SystemCategory,
    pub vendor: String,
    pub operating_system: String,
    pub support_information: String,
    pub contact_information: String,
    pub cost: Option<f64>,
    pub cost_structure: String,
    pub sso_methodology: String,
    pub sso_system: String,
    pub status: SystemStatus,
    pub documentation_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/replace payload for a system
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SystemInput {
    pub name: String,
    pub description: String,
    pub category: Option<SystemCategory>,
    pub vendor: String,
    pub operating_system: String,
    pub support_information: String,
    pub contact_information: String,
    pub cost: Option<f64>,
    pub cost_structure: String,
    pub sso_methodology: String,
    pub sso_system: String,
    pub status: SystemStatus,
    pub documentation_url: String,
}

impl SystemInput {
    pub fn new(name: impl Into<String>, category: SystemCategory) -> Self {
        Self {
            name: name.into(),
            category: Some(category),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        if self.category.is_none() {
            return Err(TrackerError::Validation("category is required".to_string()));
        }
        require_non_negative("cost", self.cost)?;
        validate_url("documentation_url", &self.documentation_url)
    }

    pub(crate) fn category(&self) -> Result<SystemCategory> {
        self.category
            .ok_or_else(|| TrackerError::Validation("category is required".to_string()))
    }
}

/// Partial update used by the quick-edit endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SystemPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<SystemCategory>,
    pub vendor: Option<String>,
    pub status: Option<SystemStatus>,
    pub cost: Option<f64>,
    pub documentation_url: Option<String>,
}

impl SystemPatch {
    /// Apply onto an existing record, producing the full replacement payload.
    pub fn apply(&self, system: &System) -> SystemInput {
        SystemInput {
            name: self.name.clone().unwrap_or_else(|| system.name.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| system.description.clone()),
            category: Some(self.category.unwrap_or(system.category)),
            vendor: self.vendor.clone().unwrap_or_else(|| system.vendor.clone()),
            operating_system: system.operating_system.clone(),
            support_information: system.support_information.clone(),
            contact_information: system.contact_information.clone(),
            cost: self.cost.or(system.cost),
            cost_structure: system.cost_structure.clone(),
            sso_methodology: system.sso_methodology.clone(),
            sso_system: system.sso_system.clone(),
            status: self.status.unwrap_or(system.status),
            documentation_url: self
                .documentation_url
                .clone()
                .unwrap_or_else(|| system.documentation_url.clone()),
        }
    }
}

/// Filters for listing systems
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemFilter {
    pub status: Option<SystemStatus>,
    pub category: Option<SystemCategory>,
}

/// `{id, name, category}` reference embedded in relationship payloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemRef {
    pub id: i64,
    pub name: String,
    pub category: SystemCategory,
}

/// A directed edge between two systems
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemRelationship {
    pub id: i64,
    pub source_system: SystemRef,
    pub target_system: SystemRef,
    pub relationship_type: RelationshipType,
    pub description: String,
}

/// One entry of a bulk relationship save.
///
/// Entries missing any of source, target or type are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RelationshipInput {
    pub id: Option<i64>,
    pub source_system_id: Option<i64>,
    pub target_system_id: Option<i64>,
    pub relationship_type: Option<RelationshipType>,
    pub description: String,
}

/// Body of the bulk relationship save endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RelationshipBatch {
    pub relationships: Vec<RelationshipInput>,
}

/// A node in the relationship diagram
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagramSystem {
    pub id: i64,
    pub name: String,
    pub category: SystemCategory,
    pub status: SystemStatus,
    #[serde(rename = "type")]
    pub kind: SystemCategory,
}

/// An edge in the relationship diagram
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagramLink {
    pub source: i64,
    pub target: i64,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
}

/// Data for the force-directed relationship diagram
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationshipDiagram {
    pub systems: Vec<DiagramSystem>,
    pub links: Vec<DiagramLink>,
}

/// Free-form note attached to a system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemNote {
    pub id: i64,
    pub system_id: i64,
    pub title: String,
    pub content: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NoteInput {
    pub title: String,
    pub content: String,
    pub created_by: Option<String>,
}

impl NoteInput {
    pub fn validate(&self) -> Result<()> {
        require_text("title", &self.title)?;
        require_text("content", &self.content)
    }
}

/// One step of a system's disaster-recovery runbook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoveryStep {
    pub id: i64,
    pub system_id: i64,
    pub step_order: i64,
    pub title: String,
    pub description: String,
    pub responsible_party: String,
    pub estimated_minutes: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create (no `id`) or update (with `id`) payload for a recovery step
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RecoveryStepInput {
    pub id: Option<i64>,
    pub title: String,
    pub description: String,
    pub responsible_party: String,
    pub estimated_minutes: Option<i64>,
}

impl RecoveryStepInput {
    pub fn validate(&self) -> Result<()> {
        require_text("title", &self.title)?;
        if matches!(self.estimated_minutes, Some(m) if m < 0) {
            return Err(TrackerError::Validation(
                "estimated_minutes must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything shown on a system's page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemDetail {
    pub system: System,
    pub dependencies: Vec<SystemRef>,
    pub dependents: Vec<SystemRef>,
    pub workflows: Vec<NamedRef>,
    pub related_scripts: Vec<NamedRef>,
    pub hosted_scripts: Vec<NamedRef>,
    pub notes: Vec<SystemNote>,
    pub relationships: Vec<SystemRelationship>,
}

/// Impact of losing a system plus how to bring it back
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisasterAnalysis {
    pub system: System,
    pub impact: ImpactReport,
    pub recovery_steps: Vec<RecoveryStep>,
    pub total_estimated_minutes: i64,
}

/// Direction for manual reordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub direction: MoveDirection,
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    let parsed = url::Url::parse(value)
        .map_err(|e| TrackerError::Validation(format!("{field} is not a valid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(TrackerError::Validation(format!(
            "{field} must use http or https, not {scheme}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_input_requires_name_and_category() {
        let mut input = SystemInput::default();
        assert!(input.validate().is_err());

        input.name = "Banner".to_string();
        assert!(input.validate().is_err());

        input.category = Some(SystemCategory::Core);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_documentation_url_validation() {
        let mut input = SystemInput::new("Banner", SystemCategory::Core);
        input.documentation_url = "not a url".to_string();
        assert!(input.validate().is_err());

        input.documentation_url = "ftp://docs.example.com".to_string();
        assert!(input.validate().is_err());

        input.documentation_url = "https://docs.example.com/banner".to_string();
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_system_input_defaults_status_active() {
        let input: SystemInput =
            serde_json::from_str(r#"{"name": "Slate", "category": "external"}"#).unwrap();
        assert_eq!(input.status, SystemStatus::Active);
        assert_eq!(input.category, Some(SystemCategory::External));
    }

    #[test]
    fn test_relationship_input_tolerates_missing_fields() {
        let batch: RelationshipBatch = serde_json::from_str(
            r#"{"relationships": [{"source_system_id": 1}, {"source_system_id": 1, "target_system_id": 2, "relationship_type": "depends_on"}]}"#,
        )
        .unwrap();
        assert_eq!(batch.relationships.len(), 2);
        assert!(batch.relationships[0].relationship_type.is_none());
        assert_eq!(
            batch.relationships[1].relationship_type,
            Some(RelationshipType::DependsOn)
        );
    }

    #[test]
    fn test_recovery_step_rejects_negative_estimate() {
        let input = RecoveryStepInput {
            title: "Restore backups".to_string(),
            estimated_minutes: Some(-5),
            ..Default::default()
        };
        assert!(input.validate().is_err());
    }
}
