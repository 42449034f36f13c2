//! Business workflows, their ordered steps and saved graph versions

use super::{require_text, NamedRef};
use crate::designer::WorkflowGraph;
use crate::error::{Result, TrackerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

choice_enum! {
    pub enum WorkflowStatus {
        Active => ("active", "Active"),
        Draft => ("draft", "Draft"),
        Archived => ("archived", "Archived"),
    }
}

impl Default for WorkflowStatus {
    fn default() -> Self {
        WorkflowStatus::Draft
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workflow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub status: WorkflowStatus,
    pub version: i64,
    pub graph: WorkflowGraph,
    pub systems: Vec<i64>,
    pub scripts: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata payload; the graph is only written through the designer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorkflowInput {
    pub name: String,
    pub description: String,
    pub status: WorkflowStatus,
    pub systems: Vec<i64>,
    pub scripts: Vec<i64>,
}

impl WorkflowInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowFilter {
    pub status: Option<WorkflowStatus>,
}

/// Immutable snapshot of a graph as it was before a save
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowVersion {
    pub id: i64,
    pub workflow_id: i64,
    pub version: i64,
    pub graph: WorkflowGraph,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

/// Which version to load: the live graph or a stored snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    Current,
    Number(i64),
}

impl std::str::FromStr for VersionSelector {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("current") {
            return Ok(VersionSelector::Current);
        }
        s.parse::<i64>()
            .map(VersionSelector::Number)
            .map_err(|_| TrackerError::Validation(format!("invalid version '{s}'")))
    }
}

/// A version as returned by the versions endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionView {
    pub version: i64,
    pub current: bool,
    pub graph: WorkflowGraph,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowStep {
    pub id: i64,
    pub workflow_id: i64,
    pub step_order: i64,
    pub name: String,
    pub description: String,
    pub system_id: Option<i64>,
    pub inputs: String,
    pub outputs: String,
    pub personnel: String,
    pub estimated_time: String,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorkflowStepInput {
    pub name: String,
    pub description: String,
    pub system_id: Option<i64>,
    pub inputs: String,
    pub outputs: String,
    pub personnel: String,
    pub estimated_time: String,
    pub notes: String,
}

impl WorkflowStepInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDetail {
    pub workflow: Workflow,
    pub steps: Vec<WorkflowStep>,
    pub systems: Vec<NamedRef>,
    pub scripts: Vec<NamedRef>,
}

/// Graph plus the pickable systems and scripts for the designer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DesignerData {
    pub workflow_id: i64,
    pub name: String,
    pub version: i64,
    pub graph: WorkflowGraph,
    pub systems: Vec<NamedRef>,
    pub scripts: Vec<NamedRef>,
}
