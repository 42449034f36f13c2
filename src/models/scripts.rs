//! Automation scripts and how they touch systems

use super::{require_text, NamedRef};
use crate::error::Result;
use crate::models::systems::SystemCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

choice_enum! {
    /// How a script gets triggered
    pub enum ScheduleMethod {
        Cron => ("cron", "Cron"),
        TaskScheduler => ("task_scheduler", "Windows Task Scheduler"),
        Jenkins => ("jenkins", "Jenkins"),
        Airflow => ("airflow", "Apache Airflow"),
        Custom => ("custom", "Custom Scheduler"),
        Manual => ("manual", "Manual Execution"),
        Other => ("other", "Other"),
    }
}

choice_enum! {
    /// Role a system plays for a script
    pub enum ScriptLinkType {
        Input => ("input", "Input"),
        Output => ("output", "Output"),
        Both => ("both", "Both Input & Output"),
        Utility => ("utility", "Utility/Support"),
        Other => ("other", "Other"),
    }
}

impl Default for ScriptLinkType {
    fn default() -> Self {
        ScriptLinkType::Utility
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Script {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub author: String,
    pub hosted_on: Option<i64>,
    pub host_location: String,
    pub path: String,
    pub programming_language: String,
    pub schedule_information: String,
    pub schedule_method: Option<ScheduleMethod>,
    pub custom_schedule_method: String,
    pub documentation: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Script {
    /// Human readable schedule method.
    ///
    /// `other` shows the free-text method when one was given.
    pub fn schedule_display(&self) -> Option<String> {
        match self.schedule_method {
            Some(ScheduleMethod::Other) if !self.custom_schedule_method.is_empty() => {
                Some(self.custom_schedule_method.clone())
            }
            Some(method) => Some(method.label().to_string()),
            None => None,
        }
    }
}

/// A system linked to a script, as sent by clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptSystemLink {
    pub system_id: i64,
    #[serde(default)]
    pub relationship_type: ScriptLinkType,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScriptInput {
    pub name: String,
    pub description: String,
    pub author: String,
    pub hosted_on: Option<i64>,
    pub host_location: String,
    pub path: String,
    pub programming_language: String,
    pub schedule_information: String,
    pub schedule_method: Option<ScheduleMethod>,
    pub custom_schedule_method: String,
    pub documentation: String,
    pub systems: Vec<ScriptSystemLink>,
    pub workflows: Vec<i64>,
}

impl ScriptInput {
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
pub struct ScriptFilter {
    pub language: Option<String>,
    pub schedule_method: Option<ScheduleMethod>,
    pub hosted_on: Option<i64>,
}

/// A linked system with the link metadata, for script detail
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkedSystem {
    pub id: i64,
    pub name: String,
    pub category: SystemCategory,
    pub relationship_type: ScriptLinkType,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptDetail {
    pub script: Script,
    pub schedule_display: Option<String>,
    pub host: Option<NamedRef>,
    pub systems: Vec<LinkedSystem>,
    pub workflows: Vec<NamedRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(method: Option<ScheduleMethod>, custom: &str) -> Script {
        let now = Utc::now();
        Script {
            id: 1,
            name: "nightly_sync.py".to_string(),
            description: String::new(),
            author: String::new(),
            hosted_on: None,
            host_location: String::new(),
            path: String::new(),
            programming_language: "Python".to_string(),
            schedule_information: String::new(),
            schedule_method: method,
            custom_schedule_method: custom.to_string(),
            documentation: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_schedule_display() {
        assert_eq!(script(None, "").schedule_display(), None);
        assert_eq!(
            script(Some(ScheduleMethod::TaskScheduler), "").schedule_display(),
            Some("Windows Task Scheduler".to_string())
        );
        assert_eq!(
            script(Some(ScheduleMethod::Other), "Control-M").schedule_display(),
            Some("Control-M".to_string())
        );
        assert_eq!(
            script(Some(ScheduleMethod::Other), "").schedule_display(),
            Some("Other".to_string())
        );
        // Shown verbatim
        assert_eq!(
            script(Some(ScheduleMethod::Other), " cron on host2 ").schedule_display(),
            Some(" cron on host2 ".to_string())
        );
    }

    #[test]
    fn test_link_defaults_to_utility() {
        let link: ScriptSystemLink = serde_json::from_str(r#"{"system_id": 3}"#).unwrap();
        assert_eq!(link.relationship_type, ScriptLinkType::Utility);
        assert!(link.description.is_empty());
    }
}
