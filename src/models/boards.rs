//! Kanban-style cards and the boards that group them

use super::require_text;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

choice_enum! {
    pub enum CardType {
        Issue => ("issue", "Issue"),
        Idea => ("idea", "Idea"),
        Feature => ("feature", "Feature"),
        Refinement => ("refinement", "Refinement"),
        Task => ("task", "Task"),
    }
}

impl Default for CardType {
    fn default() -> Self {
        CardType::Issue
    }
}

choice_enum! {
    pub enum CardStatus {
        Backlog => ("backlog", "Backlog"),
        InProgress => ("in-progress", "In Progress"),
        Review => ("review", "In Review"),
        Done => ("done", "Done"),
        Archived => ("archived", "Archived"),
    }
}

impl Default for CardStatus {
    fn default() -> Self {
        CardStatus::Backlog
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub card_type: CardType,
    pub status: CardStatus,
    pub position_x: f64,
    pub position_y: f64,
    pub assigned_to: Option<String>,
    pub checked_out: bool,
    pub primary_system_id: Option<i64>,
    pub primary_workflow_id: Option<i64>,
    pub primary_script_id: Option<i64>,
    pub systems: Vec<i64>,
    pub workflows: Vec<i64>,
    pub scripts: Vec<i64>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CardInput {
    pub title: String,
    pub description: String,
    pub card_type: CardType,
    pub status: CardStatus,
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
    pub assigned_to: Option<String>,
    pub primary_system_id: Option<i64>,
    pub primary_workflow_id: Option<i64>,
    pub primary_script_id: Option<i64>,
    pub systems: Vec<i64>,
    pub workflows: Vec<i64>,
    pub scripts: Vec<i64>,
    pub created_by: Option<String>,
}

impl CardInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("title", &self.title)
    }
}

/// `assigned_to` filter: a person or nobody
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssigneeFilter {
    Unassigned,
    User(String),
}

impl<'de> Deserialize<'de> for AssigneeFilter {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(d)?;
        Ok(if value == "unassigned" {
            AssigneeFilter::Unassigned
        } else {
            AssigneeFilter::User(value)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutFilter {
    CheckedOut,
    NotCheckedOut,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardFilter {
    pub status: Option<CardStatus>,
    #[serde(rename = "type")]
    pub card_type: Option<CardType>,
    pub system: Option<i64>,
    pub workflow: Option<i64>,
    pub script: Option<i64>,
    pub assigned_to: Option<AssigneeFilter>,
    pub checked_out: Option<CheckoutFilter>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardComment {
    pub id: i64,
    pub card_id: i64,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CommentInput {
    pub author: String,
    pub text: String,
}

impl CommentInput {
    pub fn validate(&self) -> Result<()> {
        require_text("author", &self.author)?;
        require_text("text", &self.text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardDetail {
    pub card: Card,
    pub comments: Vec<CardComment>,
}

/// Result of a checkout toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutAction {
    CheckedOut,
    CheckedIn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutOutcome {
    pub action: CheckoutAction,
    pub card: Card,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CardPosition {
    pub id: i64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_by: Option<String>,
    pub systems: Vec<i64>,
    pub workflows: Vec<i64>,
    pub scripts: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    pub fn has_context(&self) -> bool {
        !(self.systems.is_empty() && self.workflows.is_empty() && self.scripts.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BoardInput {
    pub name: String,
    pub description: String,
    pub created_by: Option<String>,
    pub systems: Vec<i64>,
    pub workflows: Vec<i64>,
    pub scripts: Vec<i64>,
}

impl BoardInput {
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
pub struct BoardDetail {
    pub board: Board,
    pub cards: Vec<Card>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_filter_from_query_values() {
        let filter: CardFilter = serde_json::from_str(
            r#"{"status": "in-progress", "type": "idea", "assigned_to": "unassigned", "checked_out": "not_checked_out"}"#,
        )
        .unwrap();
        assert_eq!(filter.status, Some(CardStatus::InProgress));
        assert_eq!(filter.card_type, Some(CardType::Idea));
        assert_eq!(filter.assigned_to, Some(AssigneeFilter::Unassigned));
        assert_eq!(filter.checked_out, Some(CheckoutFilter::NotCheckedOut));

        let filter: CardFilter = serde_json::from_str(r#"{"assigned_to": "dana"}"#).unwrap();
        assert_eq!(
            filter.assigned_to,
            Some(AssigneeFilter::User("dana".to_string()))
        );
    }

    #[test]
    fn test_card_input_defaults() {
        let input: CardInput = serde_json::from_str(r#"{"title": "Fix login"}"#).unwrap();
        assert_eq!(input.card_type, CardType::Issue);
        assert_eq!(input.status, CardStatus::Backlog);
        assert!(input.position_x.is_none());
    }

    #[test]
    fn test_comment_requires_text() {
        let input = CommentInput {
            author: "dana".to_string(),
            text: String::new(),
        };
        assert!(input.validate().is_err());
    }
}
