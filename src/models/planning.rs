//! Strategic planning: initiatives, plans, milestones, tasks, resources,
//! risks and document records.

use super::{require_non_negative, require_text, ChoiceCount};
use crate::error::{Result, TrackerError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

choice_enum! {
    pub enum InitiativeStatus {
        Proposed => ("proposed", "Proposed"),
        Approved => ("approved", "Approved"),
        InProgress => ("in_progress", "In Progress"),
        Completed => ("completed", "Completed"),
        Canceled => ("canceled", "Canceled"),
    }
}

impl Default for InitiativeStatus {
    fn default() -> Self {
        InitiativeStatus::Proposed
    }
}

choice_enum! {
    pub enum Priority {
        High => ("high", "High"),
        Medium => ("medium", "Medium"),
        Low => ("low", "Low"),
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

choice_enum! {
    pub enum PlanStatus {
        Draft => ("draft", "Draft"),
        Approved => ("approved", "Approved"),
        InProgress => ("in_progress", "In Progress"),
        Completed => ("completed", "Completed"),
        Canceled => ("canceled", "Canceled"),
    }
}

impl Default for PlanStatus {
    fn default() -> Self {
        PlanStatus::Draft
    }
}

choice_enum! {
    pub enum MilestoneStatus {
        Pending => ("pending", "Pending"),
        InProgress => ("in_progress", "In Progress"),
        Completed => ("completed", "Completed"),
        Missed => ("missed", "Missed"),
        Canceled => ("canceled", "Canceled"),
    }
}

impl Default for MilestoneStatus {
    fn default() -> Self {
        MilestoneStatus::Pending
    }
}

choice_enum! {
    pub enum TaskStatus {
        NotStarted => ("not_started", "Not Started"),
        InProgress => ("in_progress", "In Progress"),
        Blocked => ("blocked", "Blocked"),
        Completed => ("completed", "Completed"),
        Canceled => ("canceled", "Canceled"),
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::NotStarted
    }
}

choice_enum! {
    /// Likelihood or impact of a risk
    pub enum RiskLevel {
        High => ("high", "High"),
        Medium => ("medium", "Medium"),
        Low => ("low", "Low"),
    }
}

choice_enum! {
    pub enum RiskStatus {
        Identified => ("identified", "Identified"),
        Mitigating => ("mitigating", "Mitigating"),
        Monitoring => ("monitoring", "Monitoring"),
        Resolved => ("resolved", "Resolved"),
        Accepted => ("accepted", "Accepted"),
    }
}

impl Default for RiskStatus {
    fn default() -> Self {
        RiskStatus::Identified
    }
}

choice_enum! {
    pub enum DocumentType {
        Requirements => ("requirements", "Requirements"),
        Design => ("design", "Design Document"),
        Review => ("review", "Review Document"),
        Approval => ("approval", "Approval Document"),
        Report => ("report", "Report"),
        MeetingNotes => ("meeting_notes", "Meeting Notes"),
        Other => ("other", "Other"),
    }
}

choice_enum! {
    pub enum DocumentStatus {
        Draft => ("draft", "Draft"),
        Review => ("review", "In Review"),
        Approved => ("approved", "Approved"),
        Superseded => ("superseded", "Superseded"),
    }
}

impl Default for DocumentStatus {
    fn default() -> Self {
        DocumentStatus::Draft
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Initiative {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub status: InitiativeStatus,
    pub priority: Priority,
    pub start_date: Option<NaiveDate>,
    pub target_completion_date: Option<NaiveDate>,
    pub actual_completion_date: Option<NaiveDate>,
    pub budget_allocation: Option<f64>,
    pub resource_requirements: String,
    pub business_justification: String,
    pub success_criteria: String,
    pub owner: Option<String>,
    pub dependencies: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InitiativeInput {
    pub name: String,
    pub description: String,
    pub status: InitiativeStatus,
    pub priority: Priority,
    pub start_date: Option<NaiveDate>,
    pub target_completion_date: Option<NaiveDate>,
    pub actual_completion_date: Option<NaiveDate>,
    pub budget_allocation: Option<f64>,
    pub resource_requirements: String,
    pub business_justification: String,
    pub success_criteria: String,
    pub owner: Option<String>,
    pub dependencies: Vec<i64>,
}

impl InitiativeInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        require_non_negative("budget_allocation", self.budget_allocation)?;
        check_date_order(
            "target_completion_date",
            self.start_date,
            self.target_completion_date,
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitiativeFilter {
    pub status: Option<InitiativeStatus>,
    pub priority: Option<Priority>,
}

/// Initiative row for list views
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitiativeSummary {
    #[serde(flatten)]
    pub initiative: Initiative,
    pub plan_count: i64,
    pub task_count: i64,
    pub risk_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub id: i64,
    pub initiative_id: i64,
    pub name: String,
    pub description: String,
    pub status: PlanStatus,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PlanInput {
    pub initiative_id: i64,
    pub name: String,
    pub description: String,
    pub status: PlanStatus,
    pub created_by: Option<String>,
}

impl PlanInput {
    pub fn new(initiative_id: i64, name: impl Into<String>) -> Self {
        Self {
            initiative_id,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanFilter {
    pub initiative: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Milestone {
    pub id: i64,
    pub plan_id: i64,
    pub name: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub status: MilestoneStatus,
    pub dependencies: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub status: MilestoneStatus,
    #[serde(default)]
    pub dependencies: Vec<i64>,
}

impl MilestoneInput {
    pub fn new(name: impl Into<String>, due_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            due_date,
            status: MilestoneStatus::default(),
            dependencies: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub plan_id: i64,
    pub milestone_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assigned_to: Option<String>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    pub systems: Vec<i64>,
    pub scripts: Vec<i64>,
    pub workflows: Vec<i64>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a task with a due date stands on a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineBucket {
    OnTime,
    Late,
    Overdue,
    Upcoming,
}

impl Task {
    /// Bucket for the timeline adherence report; `None` without a due date.
    pub fn timeline_bucket(&self, as_of: NaiveDate) -> Option<TimelineBucket> {
        let due = self.due_date?;
        let bucket = match (self.status, self.completion_date) {
            (TaskStatus::Completed, Some(done)) if done <= due => TimelineBucket::OnTime,
            (TaskStatus::Completed, Some(_)) => TimelineBucket::Late,
            (TaskStatus::Completed, None) => TimelineBucket::OnTime,
            _ if due < as_of => TimelineBucket::Overdue,
            _ => TimelineBucket::Upcoming,
        };
        Some(bucket)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TaskInput {
    pub plan_id: i64,
    pub milestone_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub assigned_to: Option<String>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    pub systems: Vec<i64>,
    pub scripts: Vec<i64>,
    pub workflows: Vec<i64>,
    pub notes: String,
}

impl TaskInput {
    pub fn new(plan_id: i64, name: impl Into<String>) -> Self {
        Self {
            plan_id,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        require_non_negative("estimated_hours", self.estimated_hours)?;
        require_non_negative("actual_hours", self.actual_hours)?;
        check_date_order("due_date", self.start_date, self.due_date)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub plan: Option<i64>,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceAllocation {
    pub id: i64,
    pub initiative_id: Option<i64>,
    pub plan_id: Option<i64>,
    pub person: String,
    pub role: String,
    pub allocation_percentage: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cost_center: String,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceAllocation {
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInput {
    #[serde(default)]
    pub initiative_id: Option<i64>,
    #[serde(default)]
    pub plan_id: Option<i64>,
    pub person: String,
    pub role: String,
    pub allocation_percentage: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub cost_center: String,
    #[serde(default)]
    pub estimated_cost: Option<f64>,
    #[serde(default)]
    pub actual_cost: Option<f64>,
    #[serde(default)]
    pub notes: String,
}

impl ResourceInput {
    pub fn validate(&self) -> Result<()> {
        if self.initiative_id.is_none() && self.plan_id.is_none() {
            return Err(TrackerError::Validation(
                "a resource allocation must belong to an initiative or a plan".to_string(),
            ));
        }
        require_text("person", &self.person)?;
        require_text("role", &self.role)?;
        if !(0.0..=100.0).contains(&self.allocation_percentage) {
            return Err(TrackerError::Validation(
                "allocation_percentage must be between 0 and 100".to_string(),
            ));
        }
        require_non_negative("estimated_cost", self.estimated_cost)?;
        require_non_negative("actual_cost", self.actual_cost)?;
        check_date_order("end_date", Some(self.start_date), Some(self.end_date))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Risk {
    pub id: i64,
    pub initiative_id: i64,
    pub description: String,
    pub likelihood: RiskLevel,
    pub impact: RiskLevel,
    pub mitigation_strategy: String,
    pub owner: Option<String>,
    pub status: RiskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskInput {
    pub description: String,
    pub likelihood: RiskLevel,
    pub impact: RiskLevel,
    #[serde(default)]
    pub mitigation_strategy: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub status: RiskStatus,
}

impl RiskInput {
    pub fn validate(&self) -> Result<()> {
        require_text("description", &self.description)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanningDocument {
    pub id: i64,
    pub initiative_id: Option<i64>,
    pub plan_id: Option<i64>,
    pub task_id: Option<i64>,
    pub name: String,
    pub location: String,
    pub document_type: DocumentType,
    pub version: String,
    pub status: DocumentStatus,
    pub description: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInput {
    #[serde(default)]
    pub initiative_id: Option<i64>,
    #[serde(default)]
    pub plan_id: Option<i64>,
    #[serde(default)]
    pub task_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub location: String,
    pub document_type: DocumentType,
    #[serde(default = "default_document_version")]
    pub version: String,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

fn default_document_version() -> String {
    "1.0".to_string()
}

impl DocumentInput {
    pub fn validate(&self) -> Result<()> {
        if self.initiative_id.is_none() && self.plan_id.is_none() && self.task_id.is_none() {
            return Err(TrackerError::Validation(
                "a document must be attached to an initiative, a plan or a task".to_string(),
            ));
        }
        require_text("name", &self.name)?;
        require_text("version", &self.version)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitiativeDetail {
    pub initiative: Initiative,
    pub plans: Vec<Plan>,
    pub milestones: Vec<Milestone>,
    pub tasks: Vec<Task>,
    pub resources: Vec<ResourceAllocation>,
    pub risks: Vec<Risk>,
    pub documents: Vec<PlanningDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanDetail {
    pub plan: Plan,
    pub milestones: Vec<Milestone>,
    pub tasks: Vec<Task>,
    pub resources: Vec<ResourceAllocation>,
    pub documents: Vec<PlanningDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanningDashboard {
    pub initiative_counts: Vec<ChoiceCount>,
    pub task_counts: Vec<ChoiceCount>,
    pub my_tasks: Vec<Task>,
    pub upcoming_milestones: Vec<Milestone>,
    pub recent_initiatives: Vec<Initiative>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitiativeProgress {
    pub id: i64,
    pub name: String,
    pub status: InitiativeStatus,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitiativeStatusReport {
    pub status_counts: Vec<ChoiceCount>,
    pub initiatives: Vec<InitiativeProgress>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonUtilization {
    pub person: String,
    pub total_allocation: f64,
    pub allocation_count: i64,
    pub estimated_cost: f64,
    pub actual_cost: f64,
    pub over_allocated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceUtilizationReport {
    pub as_of: NaiveDate,
    pub people: Vec<PersonUtilization>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineAdherenceReport {
    pub as_of: NaiveDate,
    pub on_time: i64,
    pub late: i64,
    pub overdue: i64,
    pub upcoming: i64,
    pub overdue_tasks: Vec<Task>,
    pub missed_milestones: Vec<Milestone>,
}

/// `?as_of=YYYY-MM-DD` for the date-sensitive reports
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub as_of: Option<NaiveDate>,
}

/// Share of tasks completed, as a percentage rounded to one decimal.
pub fn completion_percentage(completed: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (completed as f64 * 1000.0 / total as f64).round() / 10.0
}

fn check_date_order(field: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    match (start, end) {
        (Some(s), Some(e)) if e < s => Err(TrackerError::Validation(format!(
            "{field} must not be before the start date"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn task(status: TaskStatus, due: Option<&str>, done: Option<&str>) -> Task {
        let now = Utc::now();
        Task {
            id: 1,
            plan_id: 1,
            milestone_id: None,
            name: "Migrate DNS".to_string(),
            description: String::new(),
            status,
            priority: Priority::Medium,
            assigned_to: None,
            estimated_hours: None,
            actual_hours: None,
            start_date: None,
            due_date: due.map(date),
            completion_date: done.map(date),
            systems: vec![],
            scripts: vec![],
            workflows: vec![],
            notes: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_timeline_buckets() {
        let today = date("2024-06-15");
        assert_eq!(task(TaskStatus::InProgress, None, None).timeline_bucket(today), None);
        assert_eq!(
            task(TaskStatus::Completed, Some("2024-06-10"), Some("2024-06-10")).timeline_bucket(today),
            Some(TimelineBucket::OnTime)
        );
        assert_eq!(
            task(TaskStatus::Completed, Some("2024-06-10"), Some("2024-06-12")).timeline_bucket(today),
            Some(TimelineBucket::Late)
        );
        assert_eq!(
            task(TaskStatus::Blocked, Some("2024-06-14"), None).timeline_bucket(today),
            Some(TimelineBucket::Overdue)
        );
        assert_eq!(
            task(TaskStatus::NotStarted, Some("2024-06-15"), None).timeline_bucket(today),
            Some(TimelineBucket::Upcoming)
        );
    }

    #[test]
    fn test_resource_input_validation() {
        let mut input = ResourceInput {
            initiative_id: None,
            plan_id: None,
            person: "dana".to_string(),
            role: "DBA".to_string(),
            allocation_percentage: 50.0,
            start_date: date("2024-01-01"),
            end_date: date("2024-03-31"),
            cost_center: String::new(),
            estimated_cost: None,
            actual_cost: None,
            notes: String::new(),
        };
        assert!(input.validate().is_err());

        input.plan_id = Some(1);
        assert!(input.validate().is_ok());

        input.allocation_percentage = 120.0;
        assert!(input.validate().is_err());

        input.allocation_percentage = 100.0;
        input.end_date = date("2023-12-31");
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_document_defaults_and_parent_check() {
        let input: DocumentInput =
            serde_json::from_str(r#"{"name": "Cutover plan", "document_type": "design"}"#).unwrap();
        assert_eq!(input.version, "1.0");
        assert_eq!(input.status, DocumentStatus::Draft);
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_completion_percentage() {
        assert_eq!(completion_percentage(0, 0), 0.0);
        assert_eq!(completion_percentage(1, 3), 33.3);
        assert_eq!(completion_percentage(4, 4), 100.0);
    }
}
