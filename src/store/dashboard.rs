//! Read-only aggregates for the landing page and the visualisation endpoints.

use super::{count_by, Store};
use crate::error::Result;
use crate::models::{
    ChoiceCount, InitiativeStatus, MilestoneStatus, PlanStatus, Priority, ScheduleMethod,
    ScriptLinkType, SystemCategory, SystemStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

const RECENT_LIMIT: i64 = 5;

/// A recently updated record in one of the dashboard lists
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecentRecord {
    pub id: i64,
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardStats {
    pub system_count: i64,
    pub workflow_count: i64,
    pub script_count: i64,
    pub active_systems: i64,
    pub deprecated_systems: i64,
    pub recent_systems: Vec<RecentRecord>,
    pub recent_workflows: Vec<RecentRecord>,
    pub recent_scripts: Vec<RecentRecord>,
    pub category_counts: Vec<ChoiceCount>,
    pub status_counts: Vec<ChoiceCount>,
}

/// Row totals per record kind, exported as gauges.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RecordCounts {
    pub systems: i64,
    pub scripts: i64,
    pub workflows: i64,
    pub boards: i64,
    pub cards: i64,
    pub initiatives: i64,
    pub plans: i64,
    pub tasks: i64,
}

impl RecordCounts {
    pub fn by_kind(&self) -> [(&'static str, i64); 8] {
        [
            ("systems", self.systems),
            ("scripts", self.scripts),
            ("workflows", self.workflows),
            ("boards", self.boards),
            ("cards", self.cards),
            ("initiatives", self.initiatives),
            ("plans", self.plans),
            ("tasks", self.tasks),
        ]
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScriptGraphNode {
    System {
        id: String,
        name: String,
        category: SystemCategory,
        status: SystemStatus,
    },
    Script {
        id: String,
        name: String,
        language: String,
        schedule_method: Option<ScheduleMethod>,
        hosted_on: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScriptGraphLink {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: ScriptLinkType,
    pub description: String,
}

/// Scripts and the systems they touch, keyed `script-<id>` / `system-<id>`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SystemScriptGraph {
    pub nodes: Vec<ScriptGraphNode>,
    pub links: Vec<ScriptGraphLink>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScriptHost {
    pub id: i64,
    pub name: String,
    pub category: SystemCategory,
    pub status: SystemStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HostedScript {
    pub id: i64,
    pub name: String,
    pub language: String,
    pub schedule_method: Option<ScheduleMethod>,
    pub host_id: Option<i64>,
    pub host_location: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HostScriptData {
    pub hosts: Vec<ScriptHost>,
    pub scripts: Vec<HostedScript>,
    pub languages: Vec<String>,
    pub schedule_methods: Vec<ScheduleMethod>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimelineInitiative {
    pub id: i64,
    pub name: String,
    pub status: InitiativeStatus,
    pub priority: Priority,
    pub start_date: Option<NaiveDate>,
    pub target_completion_date: Option<NaiveDate>,
    pub actual_completion_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimelinePlan {
    pub id: i64,
    pub name: String,
    pub status: PlanStatus,
    pub initiative_id: i64,
    pub initiative_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimelineMilestone {
    pub id: i64,
    pub name: String,
    pub status: MilestoneStatus,
    pub plan_id: i64,
    pub plan_name: String,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    MilestoneDependency,
    InitiativeDependency,
}

/// `target` depends on `source`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimelineDependency {
    pub source: i64,
    pub target: i64,
    #[serde(rename = "type")]
    pub kind: DependencyKind,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimelineData {
    pub initiatives: Vec<TimelineInitiative>,
    pub plans: Vec<TimelinePlan>,
    pub milestones: Vec<TimelineMilestone>,
    pub dependencies: Vec<TimelineDependency>,
}

fn count(conn: &Connection, table: &str) -> Result<i64> {
    Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?)
}

fn recent(conn: &Connection, table: &str) -> Result<Vec<RecentRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name, updated_at FROM {table} ORDER BY updated_at DESC, id DESC LIMIT ?1"
    ))?;
    let records = stmt
        .query_map(params![RECENT_LIMIT], |row| {
            Ok(RecentRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

fn dependency_edges(
    conn: &Connection,
    table: &str,
    owner_col: &str,
    kind: DependencyKind,
) -> Result<Vec<TimelineDependency>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT depends_on_id, {owner_col} FROM {table} ORDER BY {owner_col}, depends_on_id"
    ))?;
    let edges = stmt
        .query_map([], |row| {
            Ok(TimelineDependency {
                source: row.get(0)?,
                target: row.get(1)?,
                kind,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(edges)
}

impl Store {
    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        let conn = self.conn()?;
        let status_counts = count_by::<SystemStatus>(&conn, "systems", "status")?;
        let status_total = |status: SystemStatus| {
            status_counts
                .iter()
                .find(|c| c.value == status.as_str())
                .map_or(0, |c| c.count)
        };

        Ok(DashboardStats {
            system_count: count(&conn, "systems")?,
            workflow_count: count(&conn, "workflows")?,
            script_count: count(&conn, "scripts")?,
            active_systems: status_total(SystemStatus::Active),
            deprecated_systems: status_total(SystemStatus::Deprecated),
            recent_systems: recent(&conn, "systems")?,
            recent_workflows: recent(&conn, "workflows")?,
            recent_scripts: recent(&conn, "scripts")?,
            category_counts: count_by::<SystemCategory>(&conn, "systems", "category")?,
            status_counts,
        })
    }

    pub fn record_counts(&self) -> Result<RecordCounts> {
        let conn = self.conn()?;
        Ok(RecordCounts {
            systems: count(&conn, "systems")?,
            scripts: count(&conn, "scripts")?,
            workflows: count(&conn, "workflows")?,
            boards: count(&conn, "boards")?,
            cards: count(&conn, "cards")?,
            initiatives: count(&conn, "initiatives")?,
            plans: count(&conn, "plans")?,
            tasks: count(&conn, "tasks")?,
        })
    }

    /// Only systems linked to at least one script appear as nodes.
    pub fn system_script_graph(&self) -> Result<SystemScriptGraph> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT DISTINCT s.id, s.name, s.category, s.status
             FROM systems s JOIN script_systems ss ON ss.system_id = s.id
             ORDER BY s.name, s.id",
        )?;
        let mut nodes = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                Ok(ScriptGraphNode::System {
                    id: format!("system-{id}"),
                    name: row.get(1)?,
                    category: row.get(2)?,
                    status: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT sc.id, sc.name, sc.programming_language, sc.schedule_method, h.name
             FROM scripts sc LEFT JOIN systems h ON h.id = sc.hosted_on
             ORDER BY sc.name, sc.id",
        )?;
        let scripts = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                Ok(ScriptGraphNode::Script {
                    id: format!("script-{id}"),
                    name: row.get(1)?,
                    language: row.get(2)?,
                    schedule_method: row.get(3)?,
                    hosted_on: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        nodes.extend(scripts);

        let mut stmt = conn.prepare(
            "SELECT script_id, system_id, relationship_type, description
             FROM script_systems ORDER BY script_id, system_id",
        )?;
        let links = stmt
            .query_map([], |row| {
                let script: i64 = row.get(0)?;
                let system: i64 = row.get(1)?;
                Ok(ScriptGraphLink {
                    source: format!("script-{script}"),
                    target: format!("system-{system}"),
                    kind: row.get(2)?,
                    description: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(SystemScriptGraph { nodes, links })
    }

    pub fn host_script_data(&self) -> Result<HostScriptData> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, name, category, status FROM systems
             WHERE id IN (SELECT hosted_on FROM scripts WHERE hosted_on IS NOT NULL)
             ORDER BY name, id",
        )?;
        let hosts = stmt
            .query_map([], |row| {
                Ok(ScriptHost {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    category: row.get(2)?,
                    status: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT id, name, programming_language, schedule_method, hosted_on, host_location
             FROM scripts ORDER BY name, id",
        )?;
        let scripts = stmt
            .query_map([], |row| {
                Ok(HostedScript {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    language: row.get(2)?,
                    schedule_method: row.get(3)?,
                    host_id: row.get(4)?,
                    host_location: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let languages: BTreeSet<String> = scripts
            .iter()
            .filter(|s| !s.language.is_empty())
            .map(|s| s.language.clone())
            .collect();
        let mut schedule_methods: Vec<ScheduleMethod> =
            scripts.iter().filter_map(|s| s.schedule_method).collect();
        schedule_methods.sort_by_key(|m| m.as_str());
        schedule_methods.dedup();

        Ok(HostScriptData {
            hosts,
            scripts,
            languages: languages.into_iter().collect(),
            schedule_methods,
        })
    }

    pub fn timeline_data(&self) -> Result<TimelineData> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, name, status, priority, start_date, target_completion_date,
                    actual_completion_date
             FROM initiatives ORDER BY id",
        )?;
        let initiatives = stmt
            .query_map([], |row| {
                Ok(TimelineInitiative {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    status: row.get(2)?,
                    priority: row.get(3)?,
                    start_date: row.get(4)?,
                    target_completion_date: row.get(5)?,
                    actual_completion_date: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let initiative_names: BTreeMap<i64, String> = initiatives
            .iter()
            .map(|i| (i.id, i.name.clone()))
            .collect();

        let mut stmt = conn.prepare(
            "SELECT id, name, status, initiative_id, created_at, updated_at
             FROM plans ORDER BY id",
        )?;
        let plans = stmt
            .query_map([], |row| {
                let initiative_id: i64 = row.get(3)?;
                Ok(TimelinePlan {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    status: row.get(2)?,
                    initiative_id,
                    initiative_name: initiative_names
                        .get(&initiative_id)
                        .cloned()
                        .unwrap_or_default(),
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT m.id, m.name, m.status, m.plan_id, p.name, m.due_date
             FROM milestones m JOIN plans p ON p.id = m.plan_id
             ORDER BY m.due_date, m.id",
        )?;
        let milestones = stmt
            .query_map([], |row| {
                Ok(TimelineMilestone {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    status: row.get(2)?,
                    plan_id: row.get(3)?,
                    plan_name: row.get(4)?,
                    due_date: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut dependencies = dependency_edges(
            &conn,
            "milestone_dependencies",
            "milestone_id",
            DependencyKind::MilestoneDependency,
        )?;
        dependencies.extend(dependency_edges(
            &conn,
            "initiative_dependencies",
            "initiative_id",
            DependencyKind::InitiativeDependency,
        )?);

        Ok(TimelineData {
            initiatives,
            plans,
            milestones,
            dependencies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        InitiativeInput, MilestoneInput, PlanInput, ScriptInput, ScriptSystemLink, SystemInput,
    };

    #[test]
    fn test_dashboard_counts() {
        let store = Store::in_memory().unwrap();
        store
            .create_system(&SystemInput::new("Banner", SystemCategory::Core))
            .unwrap();
        let mut old = SystemInput::new("Legacy LMS", SystemCategory::External);
        old.status = SystemStatus::Deprecated;
        store.create_system(&old).unwrap();

        let stats = store.dashboard_stats().unwrap();
        assert_eq!(stats.system_count, 2);
        assert_eq!(stats.active_systems, 1);
        assert_eq!(stats.deprecated_systems, 1);
        assert_eq!(stats.recent_systems.len(), 2);
        assert_eq!(stats.category_counts.len(), SystemCategory::ALL.len());

        let counts = store.record_counts().unwrap();
        assert_eq!(counts.systems, 2);
        assert_eq!(counts.cards, 0);
    }

    #[test]
    fn test_system_script_graph() {
        let store = Store::in_memory().unwrap();
        let host = store
            .create_system(&SystemInput::new("jobs01", SystemCategory::Custom))
            .unwrap();
        let banner = store
            .create_system(&SystemInput::new("Banner", SystemCategory::Core))
            .unwrap();
        let mut input = ScriptInput::new("sync.py");
        input.hosted_on = Some(host.id);
        input.programming_language = "Python".to_string();
        input.schedule_method = Some(ScheduleMethod::Cron);
        input.systems = vec![ScriptSystemLink {
            system_id: banner.id,
            relationship_type: ScriptLinkType::Input,
            description: String::new(),
        }];
        let script = store.create_script(&input).unwrap();

        let graph = store.system_script_graph().unwrap();
        // jobs01 only hosts the script; it is not linked
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.links.len(), 1);
        assert_eq!(graph.links[0].source, format!("script-{}", script.id));
        assert_eq!(graph.links[0].target, format!("system-{}", banner.id));

        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["nodes"][0]["type"], "system");
        assert_eq!(json["nodes"][1]["hosted_on"], "jobs01");

        let hosts = store.host_script_data().unwrap();
        assert_eq!(hosts.hosts.len(), 1);
        assert_eq!(hosts.hosts[0].id, host.id);
        assert_eq!(hosts.languages, vec!["Python".to_string()]);
        assert_eq!(hosts.schedule_methods, vec![ScheduleMethod::Cron]);
    }

    #[test]
    fn test_timeline_dependencies() {
        let store = Store::in_memory().unwrap();
        let a = store.create_initiative(&InitiativeInput::new("A")).unwrap();
        let mut b = InitiativeInput::new("B");
        b.dependencies = vec![a.id];
        let b = store.create_initiative(&b).unwrap();
        let plan = store.create_plan(&PlanInput::new(a.id, "Plan")).unwrap();
        let due = NaiveDate::from_ymd_opt(2024, 9, 1).unwrap();
        let first = store
            .create_milestone(plan.id, &MilestoneInput::new("First", due))
            .unwrap();
        let mut second = MilestoneInput::new("Second", due);
        second.dependencies = vec![first.id];
        let second = store.create_milestone(plan.id, &second).unwrap();

        let data = store.timeline_data().unwrap();
        assert_eq!(data.plans[0].initiative_name, "A");
        assert_eq!(data.milestones[0].plan_name, "Plan");
        assert_eq!(
            data.dependencies,
            vec![
                TimelineDependency {
                    source: first.id,
                    target: second.id,
                    kind: DependencyKind::MilestoneDependency,
                },
                TimelineDependency {
                    source: a.id,
                    target: b.id,
                    kind: DependencyKind::InitiativeDependency,
                },
            ]
        );
    }
}
