//! Initiatives, plans, milestones, tasks, resources, risks, documents and
//! the planning reports.

use super::{count_by, ensure_exists, load_links, now, or_not_found, replace_links, Store};
use crate::error::{Result, TrackerError};
use crate::models::{
    completion_percentage, DocumentInput, Initiative, InitiativeDetail, InitiativeFilter,
    InitiativeInput, InitiativeProgress, InitiativeStatus, InitiativeStatusReport,
    InitiativeSummary, Milestone, MilestoneInput, MilestoneStatus, PersonUtilization, Plan,
    PlanDetail, PlanFilter, PlanInput, PlanningDashboard, PlanningDocument, ResourceAllocation,
    ResourceInput, ResourceUtilizationReport, Risk, RiskInput, Task, TaskFilter, TaskInput,
    TaskStatus, TimelineAdherenceReport, TimelineBucket,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Params, Row};
use std::collections::BTreeMap;
use tracing::{debug, info};

const INITIATIVE_COLUMNS: &str = "id, name, description, status, priority, start_date, \
     target_completion_date, actual_completion_date, budget_allocation, resource_requirements, \
     business_justification, success_criteria, owner, created_at, updated_at";

const PLAN_COLUMNS: &str =
    "id, initiative_id, name, description, status, created_by, created_at, updated_at";

const MILESTONE_COLUMNS: &str =
    "id, plan_id, name, description, due_date, status, created_at, updated_at";

const TASK_COLUMNS: &str = "id, plan_id, milestone_id, name, description, status, priority, \
     assigned_to, estimated_hours, actual_hours, start_date, due_date, completion_date, notes, \
     created_at, updated_at";

const RESOURCE_COLUMNS: &str = "id, initiative_id, plan_id, person, role, \
     allocation_percentage, start_date, end_date, cost_center, estimated_cost, actual_cost, \
     notes, created_at, updated_at";

const RISK_COLUMNS: &str = "id, initiative_id, description, likelihood, impact, \
     mitigation_strategy, owner, status, created_at, updated_at";

const DOCUMENT_COLUMNS: &str = "id, initiative_id, plan_id, task_id, name, location, \
     document_type, version, status, description, created_by, created_at, updated_at";

/// How many milestones and initiatives the dashboard shows
const DASHBOARD_LIMIT: i64 = 5;

fn initiative_from_row(row: &Row<'_>) -> rusqlite::Result<Initiative> {
    Ok(Initiative {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        priority: row.get(4)?,
        start_date: row.get(5)?,
        target_completion_date: row.get(6)?,
        actual_completion_date: row.get(7)?,
        budget_allocation: row.get(8)?,
        resource_requirements: row.get(9)?,
        business_justification: row.get(10)?,
        success_criteria: row.get(11)?,
        owner: row.get(12)?,
        dependencies: Vec::new(),
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn plan_from_row(row: &Row<'_>) -> rusqlite::Result<Plan> {
    Ok(Plan {
        id: row.get(0)?,
        initiative_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        status: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn milestone_from_row(row: &Row<'_>) -> rusqlite::Result<Milestone> {
    Ok(Milestone {
        id: row.get(0)?,
        plan_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        due_date: row.get(4)?,
        status: row.get(5)?,
        dependencies: Vec::new(),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        plan_id: row.get(1)?,
        milestone_id: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        status: row.get(5)?,
        priority: row.get(6)?,
        assigned_to: row.get(7)?,
        estimated_hours: row.get(8)?,
        actual_hours: row.get(9)?,
        start_date: row.get(10)?,
        due_date: row.get(11)?,
        completion_date: row.get(12)?,
        systems: Vec::new(),
        scripts: Vec::new(),
        workflows: Vec::new(),
        notes: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<ResourceAllocation> {
    Ok(ResourceAllocation {
        id: row.get(0)?,
        initiative_id: row.get(1)?,
        plan_id: row.get(2)?,
        person: row.get(3)?,
        role: row.get(4)?,
        allocation_percentage: row.get(5)?,
        start_date: row.get(6)?,
        end_date: row.get(7)?,
        cost_center: row.get(8)?,
        estimated_cost: row.get(9)?,
        actual_cost: row.get(10)?,
        notes: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn risk_from_row(row: &Row<'_>) -> rusqlite::Result<Risk> {
    Ok(Risk {
        id: row.get(0)?,
        initiative_id: row.get(1)?,
        description: row.get(2)?,
        likelihood: row.get(3)?,
        impact: row.get(4)?,
        mitigation_strategy: row.get(5)?,
        owner: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<PlanningDocument> {
    Ok(PlanningDocument {
        id: row.get(0)?,
        initiative_id: row.get(1)?,
        plan_id: row.get(2)?,
        task_id: row.get(3)?,
        name: row.get(4)?,
        location: row.get(5)?,
        document_type: row.get(6)?,
        version: row.get(7)?,
        status: row.get(8)?,
        description: row.get(9)?,
        created_by: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn query_rows<T, P: Params>(
    conn: &Connection,
    sql: &str,
    args: P,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(args, map)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn with_initiative_links(conn: &Connection, mut initiative: Initiative) -> Result<Initiative> {
    initiative.dependencies = load_links(
        conn,
        "initiative_dependencies",
        "initiative_id",
        "depends_on_id",
        initiative.id,
    )?;
    Ok(initiative)
}

fn with_milestone_links(conn: &Connection, mut milestone: Milestone) -> Result<Milestone> {
    milestone.dependencies = load_links(
        conn,
        "milestone_dependencies",
        "milestone_id",
        "depends_on_id",
        milestone.id,
    )?;
    Ok(milestone)
}

fn with_task_links(conn: &Connection, mut task: Task) -> Result<Task> {
    task.systems = load_links(conn, "task_systems", "task_id", "system_id", task.id)?;
    task.scripts = load_links(conn, "task_scripts", "task_id", "script_id", task.id)?;
    task.workflows = load_links(conn, "task_workflows", "task_id", "workflow_id", task.id)?;
    Ok(task)
}

fn initiatives_where<P: Params>(conn: &Connection, tail: &str, args: P) -> Result<Vec<Initiative>> {
    query_rows(
        conn,
        &format!("SELECT {INITIATIVE_COLUMNS} FROM initiatives {tail}"),
        args,
        initiative_from_row,
    )?
    .into_iter()
    .map(|i| with_initiative_links(conn, i))
    .collect()
}

fn milestones_where<P: Params>(conn: &Connection, tail: &str, args: P) -> Result<Vec<Milestone>> {
    query_rows(
        conn,
        &format!("SELECT {MILESTONE_COLUMNS} FROM milestones {tail}"),
        args,
        milestone_from_row,
    )?
    .into_iter()
    .map(|m| with_milestone_links(conn, m))
    .collect()
}

fn tasks_where<P: Params>(conn: &Connection, tail: &str, args: P) -> Result<Vec<Task>> {
    query_rows(
        conn,
        &format!("SELECT {TASK_COLUMNS} FROM tasks {tail}"),
        args,
        task_from_row,
    )?
    .into_iter()
    .map(|t| with_task_links(conn, t))
    .collect()
}

fn load_initiative(conn: &Connection, id: i64) -> Result<Initiative> {
    let initiative = or_not_found(
        conn.query_row(
            &format!("SELECT {INITIATIVE_COLUMNS} FROM initiatives WHERE id = ?1"),
            params![id],
            initiative_from_row,
        ),
        "initiative",
        id,
    )?;
    with_initiative_links(conn, initiative)
}

fn load_plan(conn: &Connection, id: i64) -> Result<Plan> {
    or_not_found(
        conn.query_row(
            &format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = ?1"),
            params![id],
            plan_from_row,
        ),
        "plan",
        id,
    )
}

fn load_milestone(conn: &Connection, id: i64) -> Result<Milestone> {
    let milestone = or_not_found(
        conn.query_row(
            &format!("SELECT {MILESTONE_COLUMNS} FROM milestones WHERE id = ?1"),
            params![id],
            milestone_from_row,
        ),
        "milestone",
        id,
    )?;
    with_milestone_links(conn, milestone)
}

fn load_task(conn: &Connection, id: i64) -> Result<Task> {
    let task = or_not_found(
        conn.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
            task_from_row,
        ),
        "task",
        id,
    )?;
    with_task_links(conn, task)
}

fn load_resource(conn: &Connection, id: i64) -> Result<ResourceAllocation> {
    or_not_found(
        conn.query_row(
            &format!("SELECT {RESOURCE_COLUMNS} FROM resource_allocations WHERE id = ?1"),
            params![id],
            resource_from_row,
        ),
        "resource allocation",
        id,
    )
}

fn load_risk(conn: &Connection, id: i64) -> Result<Risk> {
    or_not_found(
        conn.query_row(
            &format!("SELECT {RISK_COLUMNS} FROM risks WHERE id = ?1"),
            params![id],
            risk_from_row,
        ),
        "risk",
        id,
    )
}

fn load_document(conn: &Connection, id: i64) -> Result<PlanningDocument> {
    or_not_found(
        conn.query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM planning_documents WHERE id = ?1"),
            params![id],
            document_from_row,
        ),
        "planning document",
        id,
    )
}

/// Every dependency must exist and must not be the record itself.
fn check_dependencies(
    conn: &Connection,
    table: &str,
    entity: &'static str,
    own_id: Option<i64>,
    ids: &[i64],
) -> Result<()> {
    for &dep in ids {
        if Some(dep) == own_id {
            return Err(TrackerError::Validation(format!(
                "{entity} cannot depend on itself"
            )));
        }
        ensure_exists(conn, table, entity, dep)?;
    }
    Ok(())
}

fn write_task_links(conn: &Connection, id: i64, input: &TaskInput) -> Result<()> {
    for (table, entity, ids) in [
        ("systems", "system", &input.systems),
        ("scripts", "script", &input.scripts),
        ("workflows", "workflow", &input.workflows),
    ] {
        for other in ids {
            ensure_exists(conn, table, entity, *other)?;
        }
    }
    replace_links(conn, "task_systems", "task_id", "system_id", id, &input.systems)?;
    replace_links(conn, "task_scripts", "task_id", "script_id", id, &input.scripts)?;
    replace_links(conn, "task_workflows", "task_id", "workflow_id", id, &input.workflows)
}

/// A task's milestone must sit in the task's own plan.
fn check_milestone(conn: &Connection, plan_id: i64, milestone_id: Option<i64>) -> Result<()> {
    let Some(milestone_id) = milestone_id else {
        return Ok(());
    };
    let milestone = load_milestone(conn, milestone_id)?;
    if milestone.plan_id != plan_id {
        return Err(TrackerError::Validation(format!(
            "milestone {milestone_id} belongs to a different plan"
        )));
    }
    Ok(())
}

fn check_resource_parents(conn: &Connection, input: &ResourceInput) -> Result<()> {
    if let Some(id) = input.initiative_id {
        ensure_exists(conn, "initiatives", "initiative", id)?;
    }
    if let Some(id) = input.plan_id {
        ensure_exists(conn, "plans", "plan", id)?;
    }
    Ok(())
}

fn delete_row(conn: &Connection, table: &str, entity: &'static str, id: i64) -> Result<()> {
    let deleted = conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
    if deleted == 0 {
        return Err(TrackerError::not_found(entity, id));
    }
    Ok(())
}

const TASK_ORDER: &str = "ORDER BY due_date IS NULL, due_date, id";

impl Store {
    /// Overview for the planning landing page. `user` selects "my tasks".
    pub fn planning_dashboard(&self, user: Option<&str>) -> Result<PlanningDashboard> {
        let conn = self.conn()?;
        let my_tasks = match user.map(str::trim).filter(|u| !u.is_empty()) {
            Some(user) => tasks_where(
                &conn,
                &format!("WHERE assigned_to = ?1 {TASK_ORDER}"),
                params![user],
            )?,
            None => Vec::new(),
        };

        Ok(PlanningDashboard {
            initiative_counts: count_by::<InitiativeStatus>(&conn, "initiatives", "status")?,
            task_counts: count_by::<TaskStatus>(&conn, "tasks", "status")?,
            my_tasks,
            upcoming_milestones: milestones_where(
                &conn,
                "WHERE status IN (?1, ?2) ORDER BY due_date, id LIMIT ?3",
                params![
                    MilestoneStatus::Pending,
                    MilestoneStatus::InProgress,
                    DASHBOARD_LIMIT
                ],
            )?,
            recent_initiatives: initiatives_where(
                &conn,
                "ORDER BY updated_at DESC, id DESC LIMIT ?1",
                params![DASHBOARD_LIMIT],
            )?,
        })
    }

    // ---- initiatives ----

    pub fn list_initiatives(&self, filter: &InitiativeFilter) -> Result<Vec<InitiativeSummary>> {
        let conn = self.conn()?;
        let initiatives = initiatives_where(
            &conn,
            "WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR priority = ?2)
             ORDER BY name, id",
            params![filter.status, filter.priority],
        )?;

        let mut summaries = Vec::with_capacity(initiatives.len());
        for initiative in initiatives {
            let (plan_count, task_count, risk_count) = conn.query_row(
                "SELECT
                     (SELECT COUNT(*) FROM plans WHERE initiative_id = ?1),
                     (SELECT COUNT(*) FROM tasks t JOIN plans p ON p.id = t.plan_id
                      WHERE p.initiative_id = ?1),
                     (SELECT COUNT(*) FROM risks WHERE initiative_id = ?1)",
                params![initiative.id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;
            summaries.push(InitiativeSummary {
                initiative,
                plan_count,
                task_count,
                risk_count,
            });
        }
        Ok(summaries)
    }

    pub fn create_initiative(&self, input: &InitiativeInput) -> Result<Initiative> {
        input.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        check_dependencies(&tx, "initiatives", "initiative", None, &input.dependencies)?;

        let ts = now();
        tx.execute(
            "INSERT INTO initiatives (name, description, status, priority, start_date,
                 target_completion_date, actual_completion_date, budget_allocation,
                 resource_requirements, business_justification, success_criteria, owner,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
            params![
                input.name.trim(),
                input.description,
                input.status,
                input.priority,
                input.start_date,
                input.target_completion_date,
                input.actual_completion_date,
                input.budget_allocation,
                input.resource_requirements,
                input.business_justification,
                input.success_criteria,
                input.owner,
                ts
            ],
        )?;
        let id = tx.last_insert_rowid();
        replace_links(
            &tx,
            "initiative_dependencies",
            "initiative_id",
            "depends_on_id",
            id,
            &input.dependencies,
        )?;
        let initiative = load_initiative(&tx, id)?;
        tx.commit()?;
        info!(initiative_id = id, name = %initiative.name, "Created initiative");
        Ok(initiative)
    }

    pub fn get_initiative(&self, id: i64) -> Result<Initiative> {
        let conn = self.conn()?;
        load_initiative(&conn, id)
    }

    pub fn initiative_detail(&self, id: i64) -> Result<InitiativeDetail> {
        let conn = self.conn()?;
        let initiative = load_initiative(&conn, id)?;
        Ok(InitiativeDetail {
            plans: query_rows(
                &conn,
                &format!("SELECT {PLAN_COLUMNS} FROM plans WHERE initiative_id = ?1 ORDER BY name, id"),
                params![id],
                plan_from_row,
            )?,
            milestones: milestones_where(
                &conn,
                "WHERE plan_id IN (SELECT id FROM plans WHERE initiative_id = ?1)
                 ORDER BY due_date, id",
                params![id],
            )?,
            tasks: tasks_where(
                &conn,
                &format!(
                    "WHERE plan_id IN (SELECT id FROM plans WHERE initiative_id = ?1) {TASK_ORDER}"
                ),
                params![id],
            )?,
            resources: query_rows(
                &conn,
                &format!(
                    "SELECT {RESOURCE_COLUMNS} FROM resource_allocations
                     WHERE initiative_id = ?1 ORDER BY start_date, id"
                ),
                params![id],
                resource_from_row,
            )?,
            risks: query_rows(
                &conn,
                &format!("SELECT {RISK_COLUMNS} FROM risks WHERE initiative_id = ?1 ORDER BY id"),
                params![id],
                risk_from_row,
            )?,
            documents: query_rows(
                &conn,
                &format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM planning_documents
                     WHERE initiative_id = ?1 ORDER BY name, id"
                ),
                params![id],
                document_from_row,
            )?,
            initiative,
        })
    }

    pub fn update_initiative(&self, id: i64, input: &InitiativeInput) -> Result<Initiative> {
        input.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        check_dependencies(&tx, "initiatives", "initiative", Some(id), &input.dependencies)?;

        let changed = tx.execute(
            "UPDATE initiatives SET name = ?1, description = ?2, status = ?3, priority = ?4,
                 start_date = ?5, target_completion_date = ?6, actual_completion_date = ?7,
                 budget_allocation = ?8, resource_requirements = ?9,
                 business_justification = ?10, success_criteria = ?11, owner = ?12,
                 updated_at = ?13
             WHERE id = ?14",
            params![
                input.name.trim(),
                input.description,
                input.status,
                input.priority,
                input.start_date,
                input.target_completion_date,
                input.actual_completion_date,
                input.budget_allocation,
                input.resource_requirements,
                input.business_justification,
                input.success_criteria,
                input.owner,
                now(),
                id
            ],
        )?;
        if changed == 0 {
            return Err(TrackerError::not_found("initiative", id));
        }
        replace_links(
            &tx,
            "initiative_dependencies",
            "initiative_id",
            "depends_on_id",
            id,
            &input.dependencies,
        )?;
        let initiative = load_initiative(&tx, id)?;
        tx.commit()?;
        info!(initiative_id = id, "Updated initiative");
        Ok(initiative)
    }

    /// Deletes the initiative with its plans, risks and attached records.
    pub fn delete_initiative(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        delete_row(&conn, "initiatives", "initiative", id)?;
        info!(initiative_id = id, "Deleted initiative");
        Ok(())
    }

    // ---- plans ----

    pub fn list_plans(&self, filter: &PlanFilter) -> Result<Vec<Plan>> {
        let conn = self.conn()?;
        query_rows(
            &conn,
            &format!(
                "SELECT {PLAN_COLUMNS} FROM plans WHERE (?1 IS NULL OR initiative_id = ?1)
                 ORDER BY name, id"
            ),
            params![filter.initiative],
            plan_from_row,
        )
    }

    pub fn create_plan(&self, input: &PlanInput) -> Result<Plan> {
        input.validate()?;
        let conn = self.conn()?;
        ensure_exists(&conn, "initiatives", "initiative", input.initiative_id)?;
        let ts = now();
        conn.execute(
            "INSERT INTO plans (initiative_id, name, description, status, created_by,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                input.initiative_id,
                input.name.trim(),
                input.description,
                input.status,
                input.created_by,
                ts
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!(plan_id = id, initiative_id = input.initiative_id, "Created plan");
        load_plan(&conn, id)
    }

    pub fn get_plan(&self, id: i64) -> Result<Plan> {
        let conn = self.conn()?;
        load_plan(&conn, id)
    }

    pub fn plan_detail(&self, id: i64) -> Result<PlanDetail> {
        let conn = self.conn()?;
        let plan = load_plan(&conn, id)?;
        Ok(PlanDetail {
            milestones: milestones_where(
                &conn,
                "WHERE plan_id = ?1 ORDER BY due_date, id",
                params![id],
            )?,
            tasks: tasks_where(&conn, &format!("WHERE plan_id = ?1 {TASK_ORDER}"), params![id])?,
            resources: query_rows(
                &conn,
                &format!(
                    "SELECT {RESOURCE_COLUMNS} FROM resource_allocations
                     WHERE plan_id = ?1 ORDER BY start_date, id"
                ),
                params![id],
                resource_from_row,
            )?,
            documents: query_rows(
                &conn,
                &format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM planning_documents
                     WHERE plan_id = ?1 ORDER BY name, id"
                ),
                params![id],
                document_from_row,
            )?,
            plan,
        })
    }

    pub fn update_plan(&self, id: i64, input: &PlanInput) -> Result<Plan> {
        input.validate()?;
        let conn = self.conn()?;
        let current = load_plan(&conn, id)?;
        // 0 means "keep the current initiative"
        let initiative_id = if input.initiative_id > 0 {
            ensure_exists(&conn, "initiatives", "initiative", input.initiative_id)?;
            input.initiative_id
        } else {
            current.initiative_id
        };
        conn.execute(
            "UPDATE plans SET initiative_id = ?1, name = ?2, description = ?3, status = ?4,
                 updated_at = ?5
             WHERE id = ?6",
            params![
                initiative_id,
                input.name.trim(),
                input.description,
                input.status,
                now(),
                id
            ],
        )?;
        info!(plan_id = id, "Updated plan");
        load_plan(&conn, id)
    }

    pub fn delete_plan(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        delete_row(&conn, "plans", "plan", id)?;
        info!(plan_id = id, "Deleted plan");
        Ok(())
    }

    // ---- milestones ----

    pub fn create_milestone(&self, plan_id: i64, input: &MilestoneInput) -> Result<Milestone> {
        input.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_exists(&tx, "plans", "plan", plan_id)?;
        check_dependencies(&tx, "milestones", "milestone", None, &input.dependencies)?;

        let ts = now();
        tx.execute(
            "INSERT INTO milestones (plan_id, name, description, due_date, status,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                plan_id,
                input.name.trim(),
                input.description,
                input.due_date,
                input.status,
                ts
            ],
        )?;
        let id = tx.last_insert_rowid();
        replace_links(
            &tx,
            "milestone_dependencies",
            "milestone_id",
            "depends_on_id",
            id,
            &input.dependencies,
        )?;
        let milestone = load_milestone(&tx, id)?;
        tx.commit()?;
        info!(milestone_id = id, plan_id, "Created milestone");
        Ok(milestone)
    }

    pub fn get_milestone(&self, id: i64) -> Result<Milestone> {
        let conn = self.conn()?;
        load_milestone(&conn, id)
    }

    pub fn update_milestone(&self, id: i64, input: &MilestoneInput) -> Result<Milestone> {
        input.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        check_dependencies(&tx, "milestones", "milestone", Some(id), &input.dependencies)?;

        let changed = tx.execute(
            "UPDATE milestones SET name = ?1, description = ?2, due_date = ?3, status = ?4,
                 updated_at = ?5
             WHERE id = ?6",
            params![
                input.name.trim(),
                input.description,
                input.due_date,
                input.status,
                now(),
                id
            ],
        )?;
        if changed == 0 {
            return Err(TrackerError::not_found("milestone", id));
        }
        replace_links(
            &tx,
            "milestone_dependencies",
            "milestone_id",
            "depends_on_id",
            id,
            &input.dependencies,
        )?;
        let milestone = load_milestone(&tx, id)?;
        tx.commit()?;
        info!(milestone_id = id, "Updated milestone");
        Ok(milestone)
    }

    pub fn delete_milestone(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        delete_row(&conn, "milestones", "milestone", id)?;
        info!(milestone_id = id, "Deleted milestone");
        Ok(())
    }

    // ---- tasks ----

    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let conn = self.conn()?;
        tasks_where(
            &conn,
            &format!(
                "WHERE (?1 IS NULL OR status = ?1)
                   AND (?2 IS NULL OR plan_id = ?2)
                   AND (?3 IS NULL OR assigned_to = ?3)
                 {TASK_ORDER}"
            ),
            params![filter.status, filter.plan, filter.assigned_to],
        )
    }

    pub fn create_task(&self, plan_id: i64, input: &TaskInput) -> Result<Task> {
        input.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_exists(&tx, "plans", "plan", plan_id)?;
        check_milestone(&tx, plan_id, input.milestone_id)?;

        let ts = now();
        tx.execute(
            "INSERT INTO tasks (plan_id, milestone_id, name, description, status, priority,
                 assigned_to, estimated_hours, actual_hours, start_date, due_date,
                 completion_date, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
            params![
                plan_id,
                input.milestone_id,
                input.name.trim(),
                input.description,
                input.status,
                input.priority,
                input.assigned_to,
                input.estimated_hours,
                input.actual_hours,
                input.start_date,
                input.due_date,
                input.completion_date,
                input.notes,
                ts
            ],
        )?;
        let id = tx.last_insert_rowid();
        write_task_links(&tx, id, input)?;
        let task = load_task(&tx, id)?;
        tx.commit()?;
        info!(task_id = id, plan_id, "Created task");
        Ok(task)
    }

    pub fn get_task(&self, id: i64) -> Result<Task> {
        let conn = self.conn()?;
        load_task(&conn, id)
    }

    /// Replace a task. A `plan_id` of 0 keeps the task in its current plan.
    pub fn update_task(&self, id: i64, input: &TaskInput) -> Result<Task> {
        input.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let current = load_task(&tx, id)?;
        let plan_id = if input.plan_id > 0 {
            ensure_exists(&tx, "plans", "plan", input.plan_id)?;
            input.plan_id
        } else {
            current.plan_id
        };
        check_milestone(&tx, plan_id, input.milestone_id)?;

        tx.execute(
            "UPDATE tasks SET plan_id = ?1, milestone_id = ?2, name = ?3, description = ?4,
                 status = ?5, priority = ?6, assigned_to = ?7, estimated_hours = ?8,
                 actual_hours = ?9, start_date = ?10, due_date = ?11, completion_date = ?12,
                 notes = ?13, updated_at = ?14
             WHERE id = ?15",
            params![
                plan_id,
                input.milestone_id,
                input.name.trim(),
                input.description,
                input.status,
                input.priority,
                input.assigned_to,
                input.estimated_hours,
                input.actual_hours,
                input.start_date,
                input.due_date,
                input.completion_date,
                input.notes,
                now(),
                id
            ],
        )?;
        write_task_links(&tx, id, input)?;
        let task = load_task(&tx, id)?;
        tx.commit()?;
        info!(task_id = id, "Updated task");
        Ok(task)
    }

    pub fn delete_task(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        delete_row(&conn, "tasks", "task", id)?;
        info!(task_id = id, "Deleted task");
        Ok(())
    }

    // ---- resource allocations ----

    pub fn create_resource(&self, input: &ResourceInput) -> Result<ResourceAllocation> {
        input.validate()?;
        let conn = self.conn()?;
        check_resource_parents(&conn, input)?;
        let ts = now();
        conn.execute(
            "INSERT INTO resource_allocations (initiative_id, plan_id, person, role,
                 allocation_percentage, start_date, end_date, cost_center, estimated_cost,
                 actual_cost, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                input.initiative_id,
                input.plan_id,
                input.person.trim(),
                input.role.trim(),
                input.allocation_percentage,
                input.start_date,
                input.end_date,
                input.cost_center,
                input.estimated_cost,
                input.actual_cost,
                input.notes,
                ts
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!(resource_id = id, person = %input.person, "Created resource allocation");
        load_resource(&conn, id)
    }

    pub fn get_resource(&self, id: i64) -> Result<ResourceAllocation> {
        let conn = self.conn()?;
        load_resource(&conn, id)
    }

    pub fn update_resource(&self, id: i64, input: &ResourceInput) -> Result<ResourceAllocation> {
        input.validate()?;
        let conn = self.conn()?;
        check_resource_parents(&conn, input)?;
        let changed = conn.execute(
            "UPDATE resource_allocations SET initiative_id = ?1, plan_id = ?2, person = ?3,
                 role = ?4, allocation_percentage = ?5, start_date = ?6, end_date = ?7,
                 cost_center = ?8, estimated_cost = ?9, actual_cost = ?10, notes = ?11,
                 updated_at = ?12
             WHERE id = ?13",
            params![
                input.initiative_id,
                input.plan_id,
                input.person.trim(),
                input.role.trim(),
                input.allocation_percentage,
                input.start_date,
                input.end_date,
                input.cost_center,
                input.estimated_cost,
                input.actual_cost,
                input.notes,
                now(),
                id
            ],
        )?;
        if changed == 0 {
            return Err(TrackerError::not_found("resource allocation", id));
        }
        info!(resource_id = id, "Updated resource allocation");
        load_resource(&conn, id)
    }

    pub fn delete_resource(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        delete_row(&conn, "resource_allocations", "resource allocation", id)?;
        info!(resource_id = id, "Deleted resource allocation");
        Ok(())
    }

    // ---- risks ----

    pub fn create_risk(&self, initiative_id: i64, input: &RiskInput) -> Result<Risk> {
        input.validate()?;
        let conn = self.conn()?;
        ensure_exists(&conn, "initiatives", "initiative", initiative_id)?;
        let ts = now();
        conn.execute(
            "INSERT INTO risks (initiative_id, description, likelihood, impact,
                 mitigation_strategy, owner, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                initiative_id,
                input.description.trim(),
                input.likelihood,
                input.impact,
                input.mitigation_strategy,
                input.owner,
                input.status,
                ts
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!(risk_id = id, initiative_id, "Created risk");
        load_risk(&conn, id)
    }

    pub fn get_risk(&self, id: i64) -> Result<Risk> {
        let conn = self.conn()?;
        load_risk(&conn, id)
    }

    pub fn update_risk(&self, id: i64, input: &RiskInput) -> Result<Risk> {
        input.validate()?;
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE risks SET description = ?1, likelihood = ?2, impact = ?3,
                 mitigation_strategy = ?4, owner = ?5, status = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                input.description.trim(),
                input.likelihood,
                input.impact,
                input.mitigation_strategy,
                input.owner,
                input.status,
                now(),
                id
            ],
        )?;
        if changed == 0 {
            return Err(TrackerError::not_found("risk", id));
        }
        info!(risk_id = id, "Updated risk");
        load_risk(&conn, id)
    }

    pub fn delete_risk(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        delete_row(&conn, "risks", "risk", id)?;
        info!(risk_id = id, "Deleted risk");
        Ok(())
    }

    // ---- documents ----

    pub fn create_document(&self, input: &DocumentInput) -> Result<PlanningDocument> {
        input.validate()?;
        let conn = self.conn()?;
        if let Some(id) = input.initiative_id {
            ensure_exists(&conn, "initiatives", "initiative", id)?;
        }
        if let Some(id) = input.plan_id {
            ensure_exists(&conn, "plans", "plan", id)?;
        }
        if let Some(id) = input.task_id {
            ensure_exists(&conn, "tasks", "task", id)?;
        }
        let ts = now();
        conn.execute(
            "INSERT INTO planning_documents (initiative_id, plan_id, task_id, name, location,
                 document_type, version, status, description, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                input.initiative_id,
                input.plan_id,
                input.task_id,
                input.name.trim(),
                input.location,
                input.document_type,
                input.version.trim(),
                input.status,
                input.description,
                input.created_by,
                ts
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!(document_id = id, name = %input.name, "Created planning document");
        load_document(&conn, id)
    }

    pub fn get_document(&self, id: i64) -> Result<PlanningDocument> {
        let conn = self.conn()?;
        load_document(&conn, id)
    }

    pub fn delete_document(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        delete_row(&conn, "planning_documents", "planning document", id)?;
        info!(document_id = id, "Deleted planning document");
        Ok(())
    }

    // ---- reports ----

    pub fn initiative_status_report(&self) -> Result<InitiativeStatusReport> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT i.id, i.name, i.status, COUNT(t.id),
                    COALESCE(SUM(CASE WHEN t.status = ?1 THEN 1 ELSE 0 END), 0)
             FROM initiatives i
             LEFT JOIN plans p ON p.initiative_id = i.id
             LEFT JOIN tasks t ON t.plan_id = p.id
             GROUP BY i.id
             ORDER BY i.name, i.id",
        )?;
        let initiatives = stmt
            .query_map(params![TaskStatus::Completed], |row| {
                let total_tasks: i64 = row.get(3)?;
                let completed_tasks: i64 = row.get(4)?;
                Ok(InitiativeProgress {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    status: row.get(2)?,
                    total_tasks,
                    completed_tasks,
                    completion_percentage: completion_percentage(completed_tasks, total_tasks),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(InitiativeStatusReport {
            status_counts: count_by::<InitiativeStatus>(&conn, "initiatives", "status")?,
            initiatives,
        })
    }

    /// Per-person load from allocations active on `as_of`
    pub fn resource_utilization_report(&self, as_of: NaiveDate) -> Result<ResourceUtilizationReport> {
        let conn = self.conn()?;
        let allocations = query_rows(
            &conn,
            &format!("SELECT {RESOURCE_COLUMNS} FROM resource_allocations"),
            [],
            resource_from_row,
        )?;

        let mut people: BTreeMap<String, PersonUtilization> = BTreeMap::new();
        for allocation in allocations.iter().filter(|a| a.is_active_on(as_of)) {
            let entry = people
                .entry(allocation.person.clone())
                .or_insert_with(|| PersonUtilization {
                    person: allocation.person.clone(),
                    total_allocation: 0.0,
                    allocation_count: 0,
                    estimated_cost: 0.0,
                    actual_cost: 0.0,
                    over_allocated: false,
                });
            entry.total_allocation += allocation.allocation_percentage;
            entry.allocation_count += 1;
            entry.estimated_cost += allocation.estimated_cost.unwrap_or(0.0);
            entry.actual_cost += allocation.actual_cost.unwrap_or(0.0);
        }

        let people: Vec<PersonUtilization> = people
            .into_values()
            .map(|mut p| {
                p.over_allocated = p.total_allocation > 100.0;
                p
            })
            .collect();
        debug!(%as_of, people = people.len(), "Computed resource utilization");
        Ok(ResourceUtilizationReport { as_of, people })
    }

    pub fn timeline_adherence_report(&self, as_of: NaiveDate) -> Result<TimelineAdherenceReport> {
        let conn = self.conn()?;
        let tasks = tasks_where(
            &conn,
            &format!("WHERE due_date IS NOT NULL {TASK_ORDER}"),
            [],
        )?;

        let mut report = TimelineAdherenceReport {
            as_of,
            on_time: 0,
            late: 0,
            overdue: 0,
            upcoming: 0,
            overdue_tasks: Vec::new(),
            missed_milestones: Vec::new(),
        };
        for task in tasks {
            match task.timeline_bucket(as_of) {
                Some(TimelineBucket::OnTime) => report.on_time += 1,
                Some(TimelineBucket::Late) => report.late += 1,
                Some(TimelineBucket::Overdue) => {
                    report.overdue += 1;
                    report.overdue_tasks.push(task);
                }
                Some(TimelineBucket::Upcoming) => report.upcoming += 1,
                None => {}
            }
        }

        report.missed_milestones = milestones_where(
            &conn,
            "WHERE due_date < ?1 AND status NOT IN (?2, ?3) ORDER BY due_date, id",
            params![as_of, MilestoneStatus::Completed, MilestoneStatus::Canceled],
        )?;
        Ok(report)
    }
}
