//! Workflows, their designer graph history and ordered steps

use super::{
    all_named, ensure_exists, load_links, named_refs, now, or_not_found, replace_links, Store,
    WORKFLOW_STEPS,
};
use crate::designer::{SaveOutcome, WorkflowGraph};
use crate::error::{Result, TrackerError};
use crate::models::{
    DesignerData, MoveDirection, VersionSelector, VersionView, Workflow, WorkflowDetail,
    WorkflowFilter, WorkflowInput, WorkflowStep, WorkflowStepInput, WorkflowVersion,
};
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use tracing::{debug, info};

const WORKFLOW_COLUMNS: &str = "id, name, description, status, version, graph, created_at, updated_at";

fn workflow_from_row(row: &Row<'_>) -> rusqlite::Result<Workflow> {
    Ok(Workflow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        version: row.get(4)?,
        graph: row.get(5)?,
        systems: Vec::new(),
        scripts: Vec::new(),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const STEP_COLUMNS: &str = "id, workflow_id, step_order, name, description, system_id, inputs, \
     outputs, personnel, estimated_time, notes";

fn step_from_row(row: &Row<'_>) -> rusqlite::Result<WorkflowStep> {
    Ok(WorkflowStep {
        id: row.get(0)?,
        workflow_id: row.get(1)?,
        step_order: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        system_id: row.get(5)?,
        inputs: row.get(6)?,
        outputs: row.get(7)?,
        personnel: row.get(8)?,
        estimated_time: row.get(9)?,
        notes: row.get(10)?,
    })
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<WorkflowVersion> {
    Ok(WorkflowVersion {
        id: row.get(0)?,
        workflow_id: row.get(1)?,
        version: row.get(2)?,
        graph: row.get(3)?,
        created_at: row.get(4)?,
        created_by: row.get(5)?,
    })
}

fn with_links(conn: &Connection, mut workflow: Workflow) -> Result<Workflow> {
    workflow.systems = load_links(conn, "workflow_systems", "workflow_id", "system_id", workflow.id)?;
    workflow.scripts = load_links(conn, "workflow_scripts", "workflow_id", "script_id", workflow.id)?;
    Ok(workflow)
}

fn load_workflow(conn: &Connection, id: i64) -> Result<Workflow> {
    let workflow = or_not_found(
        conn.query_row(
            &format!("SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = ?1"),
            params![id],
            workflow_from_row,
        ),
        "workflow",
        id,
    )?;
    with_links(conn, workflow)
}

fn write_links(conn: &Connection, id: i64, input: &WorkflowInput) -> Result<()> {
    for system_id in &input.systems {
        ensure_exists(conn, "systems", "system", *system_id)?;
    }
    for script_id in &input.scripts {
        ensure_exists(conn, "scripts", "script", *script_id)?;
    }
    replace_links(conn, "workflow_systems", "workflow_id", "system_id", id, &input.systems)?;
    replace_links(conn, "workflow_scripts", "workflow_id", "script_id", id, &input.scripts)
}

fn steps_for(conn: &Connection, workflow_id: i64) -> Result<Vec<WorkflowStep>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STEP_COLUMNS} FROM workflow_steps WHERE workflow_id = ?1 ORDER BY step_order"
    ))?;
    let steps = stmt
        .query_map(params![workflow_id], step_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(steps)
}

fn load_step(conn: &Connection, workflow_id: i64, step_id: i64) -> Result<WorkflowStep> {
    or_not_found(
        conn.query_row(
            &format!("SELECT {STEP_COLUMNS} FROM workflow_steps WHERE id = ?1 AND workflow_id = ?2"),
            params![step_id, workflow_id],
            step_from_row,
        ),
        "workflow step",
        step_id,
    )
}

/// Snapshot the stored graph, then replace it with `next`. Nothing is
/// written when `next` has no differences.
fn apply_graph(
    conn: &Connection,
    workflow_id: i64,
    next: &WorkflowGraph,
    saved_by: Option<&str>,
) -> Result<SaveOutcome> {
    next.validate()?;

    let (current, version): (WorkflowGraph, i64) = or_not_found(
        conn.query_row(
            "SELECT graph, version FROM workflows WHERE id = ?1",
            params![workflow_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        ),
        "workflow",
        workflow_id,
    )?;

    let diff = current.diff(next);
    if diff.is_empty() {
        debug!(workflow_id, version, "Graph unchanged, nothing saved");
        return Ok(SaveOutcome {
            saved: false,
            version,
            diff,
            message: "No changes detected".to_string(),
        });
    }

    let ts = now();
    conn.execute(
        "INSERT INTO workflow_versions (workflow_id, version, graph, created_at, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![workflow_id, version, current, ts, saved_by],
    )?;
    let new_version = version + 1;
    conn.execute(
        "UPDATE workflows SET graph = ?1, version = ?2, updated_at = ?3 WHERE id = ?4",
        params![next, new_version, ts, workflow_id],
    )?;

    debug!(workflow_id, snapshot = version, new_version, "Snapshotted workflow graph");
    Ok(SaveOutcome {
        saved: true,
        version: new_version,
        message: format!("Saved version {new_version} ({})", diff.summary()),
        diff,
    })
}

impl Store {
    pub fn list_workflows(&self, filter: &WorkflowFilter) -> Result<Vec<Workflow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows
             WHERE (?1 IS NULL OR status = ?1) ORDER BY name, id"
        ))?;
        let workflows = stmt
            .query_map(params![filter.status], workflow_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        workflows
            .into_iter()
            .map(|w| with_links(&conn, w))
            .collect()
    }

    /// New workflows start at version 1 with start wired to end.
    pub fn create_workflow(&self, input: &WorkflowInput) -> Result<Workflow> {
        input.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let ts = now();
        tx.execute(
            "INSERT INTO workflows (name, description, status, version, graph, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?5, ?5)",
            params![
                input.name.trim(),
                input.description,
                input.status,
                WorkflowGraph::default_graph(),
                ts
            ],
        )?;
        let id = tx.last_insert_rowid();
        write_links(&tx, id, input)?;
        let workflow = load_workflow(&tx, id)?;
        tx.commit()?;

        info!(workflow_id = id, name = %workflow.name, "Created workflow");
        Ok(workflow)
    }

    pub fn get_workflow(&self, id: i64) -> Result<Workflow> {
        let conn = self.conn()?;
        load_workflow(&conn, id)
    }

    pub fn workflow_detail(&self, id: i64) -> Result<WorkflowDetail> {
        let conn = self.conn()?;
        let workflow = load_workflow(&conn, id)?;
        Ok(WorkflowDetail {
            steps: steps_for(&conn, id)?,
            systems: named_refs(&conn, "systems", &workflow.systems)?,
            scripts: named_refs(&conn, "scripts", &workflow.scripts)?,
            workflow,
        })
    }

    /// Update name, description, status and links; the graph is untouched.
    pub fn update_workflow(&self, id: i64, input: &WorkflowInput) -> Result<Workflow> {
        input.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE workflows SET name = ?1, description = ?2, status = ?3, updated_at = ?4
             WHERE id = ?5",
            params![input.name.trim(), input.description, input.status, now(), id],
        )?;
        if changed == 0 {
            return Err(TrackerError::not_found("workflow", id));
        }
        write_links(&tx, id, input)?;
        let workflow = load_workflow(&tx, id)?;
        tx.commit()?;

        info!(workflow_id = id, "Updated workflow");
        Ok(workflow)
    }

    pub fn delete_workflow(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM workflows WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(TrackerError::not_found("workflow", id));
        }
        info!(workflow_id = id, "Deleted workflow");
        Ok(())
    }

    pub fn designer_data(&self, id: i64) -> Result<DesignerData> {
        let conn = self.conn()?;
        let workflow = load_workflow(&conn, id)?;
        Ok(DesignerData {
            workflow_id: workflow.id,
            name: workflow.name,
            version: workflow.version,
            graph: workflow.graph,
            systems: all_named(&conn, "systems")?,
            scripts: all_named(&conn, "scripts")?,
        })
    }

    /// Save a designer graph, keeping the previous graph as a version.
    pub fn save_graph(
        &self,
        id: i64,
        graph: &WorkflowGraph,
        saved_by: Option<&str>,
    ) -> Result<SaveOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let outcome = apply_graph(&tx, id, graph, saved_by)?;
        tx.commit()?;
        if outcome.saved {
            info!(workflow_id = id, version = outcome.version, "Saved workflow graph");
        }
        Ok(outcome)
    }

    /// Stored snapshots, newest first
    pub fn list_versions(&self, id: i64) -> Result<Vec<WorkflowVersion>> {
        let conn = self.conn()?;
        ensure_exists(&conn, "workflows", "workflow", id)?;
        let mut stmt = conn.prepare(
            "SELECT id, workflow_id, version, graph, created_at, created_by
             FROM workflow_versions WHERE workflow_id = ?1 ORDER BY version DESC",
        )?;
        let versions = stmt
            .query_map(params![id], version_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    pub fn load_version(&self, id: i64, selector: VersionSelector) -> Result<VersionView> {
        let conn = self.conn()?;
        let workflow = load_workflow(&conn, id)?;
        match selector {
            VersionSelector::Number(n) if n != workflow.version => {
                let stored = or_not_found(
                    conn.query_row(
                        "SELECT id, workflow_id, version, graph, created_at, created_by
                         FROM workflow_versions WHERE workflow_id = ?1 AND version = ?2",
                        params![id, n],
                        version_from_row,
                    ),
                    "workflow version",
                    n,
                )?;
                Ok(VersionView {
                    version: stored.version,
                    current: false,
                    graph: stored.graph,
                    created_at: stored.created_at,
                    created_by: stored.created_by,
                })
            }
            _ => Ok(VersionView {
                version: workflow.version,
                current: true,
                graph: workflow.graph,
                created_at: workflow.updated_at,
                created_by: None,
            }),
        }
    }

    /// Make a stored version's graph current again, through the normal save path.
    pub fn restore_version(
        &self,
        id: i64,
        version: i64,
        restored_by: Option<&str>,
    ) -> Result<SaveOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_exists(&tx, "workflows", "workflow", id)?;
        let graph: WorkflowGraph = or_not_found(
            tx.query_row(
                "SELECT graph FROM workflow_versions WHERE workflow_id = ?1 AND version = ?2",
                params![id, version],
                |row| row.get(0),
            ),
            "workflow version",
            version,
        )?;
        let outcome = apply_graph(&tx, id, &graph, restored_by)?;
        tx.commit()?;
        info!(workflow_id = id, restored = version, now_at = outcome.version, "Restored workflow version");
        Ok(outcome)
    }

    /// Regenerate the graph as a straight line through the ordered steps.
    pub fn graph_from_steps(&self, id: i64, saved_by: Option<&str>) -> Result<SaveOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_exists(&tx, "workflows", "workflow", id)?;
        let steps = steps_for(&tx, id)?;

        let system_ids: Vec<i64> = steps.iter().filter_map(|s| s.system_id).collect();
        let system_names: HashMap<i64, String> = named_refs(&tx, "systems", &system_ids)?
            .into_iter()
            .map(|r| (r.id, r.name))
            .collect();

        let graph = WorkflowGraph::from_steps(&steps, &system_names);
        let outcome = apply_graph(&tx, id, &graph, saved_by)?;
        tx.commit()?;
        info!(workflow_id = id, steps = steps.len(), "Generated workflow graph from steps");
        Ok(outcome)
    }

    pub fn list_steps(&self, workflow_id: i64) -> Result<Vec<WorkflowStep>> {
        let conn = self.conn()?;
        ensure_exists(&conn, "workflows", "workflow", workflow_id)?;
        steps_for(&conn, workflow_id)
    }

    pub fn get_step(&self, workflow_id: i64, step_id: i64) -> Result<WorkflowStep> {
        let conn = self.conn()?;
        load_step(&conn, workflow_id, step_id)
    }

    /// Append a step after the current last one.
    pub fn add_step(&self, workflow_id: i64, input: &WorkflowStepInput) -> Result<WorkflowStep> {
        input.validate()?;
        let conn = self.conn()?;
        ensure_exists(&conn, "workflows", "workflow", workflow_id)?;
        if let Some(system_id) = input.system_id {
            ensure_exists(&conn, "systems", "system", system_id)?;
        }
        let order = WORKFLOW_STEPS.next_order(&conn, workflow_id)?;
        conn.execute(
            "INSERT INTO workflow_steps (workflow_id, step_order, name, description, system_id,
                 inputs, outputs, personnel, estimated_time, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                workflow_id,
                order,
                input.name,
                input.description,
                input.system_id,
                input.inputs,
                input.outputs,
                input.personnel,
                input.estimated_time,
                input.notes
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!(workflow_id, step_id = id, order, "Added workflow step");
        load_step(&conn, workflow_id, id)
    }

    pub fn update_step(
        &self,
        workflow_id: i64,
        step_id: i64,
        input: &WorkflowStepInput,
    ) -> Result<WorkflowStep> {
        input.validate()?;
        let conn = self.conn()?;
        if let Some(system_id) = input.system_id {
            ensure_exists(&conn, "systems", "system", system_id)?;
        }
        let changed = conn.execute(
            "UPDATE workflow_steps SET name = ?1, description = ?2, system_id = ?3, inputs = ?4,
                 outputs = ?5, personnel = ?6, estimated_time = ?7, notes = ?8
             WHERE id = ?9 AND workflow_id = ?10",
            params![
                input.name,
                input.description,
                input.system_id,
                input.inputs,
                input.outputs,
                input.personnel,
                input.estimated_time,
                input.notes,
                step_id,
                workflow_id
            ],
        )?;
        if changed == 0 {
            return Err(TrackerError::not_found("workflow step", step_id));
        }
        load_step(&conn, workflow_id, step_id)
    }

    pub fn delete_step(&self, workflow_id: i64, step_id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let step = load_step(&tx, workflow_id, step_id)?;
        tx.execute("DELETE FROM workflow_steps WHERE id = ?1", params![step_id])?;
        WORKFLOW_STEPS.close_gap(&tx, workflow_id, step.step_order)?;
        tx.commit()?;
        info!(workflow_id, step_id, "Deleted workflow step");
        Ok(())
    }

    pub fn move_step(
        &self,
        workflow_id: i64,
        step_id: i64,
        direction: MoveDirection,
    ) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let moved = WORKFLOW_STEPS.swap(&tx, workflow_id, step_id, direction)?;
        tx.commit()?;
        debug!(workflow_id, step_id, ?direction, moved, "Moved workflow step");
        Ok(moved)
    }
}
