//! SQLite-backed persistence for every tracked record.
//!
//! One connection sits behind a mutex; `Store` is cheap to clone and is
//! shared by the HTTP handlers and the CLI. Multi-row mutations run inside
//! a transaction.

mod boards;
mod dashboard;
mod planning;
mod scripts;
mod systems;
mod workflows;

use crate::error::{Result, TrackerError};
use crate::models::{Choice, ChoiceCount, MoveDirection, NamedRef};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) use systems::insert_system;

pub use dashboard::{
    DashboardStats, DependencyKind, HostScriptData, HostedScript, RecentRecord, RecordCounts,
    ScriptGraphLink, ScriptGraphNode, ScriptHost, SystemScriptGraph, TimelineData,
    TimelineDependency, TimelineInitiative, TimelineMilestone, TimelinePlan,
};

/// Handle to the tracker database
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at `db_path` and ensure the schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        Self::with_connection(conn)
    }

    /// Private in-memory database, used by tests and benchmarks
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| TrackerError::LockPoisoned)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS systems (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL,
                vendor TEXT NOT NULL DEFAULT '',
                operating_system TEXT NOT NULL DEFAULT '',
                support_information TEXT NOT NULL DEFAULT '',
                contact_information TEXT NOT NULL DEFAULT '',
                cost REAL CHECK (cost IS NULL OR cost >= 0),
                cost_structure TEXT NOT NULL DEFAULT '',
                sso_methodology TEXT NOT NULL DEFAULT '',
                sso_system TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'active',
                documentation_url TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS system_relationships (
                id INTEGER PRIMARY KEY,
                source_system_id INTEGER NOT NULL REFERENCES systems(id) ON DELETE CASCADE,
                target_system_id INTEGER NOT NULL REFERENCES systems(id) ON DELETE CASCADE,
                relationship_type TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                UNIQUE (source_system_id, target_system_id, relationship_type),
                CHECK (source_system_id <> target_system_id)
            );

            CREATE TABLE IF NOT EXISTS system_notes (
                id INTEGER PRIMARY KEY,
                system_id INTEGER NOT NULL REFERENCES systems(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                created_by TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS recovery_steps (
                id INTEGER PRIMARY KEY,
                system_id INTEGER NOT NULL REFERENCES systems(id) ON DELETE CASCADE,
                step_order INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                responsible_party TEXT NOT NULL DEFAULT '',
                estimated_minutes INTEGER,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                UNIQUE (system_id, step_order)
            );

            CREATE TABLE IF NOT EXISTS scripts (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                author TEXT NOT NULL DEFAULT '',
                hosted_on INTEGER REFERENCES systems(id) ON DELETE SET NULL,
                host_location TEXT NOT NULL DEFAULT '',
                path TEXT NOT NULL DEFAULT '',
                programming_language TEXT NOT NULL DEFAULT '',
                schedule_information TEXT NOT NULL DEFAULT '',
                schedule_method TEXT,
                custom_schedule_method TEXT NOT NULL DEFAULT '',
                documentation TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS script_systems (
                script_id INTEGER NOT NULL REFERENCES scripts(id) ON DELETE CASCADE,
                system_id INTEGER NOT NULL REFERENCES systems(id) ON DELETE CASCADE,
                relationship_type TEXT NOT NULL DEFAULT 'utility',
                description TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (script_id, system_id)
            );

            CREATE TABLE IF NOT EXISTS workflows (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'draft',
                version INTEGER NOT NULL DEFAULT 1,
                graph TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS workflow_systems (
                workflow_id INTEGER NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
                system_id INTEGER NOT NULL REFERENCES systems(id) ON DELETE CASCADE,
                PRIMARY KEY (workflow_id, system_id)
            );

            CREATE TABLE IF NOT EXISTS workflow_scripts (
                workflow_id INTEGER NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
                script_id INTEGER NOT NULL REFERENCES scripts(id) ON DELETE CASCADE,
                PRIMARY KEY (workflow_id, script_id)
            );

            CREATE TABLE IF NOT EXISTS workflow_versions (
                id INTEGER PRIMARY KEY,
                workflow_id INTEGER NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
                version INTEGER NOT NULL,
                graph TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                created_by TEXT,
                UNIQUE (workflow_id, version)
            );

            CREATE TABLE IF NOT EXISTS workflow_steps (
                id INTEGER PRIMARY KEY,
                workflow_id INTEGER NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
                step_order INTEGER NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                system_id INTEGER REFERENCES systems(id) ON DELETE SET NULL,
                inputs TEXT NOT NULL DEFAULT '',
                outputs TEXT NOT NULL DEFAULT '',
                personnel TEXT NOT NULL DEFAULT '',
                estimated_time TEXT NOT NULL DEFAULT '',
                notes TEXT NOT NULL DEFAULT '',
                UNIQUE (workflow_id, step_order)
            );

            CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                card_type TEXT NOT NULL DEFAULT 'issue',
                status TEXT NOT NULL DEFAULT 'backlog',
                position_x REAL NOT NULL DEFAULT 0,
                position_y REAL NOT NULL DEFAULT 0,
                assigned_to TEXT,
                checked_out INTEGER NOT NULL DEFAULT 0,
                primary_system_id INTEGER REFERENCES systems(id) ON DELETE SET NULL,
                primary_workflow_id INTEGER REFERENCES workflows(id) ON DELETE SET NULL,
                primary_script_id INTEGER REFERENCES scripts(id) ON DELETE SET NULL,
                created_by TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS card_systems (
                card_id INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
                system_id INTEGER NOT NULL REFERENCES systems(id) ON DELETE CASCADE,
                PRIMARY KEY (card_id, system_id)
            );

            CREATE TABLE IF NOT EXISTS card_workflows (
                card_id INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
                workflow_id INTEGER NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
                PRIMARY KEY (card_id, workflow_id)
            );

            CREATE TABLE IF NOT EXISTS card_scripts (
                card_id INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
                script_id INTEGER NOT NULL REFERENCES scripts(id) ON DELETE CASCADE,
                PRIMARY KEY (card_id, script_id)
            );

            CREATE TABLE IF NOT EXISTS card_comments (
                id INTEGER PRIMARY KEY,
                card_id INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
                author TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS boards (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                created_by TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS board_systems (
                board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                system_id INTEGER NOT NULL REFERENCES systems(id) ON DELETE CASCADE,
                PRIMARY KEY (board_id, system_id)
            );

            CREATE TABLE IF NOT EXISTS board_workflows (
                board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                workflow_id INTEGER NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
                PRIMARY KEY (board_id, workflow_id)
            );

            CREATE TABLE IF NOT EXISTS board_scripts (
                board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                script_id INTEGER NOT NULL REFERENCES scripts(id) ON DELETE CASCADE,
                PRIMARY KEY (board_id, script_id)
            );

            CREATE TABLE IF NOT EXISTS initiatives (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'proposed',
                priority TEXT NOT NULL DEFAULT 'medium',
                start_date TEXT,
                target_completion_date TEXT,
                actual_completion_date TEXT,
                budget_allocation REAL CHECK (budget_allocation IS NULL OR budget_allocation >= 0),
                resource_requirements TEXT NOT NULL DEFAULT '',
                business_justification TEXT NOT NULL DEFAULT '',
                success_criteria TEXT NOT NULL DEFAULT '',
                owner TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS initiative_dependencies (
                initiative_id INTEGER NOT NULL REFERENCES initiatives(id) ON DELETE CASCADE,
                depends_on_id INTEGER NOT NULL REFERENCES initiatives(id) ON DELETE CASCADE,
                PRIMARY KEY (initiative_id, depends_on_id),
                CHECK (initiative_id <> depends_on_id)
            );

            CREATE TABLE IF NOT EXISTS plans (
                id INTEGER PRIMARY KEY,
                initiative_id INTEGER NOT NULL REFERENCES initiatives(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'draft',
                created_by TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS milestones (
                id INTEGER PRIMARY KEY,
                plan_id INTEGER NOT NULL REFERENCES plans(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                due_date TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS milestone_dependencies (
                milestone_id INTEGER NOT NULL REFERENCES milestones(id) ON DELETE CASCADE,
                depends_on_id INTEGER NOT NULL REFERENCES milestones(id) ON DELETE CASCADE,
                PRIMARY KEY (milestone_id, depends_on_id),
                CHECK (milestone_id <> depends_on_id)
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY,
                plan_id INTEGER NOT NULL REFERENCES plans(id) ON DELETE CASCADE,
                milestone_id INTEGER REFERENCES milestones(id) ON DELETE SET NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'not_started',
                priority TEXT NOT NULL DEFAULT 'medium',
                assigned_to TEXT,
                estimated_hours REAL,
                actual_hours REAL,
                start_date TEXT,
                due_date TEXT,
                completion_date TEXT,
                notes TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS task_systems (
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                system_id INTEGER NOT NULL REFERENCES systems(id) ON DELETE CASCADE,
                PRIMARY KEY (task_id, system_id)
            );

            CREATE TABLE IF NOT EXISTS task_scripts (
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                script_id INTEGER NOT NULL REFERENCES scripts(id) ON DELETE CASCADE,
                PRIMARY KEY (task_id, script_id)
            );

            CREATE TABLE IF NOT EXISTS task_workflows (
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                workflow_id INTEGER NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
                PRIMARY KEY (task_id, workflow_id)
            );

            CREATE TABLE IF NOT EXISTS resource_allocations (
                id INTEGER PRIMARY KEY,
                initiative_id INTEGER REFERENCES initiatives(id) ON DELETE CASCADE,
                plan_id INTEGER REFERENCES plans(id) ON DELETE CASCADE,
                person TEXT NOT NULL,
                role TEXT NOT NULL,
                allocation_percentage REAL NOT NULL
                    CHECK (allocation_percentage >= 0 AND allocation_percentage <= 100),
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                cost_center TEXT NOT NULL DEFAULT '',
                estimated_cost REAL,
                actual_cost REAL,
                notes TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                CHECK (initiative_id IS NOT NULL OR plan_id IS NOT NULL),
                CHECK (end_date >= start_date)
            );

            CREATE TABLE IF NOT EXISTS risks (
                id INTEGER PRIMARY KEY,
                initiative_id INTEGER NOT NULL REFERENCES initiatives(id) ON DELETE CASCADE,
                description TEXT NOT NULL,
                likelihood TEXT NOT NULL,
                impact TEXT NOT NULL,
                mitigation_strategy TEXT NOT NULL DEFAULT '',
                owner TEXT,
                status TEXT NOT NULL DEFAULT 'identified',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );

            CREATE TABLE IF NOT EXISTS planning_documents (
                id INTEGER PRIMARY KEY,
                initiative_id INTEGER REFERENCES initiatives(id) ON DELETE CASCADE,
                plan_id INTEGER REFERENCES plans(id) ON DELETE CASCADE,
                task_id INTEGER REFERENCES tasks(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                document_type TEXT NOT NULL,
                version TEXT NOT NULL DEFAULT '1.0',
                status TEXT NOT NULL DEFAULT 'draft',
                description TEXT NOT NULL DEFAULT '',
                created_by TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                CHECK (initiative_id IS NOT NULL OR plan_id IS NOT NULL OR task_id IS NOT NULL)
            );

            CREATE INDEX IF NOT EXISTS idx_systems_name ON systems(name);
            CREATE INDEX IF NOT EXISTS idx_relationships_target ON system_relationships(target_system_id);
            CREATE INDEX IF NOT EXISTS idx_scripts_hosted_on ON scripts(hosted_on);
            CREATE INDEX IF NOT EXISTS idx_cards_updated ON cards(updated_at DESC);
            CREATE INDEX IF NOT EXISTS idx_tasks_plan ON tasks(plan_id);
            CREATE INDEX IF NOT EXISTS idx_milestones_plan_due ON milestones(plan_id, due_date);
            ",
        )?;

        Ok(())
    }
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Fail with NotFound unless `table` has a row with `id`.
pub(crate) fn ensure_exists(
    conn: &Connection,
    table: &str,
    entity: &'static str,
    id: i64,
) -> Result<()> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT id FROM {table} WHERE id = ?1"),
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    found
        .map(|_| ())
        .ok_or_else(|| TrackerError::not_found(entity, id))
}

/// Map "no rows" from a single-row lookup to NotFound.
pub(crate) fn or_not_found<T>(
    result: rusqlite::Result<T>,
    entity: &'static str,
    id: i64,
) -> Result<T> {
    result
        .optional()?
        .ok_or_else(|| TrackerError::not_found(entity, id))
}

/// Replace the rows of a two-column link table owned by `owner_id`.
pub(crate) fn replace_links(
    conn: &Connection,
    table: &str,
    owner_col: &str,
    other_col: &str,
    owner_id: i64,
    ids: &[i64],
) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM {table} WHERE {owner_col} = ?1"),
        params![owner_id],
    )?;
    let mut stmt = conn.prepare(&format!(
        "INSERT OR IGNORE INTO {table} ({owner_col}, {other_col}) VALUES (?1, ?2)"
    ))?;
    for id in ids {
        stmt.execute(params![owner_id, id])?;
    }
    Ok(())
}

pub(crate) fn load_links(
    conn: &Connection,
    table: &str,
    owner_col: &str,
    other_col: &str,
    owner_id: i64,
) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {other_col} FROM {table} WHERE {owner_col} = ?1 ORDER BY {other_col}"
    ))?;
    let ids = stmt
        .query_map(params![owner_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// `{id, name}` pairs for `ids`, ordered by name
pub(crate) fn named_refs(conn: &Connection, table: &str, ids: &[i64]) -> Result<Vec<NamedRef>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name FROM {table} WHERE id IN ({placeholders}) ORDER BY name"
    ))?;
    let refs = stmt
        .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok(NamedRef {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(refs)
}

/// Every `{id, name}` in `table`, ordered by name
pub(crate) fn all_named(conn: &Connection, table: &str) -> Result<Vec<NamedRef>> {
    let mut stmt = conn.prepare(&format!("SELECT id, name FROM {table} ORDER BY name"))?;
    let refs = stmt
        .query_map([], |row| {
            Ok(NamedRef {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(refs)
}

/// Count rows of `table` per value of `column`, listing every choice.
pub(crate) fn count_by<C: Choice>(
    conn: &Connection,
    table: &str,
    column: &str,
) -> Result<Vec<ChoiceCount>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, COUNT(*) FROM {table} GROUP BY {column}"
    ))?;
    let counts: HashMap<String, i64> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<_, _>>()?;

    Ok(C::all()
        .iter()
        .map(|choice| ChoiceCount {
            value: choice.value().to_string(),
            label: choice.display_label().to_string(),
            count: counts.get(choice.value()).copied().unwrap_or(0),
        })
        .collect())
}

/// Ordered children of one parent (`step_order` 1..=n, unique per parent).
pub(crate) struct OrderedTable {
    pub table: &'static str,
    pub parent_col: &'static str,
    pub entity: &'static str,
}

impl OrderedTable {
    pub fn next_order(&self, conn: &Connection, parent_id: i64) -> Result<i64> {
        let max: i64 = conn.query_row(
            &format!(
                "SELECT COALESCE(MAX(step_order), 0) FROM {} WHERE {} = ?1",
                self.table, self.parent_col
            ),
            params![parent_id],
            |row| row.get(0),
        )?;
        Ok(max + 1)
    }

    /// Swap a row with its neighbour. Returns false when already at that end.
    pub fn swap(
        &self,
        conn: &Connection,
        parent_id: i64,
        id: i64,
        direction: MoveDirection,
    ) -> Result<bool> {
        let current: i64 = or_not_found(
            conn.query_row(
                &format!(
                    "SELECT step_order FROM {} WHERE id = ?1 AND {} = ?2",
                    self.table, self.parent_col
                ),
                params![id, parent_id],
                |row| row.get(0),
            ),
            self.entity,
            id,
        )?;
        let wanted = match direction {
            MoveDirection::Up => current - 1,
            MoveDirection::Down => current + 1,
        };
        let neighbour: Option<i64> = conn
            .query_row(
                &format!(
                    "SELECT id FROM {} WHERE {} = ?1 AND step_order = ?2",
                    self.table, self.parent_col
                ),
                params![parent_id, wanted],
                |row| row.get(0),
            )
            .optional()?;
        let Some(neighbour) = neighbour else {
            return Ok(false);
        };

        // Park the row on an order no real row uses so the unique index
        // holds after every statement.
        let set_order = format!("UPDATE {} SET step_order = ?1 WHERE id = ?2", self.table);
        conn.execute(&set_order, params![-1, id])?;
        conn.execute(&set_order, params![current, neighbour])?;
        conn.execute(&set_order, params![wanted, id])?;
        Ok(true)
    }

    /// Shift rows after a deleted position up by one, lowest first.
    pub fn close_gap(&self, conn: &Connection, parent_id: i64, removed: i64) -> Result<()> {
        let mut stmt = conn.prepare(&format!(
            "SELECT id, step_order FROM {} WHERE {} = ?1 AND step_order > ?2 ORDER BY step_order",
            self.table, self.parent_col
        ))?;
        let later: Vec<(i64, i64)> = stmt
            .query_map(params![parent_id, removed], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;

        let set_order = format!("UPDATE {} SET step_order = ?1 WHERE id = ?2", self.table);
        for (id, order) in later {
            conn.execute(&set_order, params![order - 1, id])?;
        }
        Ok(())
    }
}

pub(crate) const RECOVERY_STEPS: OrderedTable = OrderedTable {
    table: "recovery_steps",
    parent_col: "system_id",
    entity: "recovery step",
};

pub(crate) const WORKFLOW_STEPS: OrderedTable = OrderedTable {
    table: "workflow_steps",
    parent_col: "workflow_id",
    entity: "workflow step",
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SystemCategory, SystemInput, SystemStatus};

    #[test]
    fn test_create_store() {
        let store = Store::in_memory().unwrap();
        assert!(store.conn().is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("itrack.db");
        let store = Store::new(&path).unwrap();
        store
            .create_system(&SystemInput::new("Banner", SystemCategory::Core))
            .unwrap();
        drop(store);

        let reopened = Store::new(&path).unwrap();
        assert_eq!(reopened.list_systems(&Default::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_count_by_lists_every_choice() {
        let store = Store::in_memory().unwrap();
        store
            .create_system(&SystemInput::new("Banner", SystemCategory::Core))
            .unwrap();
        let conn = store.conn().unwrap();
        let counts = count_by::<SystemStatus>(&conn, "systems", "status").unwrap();
        assert_eq!(counts.len(), SystemStatus::ALL.len());
        assert_eq!(counts[0].value, "active");
        assert_eq!(counts[0].count, 1);
        assert!(counts[1..].iter().all(|c| c.count == 0));
    }

    #[test]
    fn test_replace_links_dedupes() {
        let store = Store::in_memory().unwrap();
        let a = store
            .create_system(&SystemInput::new("A", SystemCategory::Core))
            .unwrap();
        let board = store
            .create_board(&crate::models::BoardInput::new("Ops"))
            .unwrap();
        let conn = store.conn().unwrap();
        replace_links(&conn, "board_systems", "board_id", "system_id", board.id, &[a.id, a.id])
            .unwrap();
        let ids = load_links(&conn, "board_systems", "board_id", "system_id", board.id).unwrap();
        assert_eq!(ids, vec![a.id]);
    }
}
