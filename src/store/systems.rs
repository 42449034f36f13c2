//! Systems, relationships, notes and recovery steps

use super::{ensure_exists, now, or_not_found, Store, RECOVERY_STEPS};
use crate::error::{Result, TrackerError};
use crate::impact::{DependencyGraph, ImpactReport, SystemNode};
use crate::models::{
    DiagramLink, DiagramSystem, DisasterAnalysis, MoveDirection, NamedRef, NoteInput,
    RecoveryStep, RecoveryStepInput, RelationshipDiagram, RelationshipInput, RelationshipType,
    System, SystemDetail, SystemFilter, SystemInput, SystemNote, SystemPatch, SystemRef,
    SystemRelationship,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

const SYSTEM_COLUMNS: &str = "id, name, description, category, vendor, operating_system, \
     support_information, contact_information, cost, cost_structure, sso_methodology, \
     sso_system, status, documentation_url, created_at, updated_at";

fn system_from_row(row: &Row<'_>) -> rusqlite::Result<System> {
    Ok(System {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        vendor: row.get(4)?,
        operating_system: row.get(5)?,
        support_information: row.get(6)?,
        contact_information: row.get(7)?,
        cost: row.get(8)?,
        cost_structure: row.get(9)?,
        sso_methodology: row.get(10)?,
        sso_system: row.get(11)?,
        status: row.get(12)?,
        documentation_url: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

const RELATIONSHIP_SELECT: &str = "SELECT r.id, r.relationship_type, r.description, \
     s.id, s.name, s.category, t.id, t.name, t.category \
     FROM system_relationships r \
     JOIN systems s ON s.id = r.source_system_id \
     JOIN systems t ON t.id = r.target_system_id";

fn relationship_from_row(row: &Row<'_>) -> rusqlite::Result<SystemRelationship> {
    Ok(SystemRelationship {
        id: row.get(0)?,
        relationship_type: row.get(1)?,
        description: row.get(2)?,
        source_system: SystemRef {
            id: row.get(3)?,
            name: row.get(4)?,
            category: row.get(5)?,
        },
        target_system: SystemRef {
            id: row.get(6)?,
            name: row.get(7)?,
            category: row.get(8)?,
        },
    })
}

const NOTE_COLUMNS: &str = "id, system_id, title, content, created_by, created_at, updated_at";

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<SystemNote> {
    Ok(SystemNote {
        id: row.get(0)?,
        system_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const STEP_COLUMNS: &str = "id, system_id, step_order, title, description, responsible_party, \
     estimated_minutes, created_at, updated_at";

fn step_from_row(row: &Row<'_>) -> rusqlite::Result<RecoveryStep> {
    Ok(RecoveryStep {
        id: row.get(0)?,
        system_id: row.get(1)?,
        step_order: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        responsible_party: row.get(5)?,
        estimated_minutes: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub(crate) fn load_system(conn: &Connection, id: i64) -> Result<System> {
    or_not_found(
        conn.query_row(
            &format!("SELECT {SYSTEM_COLUMNS} FROM systems WHERE id = ?1"),
            params![id],
            system_from_row,
        ),
        "system",
        id,
    )
}

fn load_relationships(conn: &Connection, system_id: i64) -> Result<Vec<SystemRelationship>> {
    let mut stmt = conn.prepare(&format!(
        "{RELATIONSHIP_SELECT} WHERE r.source_system_id = ?1 OR r.target_system_id = ?1 \
         ORDER BY r.id"
    ))?;
    let relationships = stmt
        .query_map(params![system_id], relationship_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(relationships)
}

/// Systems on the other end of `depends_on` edges touching `system_id`.
/// `upstream` selects the sources (what it depends on) instead of the targets.
fn depends_on_neighbours(conn: &Connection, system_id: i64, upstream: bool) -> Result<Vec<SystemRef>> {
    let (join_col, filter_col) = if upstream {
        ("source_system_id", "target_system_id")
    } else {
        ("target_system_id", "source_system_id")
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT s.id, s.name, s.category FROM system_relationships r \
         JOIN systems s ON s.id = r.{join_col} \
         WHERE r.{filter_col} = ?1 AND r.relationship_type = ?2 ORDER BY s.name"
    ))?;
    let refs = stmt
        .query_map(params![system_id, RelationshipType::DependsOn], |row| {
            Ok(SystemRef {
                id: row.get(0)?,
                name: row.get(1)?,
                category: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(refs)
}

fn named_query(conn: &Connection, sql: &str, id: i64) -> Result<Vec<NamedRef>> {
    let mut stmt = conn.prepare(sql)?;
    let refs = stmt
        .query_map(params![id], |row| {
            Ok(NamedRef {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(refs)
}

pub(crate) fn insert_system(conn: &Connection, input: &SystemInput) -> Result<i64> {
    let ts = now();
    conn.execute(
        "INSERT INTO systems (name, description, category, vendor, operating_system,
             support_information, contact_information, cost, cost_structure, sso_methodology,
             sso_system, status, documentation_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
        params![
            input.name.trim(),
            input.description,
            input.category()?,
            input.vendor,
            input.operating_system,
            input.support_information,
            input.contact_information,
            input.cost,
            input.cost_structure,
            input.sso_methodology,
            input.sso_system,
            input.status,
            input.documentation_url,
            ts
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn write_system(conn: &Connection, id: i64, input: &SystemInput) -> Result<()> {
    let changed = conn.execute(
        "UPDATE systems SET name = ?1, description = ?2, category = ?3, vendor = ?4,
             operating_system = ?5, support_information = ?6, contact_information = ?7,
             cost = ?8, cost_structure = ?9, sso_methodology = ?10, sso_system = ?11,
             status = ?12, documentation_url = ?13, updated_at = ?14
         WHERE id = ?15",
        params![
            input.name.trim(),
            input.description,
            input.category()?,
            input.vendor,
            input.operating_system,
            input.support_information,
            input.contact_information,
            input.cost,
            input.cost_structure,
            input.sso_methodology,
            input.sso_system,
            input.status,
            input.documentation_url,
            now(),
            id
        ],
    )?;
    if changed == 0 {
        return Err(TrackerError::not_found("system", id));
    }
    Ok(())
}

impl Store {
    /// Systems ordered by name, optionally filtered by status and category
    pub fn list_systems(&self, filter: &SystemFilter) -> Result<Vec<System>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SYSTEM_COLUMNS} FROM systems
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR category = ?2)
             ORDER BY name, id"
        ))?;
        let systems = stmt
            .query_map(params![filter.status, filter.category], system_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(systems)
    }

    pub fn create_system(&self, input: &SystemInput) -> Result<System> {
        input.validate()?;
        let conn = self.conn()?;
        let id = insert_system(&conn, input)?;
        info!(system_id = id, name = %input.name, "Created system");
        load_system(&conn, id)
    }

    pub fn get_system(&self, id: i64) -> Result<System> {
        let conn = self.conn()?;
        load_system(&conn, id)
    }

    /// First system with exactly this name
    pub fn find_system_by_name(&self, name: &str) -> Result<Option<System>> {
        let conn = self.conn()?;
        let system = conn
            .query_row(
                &format!("SELECT {SYSTEM_COLUMNS} FROM systems WHERE name = ?1 ORDER BY id LIMIT 1"),
                params![name],
                system_from_row,
            )
            .optional()?;
        Ok(system)
    }

    pub fn update_system(&self, id: i64, input: &SystemInput) -> Result<System> {
        input.validate()?;
        let conn = self.conn()?;
        write_system(&conn, id, input)?;
        info!(system_id = id, "Updated system");
        load_system(&conn, id)
    }

    /// Apply only the fields present in `patch`.
    pub fn patch_system(&self, id: i64, patch: &SystemPatch) -> Result<System> {
        let conn = self.conn()?;
        let current = load_system(&conn, id)?;
        let input = patch.apply(&current);
        input.validate()?;
        write_system(&conn, id, &input)?;
        info!(system_id = id, "Quick-updated system");
        load_system(&conn, id)
    }

    pub fn delete_system(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM systems WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(TrackerError::not_found("system", id));
        }
        info!(system_id = id, "Deleted system");
        Ok(())
    }

    pub fn system_detail(&self, id: i64) -> Result<SystemDetail> {
        let conn = self.conn()?;
        let system = load_system(&conn, id)?;

        let workflows = named_query(
            &conn,
            "SELECT w.id, w.name FROM workflows w
             JOIN workflow_systems ws ON ws.workflow_id = w.id
             WHERE ws.system_id = ?1 ORDER BY w.name",
            id,
        )?;
        let related_scripts = named_query(
            &conn,
            "SELECT s.id, s.name FROM scripts s
             JOIN script_systems ss ON ss.script_id = s.id
             WHERE ss.system_id = ?1 ORDER BY s.name",
            id,
        )?;
        let hosted_scripts = named_query(
            &conn,
            "SELECT id, name FROM scripts WHERE hosted_on = ?1 ORDER BY name",
            id,
        )?;

        Ok(SystemDetail {
            dependencies: depends_on_neighbours(&conn, id, true)?,
            dependents: depends_on_neighbours(&conn, id, false)?,
            workflows,
            related_scripts,
            hosted_scripts,
            notes: notes_for(&conn, id)?,
            relationships: load_relationships(&conn, id)?,
            system,
        })
    }

    /// Systems this system depends on
    pub fn dependencies(&self, id: i64) -> Result<Vec<SystemRef>> {
        let conn = self.conn()?;
        ensure_exists(&conn, "systems", "system", id)?;
        depends_on_neighbours(&conn, id, true)
    }

    /// Systems depending on this system
    pub fn dependents(&self, id: i64) -> Result<Vec<SystemRef>> {
        let conn = self.conn()?;
        ensure_exists(&conn, "systems", "system", id)?;
        depends_on_neighbours(&conn, id, false)
    }

    /// Relationships where the system is source or target
    pub fn system_relationships(&self, id: i64) -> Result<Vec<SystemRelationship>> {
        let conn = self.conn()?;
        ensure_exists(&conn, "systems", "system", id)?;
        load_relationships(&conn, id)
    }

    /// Make `entries` the complete set of relationships touching the system.
    pub fn save_relationships(
        &self,
        system_id: i64,
        entries: &[RelationshipInput],
    ) -> Result<Vec<SystemRelationship>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_exists(&tx, "systems", "system", system_id)?;

        let mut keep: Vec<i64> = Vec::with_capacity(entries.len());
        for entry in entries {
            let (Some(source), Some(target), Some(kind)) = (
                entry.source_system_id,
                entry.target_system_id,
                entry.relationship_type,
            ) else {
                debug!(system_id, "Skipping incomplete relationship entry");
                continue;
            };
            if source != system_id && target != system_id {
                return Err(TrackerError::Validation(format!(
                    "relationship {source} -> {target} does not involve system {system_id}"
                )));
            }
            if source == target {
                return Err(TrackerError::Validation(
                    "a system cannot have a relationship with itself".to_string(),
                ));
            }
            ensure_exists(&tx, "systems", "system", source)?;
            ensure_exists(&tx, "systems", "system", target)?;

            // An entry without a usable id reuses an identical edge if one exists.
            let existing = match entry.id {
                Some(id) => tx
                    .query_row(
                        "SELECT id FROM system_relationships
                         WHERE id = ?1 AND (source_system_id = ?2 OR target_system_id = ?2)",
                        params![id, system_id],
                        |row| row.get::<_, i64>(0),
                    )
                    .optional()?,
                None => None,
            };
            let existing = match existing {
                Some(id) => Some(id),
                None => tx
                    .query_row(
                        "SELECT id FROM system_relationships
                         WHERE source_system_id = ?1 AND target_system_id = ?2
                           AND relationship_type = ?3",
                        params![source, target, kind],
                        |row| row.get::<_, i64>(0),
                    )
                    .optional()?,
            };

            let ts = now();
            let id = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE system_relationships
                         SET source_system_id = ?1, target_system_id = ?2,
                             relationship_type = ?3, description = ?4, updated_at = ?5
                         WHERE id = ?6",
                        params![source, target, kind, entry.description, ts, id],
                    )?;
                    id
                }
                None => {
                    tx.execute(
                        "INSERT INTO system_relationships
                             (source_system_id, target_system_id, relationship_type,
                              description, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                        params![source, target, kind, entry.description, ts],
                    )?;
                    tx.last_insert_rowid()
                }
            };
            keep.push(id);
        }

        let current: Vec<i64> = {
            let mut stmt = tx.prepare(
                "SELECT id FROM system_relationships
                 WHERE source_system_id = ?1 OR target_system_id = ?1",
            )?;
            let ids = stmt
                .query_map(params![system_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            ids
        };
        let mut removed = 0;
        for id in current.into_iter().filter(|id| !keep.contains(id)) {
            tx.execute("DELETE FROM system_relationships WHERE id = ?1", params![id])?;
            removed += 1;
        }

        let saved = load_relationships(&tx, system_id)?;
        tx.commit()?;
        info!(
            system_id,
            kept = saved.len(),
            removed,
            "Saved system relationships"
        );
        Ok(saved)
    }

    /// Every system and relationship, for the force-directed diagram
    pub fn relationship_diagram(&self) -> Result<RelationshipDiagram> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, name, category, status FROM systems ORDER BY name, id")?;
        let systems = stmt
            .query_map([], |row| {
                let category = row.get(2)?;
                Ok(DiagramSystem {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    category,
                    status: row.get(3)?,
                    kind: category,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT source_system_id, target_system_id, relationship_type
             FROM system_relationships ORDER BY id",
        )?;
        let links = stmt
            .query_map([], |row| {
                Ok(DiagramLink {
                    source: row.get(0)?,
                    target: row.get(1)?,
                    kind: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(RelationshipDiagram { systems, links })
    }

    /// Graph of every `depends_on` relationship
    pub fn dependency_graph(&self) -> Result<DependencyGraph> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name, category, status FROM systems")?;
        let systems = stmt
            .query_map([], |row| {
                Ok(SystemNode {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    category: row.get(2)?,
                    status: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT source_system_id, target_system_id FROM system_relationships
             WHERE relationship_type = ?1",
        )?;
        let edges = stmt
            .query_map(params![RelationshipType::DependsOn], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<std::result::Result<Vec<(i64, i64)>, _>>()?;

        debug!(systems = systems.len(), edges = edges.len(), "Built dependency graph");
        Ok(DependencyGraph::build(systems, &edges))
    }

    /// Systems affected, directly or transitively, if `id` goes down
    pub fn impact_analysis(&self, id: i64) -> Result<ImpactReport> {
        let report = self.dependency_graph()?.analyze(id)?;
        if report.has_cycles {
            warn!(system_id = id, "Downstream dependencies contain a cycle");
        }
        Ok(report)
    }

    pub fn disaster_analysis(&self, id: i64) -> Result<DisasterAnalysis> {
        let system = self.get_system(id)?;
        let impact = self.impact_analysis(id)?;
        let recovery_steps = self.list_recovery_steps(id)?;
        let total_estimated_minutes = recovery_steps
            .iter()
            .filter_map(|s| s.estimated_minutes)
            .sum();
        Ok(DisasterAnalysis {
            system,
            impact,
            recovery_steps,
            total_estimated_minutes,
        })
    }

    pub fn list_notes(&self, system_id: i64) -> Result<Vec<SystemNote>> {
        let conn = self.conn()?;
        ensure_exists(&conn, "systems", "system", system_id)?;
        notes_for(&conn, system_id)
    }

    pub fn add_note(&self, system_id: i64, input: &NoteInput) -> Result<SystemNote> {
        input.validate()?;
        let conn = self.conn()?;
        ensure_exists(&conn, "systems", "system", system_id)?;
        let ts = now();
        conn.execute(
            "INSERT INTO system_notes (system_id, title, content, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![system_id, input.title, input.content, input.created_by, ts],
        )?;
        let id = conn.last_insert_rowid();
        info!(system_id, note_id = id, "Added system note");
        load_note(&conn, system_id, id)
    }

    /// Edit a note's title and content; the author is kept.
    pub fn update_note(&self, system_id: i64, note_id: i64, input: &NoteInput) -> Result<SystemNote> {
        input.validate()?;
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE system_notes SET title = ?1, content = ?2, updated_at = ?3
             WHERE id = ?4 AND system_id = ?5",
            params![input.title, input.content, now(), note_id, system_id],
        )?;
        if changed == 0 {
            return Err(TrackerError::not_found("note", note_id));
        }
        load_note(&conn, system_id, note_id)
    }

    pub fn delete_note(&self, system_id: i64, note_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM system_notes WHERE id = ?1 AND system_id = ?2",
            params![note_id, system_id],
        )?;
        if deleted == 0 {
            return Err(TrackerError::not_found("note", note_id));
        }
        info!(system_id, note_id, "Deleted system note");
        Ok(())
    }

    pub fn list_recovery_steps(&self, system_id: i64) -> Result<Vec<RecoveryStep>> {
        let conn = self.conn()?;
        ensure_exists(&conn, "systems", "system", system_id)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {STEP_COLUMNS} FROM recovery_steps WHERE system_id = ?1 ORDER BY step_order"
        ))?;
        let steps = stmt
            .query_map(params![system_id], step_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(steps)
    }

    pub fn get_recovery_step(&self, system_id: i64, step_id: i64) -> Result<RecoveryStep> {
        let conn = self.conn()?;
        load_step(&conn, system_id, step_id)
    }

    /// Create a step at the end of the runbook, or update the one named by `id`.
    pub fn save_recovery_step(
        &self,
        system_id: i64,
        input: &RecoveryStepInput,
    ) -> Result<RecoveryStep> {
        input.validate()?;
        let conn = self.conn()?;
        ensure_exists(&conn, "systems", "system", system_id)?;
        let ts = now();

        let id = match input.id {
            Some(step_id) => {
                let changed = conn.execute(
                    "UPDATE recovery_steps SET title = ?1, description = ?2,
                         responsible_party = ?3, estimated_minutes = ?4, updated_at = ?5
                     WHERE id = ?6 AND system_id = ?7",
                    params![
                        input.title,
                        input.description,
                        input.responsible_party,
                        input.estimated_minutes,
                        ts,
                        step_id,
                        system_id
                    ],
                )?;
                if changed == 0 {
                    return Err(TrackerError::not_found("recovery step", step_id));
                }
                step_id
            }
            None => {
                let order = RECOVERY_STEPS.next_order(&conn, system_id)?;
                conn.execute(
                    "INSERT INTO recovery_steps (system_id, step_order, title, description,
                         responsible_party, estimated_minutes, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                    params![
                        system_id,
                        order,
                        input.title,
                        input.description,
                        input.responsible_party,
                        input.estimated_minutes,
                        ts
                    ],
                )?;
                conn.last_insert_rowid()
            }
        };

        info!(system_id, step_id = id, "Saved recovery step");
        load_step(&conn, system_id, id)
    }

    /// Delete a step; the steps after it move up one place.
    pub fn delete_recovery_step(&self, system_id: i64, step_id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let step = load_step(&tx, system_id, step_id)?;
        tx.execute("DELETE FROM recovery_steps WHERE id = ?1", params![step_id])?;
        RECOVERY_STEPS.close_gap(&tx, system_id, step.step_order)?;
        tx.commit()?;
        info!(system_id, step_id, "Deleted recovery step");
        Ok(())
    }

    /// Swap a step with its neighbour. Returns false when it is already at
    /// that end of the list.
    pub fn move_recovery_step(
        &self,
        system_id: i64,
        step_id: i64,
        direction: MoveDirection,
    ) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let moved = RECOVERY_STEPS.swap(&tx, system_id, step_id, direction)?;
        tx.commit()?;
        debug!(system_id, step_id, ?direction, moved, "Moved recovery step");
        Ok(moved)
    }
}

fn notes_for(conn: &Connection, system_id: i64) -> Result<Vec<SystemNote>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTE_COLUMNS} FROM system_notes WHERE system_id = ?1
         ORDER BY created_at DESC, id DESC"
    ))?;
    let notes = stmt
        .query_map(params![system_id], note_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(notes)
}

fn load_note(conn: &Connection, system_id: i64, note_id: i64) -> Result<SystemNote> {
    or_not_found(
        conn.query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM system_notes WHERE id = ?1 AND system_id = ?2"),
            params![note_id, system_id],
            note_from_row,
        ),
        "note",
        note_id,
    )
}

fn load_step(conn: &Connection, system_id: i64, step_id: i64) -> Result<RecoveryStep> {
    or_not_found(
        conn.query_row(
            &format!("SELECT {STEP_COLUMNS} FROM recovery_steps WHERE id = ?1 AND system_id = ?2"),
            params![step_id, system_id],
            step_from_row,
        ),
        "recovery step",
        step_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SystemCategory, SystemStatus};

    fn system(store: &Store, name: &str) -> i64 {
        store
            .create_system(&SystemInput::new(name, SystemCategory::Core))
            .unwrap()
            .id
    }

    fn depends_on(source: i64, target: i64) -> RelationshipInput {
        RelationshipInput {
            id: None,
            source_system_id: Some(source),
            target_system_id: Some(target),
            relationship_type: Some(RelationshipType::DependsOn),
            description: String::new(),
        }
    }

    fn step(title: &str) -> RecoveryStepInput {
        RecoveryStepInput {
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn titles(store: &Store, system_id: i64) -> Vec<(i64, String)> {
        store
            .list_recovery_steps(system_id)
            .unwrap()
            .into_iter()
            .map(|s| (s.step_order, s.title))
            .collect()
    }

    #[test]
    fn test_system_crud() {
        let store = Store::in_memory().unwrap();
        let mut input = SystemInput::new("Banner", SystemCategory::Core);
        input.cost = Some(1200.0);
        let created = store.create_system(&input).unwrap();
        assert_eq!(created.status, SystemStatus::Active);
        assert_eq!(created.cost, Some(1200.0));

        input.vendor = "Ellucian".to_string();
        let updated = store.update_system(created.id, &input).unwrap();
        assert_eq!(updated.vendor, "Ellucian");

        let patched = store
            .patch_system(
                created.id,
                &SystemPatch {
                    status: Some(SystemStatus::Review),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(patched.status, SystemStatus::Review);
        assert_eq!(patched.vendor, "Ellucian");

        store.delete_system(created.id).unwrap();
        assert!(matches!(
            store.get_system(created.id),
            Err(TrackerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_filters() {
        let store = Store::in_memory().unwrap();
        system(&store, "Zeta");
        let mut input = SystemInput::new("Alpha", SystemCategory::External);
        input.status = SystemStatus::Deprecated;
        store.create_system(&input).unwrap();

        let all = store.list_systems(&SystemFilter::default()).unwrap();
        assert_eq!(all[0].name, "Alpha");

        let filtered = store
            .list_systems(&SystemFilter {
                status: Some(SystemStatus::Deprecated),
                category: None,
            })
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "Alpha");

        let none = store
            .list_systems(&SystemFilter {
                status: Some(SystemStatus::Deprecated),
                category: Some(SystemCategory::Core),
            })
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_save_relationships_replaces_set() {
        let store = Store::in_memory().unwrap();
        let a = system(&store, "A");
        let b = system(&store, "B");
        let c = system(&store, "C");

        let saved = store
            .save_relationships(a, &[depends_on(a, b), depends_on(c, a)])
            .unwrap();
        assert_eq!(saved.len(), 2);

        let ab = saved.iter().find(|r| r.target_system.id == b).unwrap().id;
        let mut keep = depends_on(a, b);
        keep.id = Some(ab);
        keep.description = "feeds".to_string();
        let incomplete = RelationshipInput {
            source_system_id: Some(a),
            ..Default::default()
        };
        let saved = store.save_relationships(a, &[keep, incomplete]).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, ab);
        assert_eq!(saved[0].description, "feeds");

        assert_eq!(store.dependents(a).unwrap()[0].id, b);
        assert!(store.dependencies(a).unwrap().is_empty());
        assert_eq!(store.dependencies(b).unwrap()[0].name, "A");
    }

    #[test]
    fn test_save_relationships_rejects_self_and_unrelated() {
        let store = Store::in_memory().unwrap();
        let a = system(&store, "A");
        let b = system(&store, "B");
        let c = system(&store, "C");

        assert!(matches!(
            store.save_relationships(a, &[depends_on(a, a)]),
            Err(TrackerError::Validation(_))
        ));
        assert!(matches!(
            store.save_relationships(a, &[depends_on(b, c)]),
            Err(TrackerError::Validation(_))
        ));
        assert!(matches!(
            store.save_relationships(a, &[depends_on(a, 999)]),
            Err(TrackerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_entries_collapse() {
        let store = Store::in_memory().unwrap();
        let a = system(&store, "A");
        let b = system(&store, "B");
        let saved = store
            .save_relationships(a, &[depends_on(a, b), depends_on(a, b)])
            .unwrap();
        assert_eq!(saved.len(), 1);
    }

    #[test]
    fn test_impact_through_store() {
        let store = Store::in_memory().unwrap();
        let a = system(&store, "A");
        let b = system(&store, "B");
        let c = system(&store, "C");
        store.save_relationships(b, &[depends_on(a, b), depends_on(b, c)]).unwrap();

        let report = store.impact_analysis(a).unwrap();
        let ids: Vec<i64> = report.affected.iter().map(|s| s.system_id).collect();
        assert_eq!(ids, vec![b, c]);
        assert_eq!(report.affected[1].impact_level, 2);
    }

    #[test]
    fn test_notes_scoped_to_system() {
        let store = Store::in_memory().unwrap();
        let a = system(&store, "A");
        let b = system(&store, "B");
        let note = store
            .add_note(
                a,
                &NoteInput {
                    title: "Patch window".to_string(),
                    content: "Sundays".to_string(),
                    created_by: Some("dana".to_string()),
                },
            )
            .unwrap();

        assert!(store.delete_note(b, note.id).is_err());
        let edited = store
            .update_note(
                a,
                note.id,
                &NoteInput {
                    title: "Patch window".to_string(),
                    content: "Saturdays".to_string(),
                    created_by: None,
                },
            )
            .unwrap();
        assert_eq!(edited.content, "Saturdays");
        assert_eq!(edited.created_by.as_deref(), Some("dana"));

        store.delete_note(a, note.id).unwrap();
        assert!(store.list_notes(a).unwrap().is_empty());
    }

    #[test]
    fn test_recovery_step_ordering() {
        let store = Store::in_memory().unwrap();
        let a = system(&store, "A");
        let first = store.save_recovery_step(a, &step("Fail over")).unwrap();
        let second = store.save_recovery_step(a, &step("Restore")).unwrap();
        let third = store.save_recovery_step(a, &step("Verify")).unwrap();
        assert_eq!((first.step_order, second.step_order, third.step_order), (1, 2, 3));

        assert!(store.move_recovery_step(a, third.id, MoveDirection::Up).unwrap());
        assert_eq!(
            titles(&store, a),
            vec![
                (1, "Fail over".to_string()),
                (2, "Verify".to_string()),
                (3, "Restore".to_string())
            ]
        );

        assert!(!store.move_recovery_step(a, first.id, MoveDirection::Up).unwrap());
        assert!(!store.move_recovery_step(a, second.id, MoveDirection::Down).unwrap());

        store.delete_recovery_step(a, first.id).unwrap();
        assert_eq!(
            titles(&store, a),
            vec![(1, "Verify".to_string()), (2, "Restore".to_string())]
        );

        let mut edit = step("Restore from backup");
        edit.id = Some(second.id);
        let edited = store.save_recovery_step(a, &edit).unwrap();
        assert_eq!(edited.step_order, 2);
        assert_eq!(edited.title, "Restore from backup");
    }

    #[test]
    fn test_disaster_analysis_totals_minutes() {
        let store = Store::in_memory().unwrap();
        let a = system(&store, "A");
        let mut s = step("Fail over");
        s.estimated_minutes = Some(30);
        store.save_recovery_step(a, &s).unwrap();
        s.title = "Verify".to_string();
        s.estimated_minutes = Some(15);
        store.save_recovery_step(a, &s).unwrap();

        let analysis = store.disaster_analysis(a).unwrap();
        assert_eq!(analysis.recovery_steps.len(), 2);
        assert_eq!(analysis.total_estimated_minutes, 45);
        assert!(analysis.impact.affected.is_empty());
    }

    #[test]
    fn test_delete_cascades_relationships() {
        let store = Store::in_memory().unwrap();
        let a = system(&store, "A");
        let b = system(&store, "B");
        store.save_relationships(a, &[depends_on(a, b)]).unwrap();
        store.delete_system(a).unwrap();
        assert!(store.system_relationships(b).unwrap().is_empty());
        assert!(store.relationship_diagram().unwrap().links.is_empty());
    }
}
