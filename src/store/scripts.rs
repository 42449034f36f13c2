//! Scripts and their links to systems and workflows

use super::{ensure_exists, load_links, named_refs, now, or_not_found, replace_links, Store};
use crate::error::{Result, TrackerError};
use crate::models::{
    LinkedSystem, NamedRef, Script, ScriptDetail, ScriptFilter, ScriptInput,
};
use rusqlite::{params, Connection, Row};
use tracing::info;

const SCRIPT_COLUMNS: &str = "id, name, description, author, hosted_on, host_location, path, \
     programming_language, schedule_information, schedule_method, custom_schedule_method, \
     documentation, created_at, updated_at";

fn script_from_row(row: &Row<'_>) -> rusqlite::Result<Script> {
    Ok(Script {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        author: row.get(3)?,
        hosted_on: row.get(4)?,
        host_location: row.get(5)?,
        path: row.get(6)?,
        programming_language: row.get(7)?,
        schedule_information: row.get(8)?,
        schedule_method: row.get(9)?,
        custom_schedule_method: row.get(10)?,
        documentation: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn load_script(conn: &Connection, id: i64) -> Result<Script> {
    or_not_found(
        conn.query_row(
            &format!("SELECT {SCRIPT_COLUMNS} FROM scripts WHERE id = ?1"),
            params![id],
            script_from_row,
        ),
        "script",
        id,
    )
}

fn linked_systems(conn: &Connection, script_id: i64) -> Result<Vec<LinkedSystem>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, s.category, ss.relationship_type, ss.description
         FROM script_systems ss JOIN systems s ON s.id = ss.system_id
         WHERE ss.script_id = ?1 ORDER BY s.name",
    )?;
    let systems = stmt
        .query_map(params![script_id], |row| {
            Ok(LinkedSystem {
                id: row.get(0)?,
                name: row.get(1)?,
                category: row.get(2)?,
                relationship_type: row.get(3)?,
                description: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(systems)
}

fn write_links(conn: &Connection, script_id: i64, input: &ScriptInput) -> Result<()> {
    conn.execute(
        "DELETE FROM script_systems WHERE script_id = ?1",
        params![script_id],
    )?;
    for link in &input.systems {
        ensure_exists(conn, "systems", "system", link.system_id)?;
        conn.execute(
            "INSERT INTO script_systems (script_id, system_id, relationship_type, description)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (script_id, system_id) DO UPDATE
             SET relationship_type = excluded.relationship_type,
                 description = excluded.description",
            params![script_id, link.system_id, link.relationship_type, link.description],
        )?;
    }
    for workflow_id in &input.workflows {
        ensure_exists(conn, "workflows", "workflow", *workflow_id)?;
    }
    replace_links(
        conn,
        "workflow_scripts",
        "script_id",
        "workflow_id",
        script_id,
        &input.workflows,
    )
}

fn check_host(conn: &Connection, input: &ScriptInput) -> Result<()> {
    match input.hosted_on {
        Some(host) => ensure_exists(conn, "systems", "system", host),
        None => Ok(()),
    }
}

impl Store {
    /// Scripts ordered by name
    pub fn list_scripts(&self, filter: &ScriptFilter) -> Result<Vec<Script>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SCRIPT_COLUMNS} FROM scripts
             WHERE (?1 IS NULL OR programming_language = ?1 COLLATE NOCASE)
               AND (?2 IS NULL OR schedule_method = ?2)
               AND (?3 IS NULL OR hosted_on = ?3)
             ORDER BY name, id"
        ))?;
        let scripts = stmt
            .query_map(
                params![filter.language, filter.schedule_method, filter.hosted_on],
                script_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(scripts)
    }

    pub fn create_script(&self, input: &ScriptInput) -> Result<Script> {
        input.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        check_host(&tx, input)?;

        let ts = now();
        tx.execute(
            "INSERT INTO scripts (name, description, author, hosted_on, host_location, path,
                 programming_language, schedule_information, schedule_method,
                 custom_schedule_method, documentation, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                input.name.trim(),
                input.description,
                input.author,
                input.hosted_on,
                input.host_location,
                input.path,
                input.programming_language,
                input.schedule_information,
                input.schedule_method,
                input.custom_schedule_method,
                input.documentation,
                ts
            ],
        )?;
        let id = tx.last_insert_rowid();
        write_links(&tx, id, input)?;
        let script = load_script(&tx, id)?;
        tx.commit()?;

        info!(script_id = id, name = %script.name, "Created script");
        Ok(script)
    }

    pub fn get_script(&self, id: i64) -> Result<Script> {
        let conn = self.conn()?;
        load_script(&conn, id)
    }

    pub fn script_detail(&self, id: i64) -> Result<ScriptDetail> {
        let conn = self.conn()?;
        let script = load_script(&conn, id)?;
        let host = match script.hosted_on {
            Some(host) => named_refs(&conn, "systems", &[host])?.into_iter().next(),
            None => None,
        };
        let workflow_ids = load_links(&conn, "workflow_scripts", "script_id", "workflow_id", id)?;
        let workflows: Vec<NamedRef> = named_refs(&conn, "workflows", &workflow_ids)?;

        Ok(ScriptDetail {
            schedule_display: script.schedule_display(),
            host,
            systems: linked_systems(&conn, id)?,
            workflows,
            script,
        })
    }

    /// Replace a script's fields and its system and workflow links.
    pub fn update_script(&self, id: i64, input: &ScriptInput) -> Result<Script> {
        input.validate()?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        check_host(&tx, input)?;

        let changed = tx.execute(
            "UPDATE scripts SET name = ?1, description = ?2, author = ?3, hosted_on = ?4,
                 host_location = ?5, path = ?6, programming_language = ?7,
                 schedule_information = ?8, schedule_method = ?9, custom_schedule_method = ?10,
                 documentation = ?11, updated_at = ?12
             WHERE id = ?13",
            params![
                input.name.trim(),
                input.description,
                input.author,
                input.hosted_on,
                input.host_location,
                input.path,
                input.programming_language,
                input.schedule_information,
                input.schedule_method,
                input.custom_schedule_method,
                input.documentation,
                now(),
                id
            ],
        )?;
        if changed == 0 {
            return Err(TrackerError::not_found("script", id));
        }
        write_links(&tx, id, input)?;
        let script = load_script(&tx, id)?;
        tx.commit()?;

        info!(script_id = id, "Updated script");
        Ok(script)
    }

    pub fn delete_script(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM scripts WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(TrackerError::not_found("script", id));
        }
        info!(script_id = id, "Deleted script");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ScheduleMethod, ScriptLinkType, ScriptSystemLink, SystemCategory, SystemInput,
        WorkflowInput,
    };

    #[test]
    fn test_script_with_links() {
        let store = Store::in_memory().unwrap();
        let host = store
            .create_system(&SystemInput::new("jobs01", SystemCategory::Custom))
            .unwrap();
        let banner = store
            .create_system(&SystemInput::new("Banner", SystemCategory::Core))
            .unwrap();
        let workflow = store.create_workflow(&WorkflowInput::new("Nightly")).unwrap();

        let mut input = ScriptInput::new("sync_students.py");
        input.hosted_on = Some(host.id);
        input.programming_language = "Python".to_string();
        input.schedule_method = Some(ScheduleMethod::Cron);
        input.systems = vec![ScriptSystemLink {
            system_id: banner.id,
            relationship_type: ScriptLinkType::Input,
            description: "reads enrolments".to_string(),
        }];
        input.workflows = vec![workflow.id];
        let script = store.create_script(&input).unwrap();

        let detail = store.script_detail(script.id).unwrap();
        assert_eq!(detail.host.unwrap().name, "jobs01");
        assert_eq!(detail.systems.len(), 1);
        assert_eq!(detail.systems[0].relationship_type, ScriptLinkType::Input);
        assert_eq!(detail.workflows[0].id, workflow.id);
        assert_eq!(detail.schedule_display.as_deref(), Some("Cron"));

        input.systems.clear();
        input.workflows.clear();
        store.update_script(script.id, &input).unwrap();
        let detail = store.script_detail(script.id).unwrap();
        assert!(detail.systems.is_empty());
        assert!(detail.workflows.is_empty());
    }

    #[test]
    fn test_host_delete_sets_null() {
        let store = Store::in_memory().unwrap();
        let host = store
            .create_system(&SystemInput::new("jobs01", SystemCategory::Custom))
            .unwrap();
        let mut input = ScriptInput::new("backup.sh");
        input.hosted_on = Some(host.id);
        let script = store.create_script(&input).unwrap();

        store.delete_system(host.id).unwrap();
        assert_eq!(store.get_script(script.id).unwrap().hosted_on, None);
    }

    #[test]
    fn test_unknown_host_is_not_found() {
        let store = Store::in_memory().unwrap();
        let mut input = ScriptInput::new("backup.sh");
        input.hosted_on = Some(42);
        assert!(matches!(
            store.create_script(&input),
            Err(TrackerError::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_filters() {
        let store = Store::in_memory().unwrap();
        let mut a = ScriptInput::new("b.ps1");
        a.programming_language = "PowerShell".to_string();
        store.create_script(&a).unwrap();
        let mut b = ScriptInput::new("a.py");
        b.programming_language = "Python".to_string();
        b.schedule_method = Some(ScheduleMethod::Airflow);
        store.create_script(&b).unwrap();

        let all = store.list_scripts(&ScriptFilter::default()).unwrap();
        assert_eq!(all[0].name, "a.py");

        let python = store
            .list_scripts(&ScriptFilter {
                language: Some("python".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(python.len(), 1);

        let airflow = store
            .list_scripts(&ScriptFilter {
                schedule_method: Some(ScheduleMethod::Airflow),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(airflow[0].name, "a.py");
    }
}
