//! Project folder rows.

use super::{Database, now_ms};
use crate::error::{Error, Result};
use crate::types::Project;
use rusqlite::{OptionalExtension, Row, params};

pub fn parse_project_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        path: row.get("path")?,
        last_scan: row.get("last_scan")?,
        active: row.get("active")?,
    })
}

impl Database {
    /// Record a project folder, reactivating it if it was known but inactive.
    pub fn register_project(&self, path: &str) -> Result<Project> {
        let now = now_ms();

        self.with_conn(|conn| {
            let existing = conn
                .query_row(
                    "SELECT id, path, last_scan, active FROM folders WHERE path = ?1",
                    params![path],
                    parse_project_row,
                )
                .optional()?;

            if let Some(mut project) = existing {
                if !project.active {
                    conn.execute(
                        "UPDATE folders SET active = 1 WHERE id = ?1",
                        params![project.id],
                    )?;
                    project.active = true;
                }
                return Ok(project);
            }

            conn.execute(
                "INSERT INTO folders (path, last_scan, active) VALUES (?1, ?2, 1)",
                params![path, now],
            )?;

            Ok(Project {
                id: conn.last_insert_rowid(),
                path: path.to_string(),
                last_scan: now,
                active: true,
            })
        })
    }

    /// Get a project by id.
    pub fn get_project(&self, id: i64) -> Result<Option<Project>> {
        self.with_conn(|conn| {
            let project = conn
                .query_row(
                    "SELECT id, path, last_scan, active FROM folders WHERE id = ?1",
                    params![id],
                    parse_project_row,
                )
                .optional()?;
            Ok(project)
        })
    }

    /// All active projects, ordered by path.
    pub fn list_active_projects(&self) -> Result<Vec<Project>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, path, last_scan, active FROM folders
                 WHERE active = 1
                 ORDER BY path",
            )?;
            let projects = stmt
                .query_map([], parse_project_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(projects)
        })
    }

    /// Delete a project and all of its task rows.
    pub fn remove_project(&self, id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute("DELETE FROM tasks WHERE folder_id = ?1", params![id])?;
            let deleted = tx.execute("DELETE FROM folders WHERE id = ?1", params![id])?;
            if deleted == 0 {
                return Err(Error::project_not_found(id));
            }

            tx.commit()?;
            Ok(())
        })
    }
}
