//! Global task rows: full per-project replace, the combined view, and
//! completion updates.

use super::{Database, now_ms};
use crate::error::{Error, Result};
use crate::types::{GlobalTask, GlobalTasks, NOTES_FILE, Task, TaskSummary};
use rusqlite::{Connection, OptionalExtension, Row, params};

pub fn parse_global_task_row(row: &Row) -> rusqlite::Result<GlobalTask> {
    Ok(GlobalTask {
        id: row.get("id")?,
        folder_id: row.get("folder_id")?,
        file_path: row.get("file_path")?,
        line_number: row.get("line_number")?,
        content: row.get("content")?,
        completed: row.get("completed")?,
        last_updated: row.get("last_updated")?,
        folder_path: row.get("folder_path")?,
    })
}

const GLOBAL_TASK_COLUMNS: &str = "t.id, t.folder_id, t.file_path, t.line_number, t.content,
     t.completed, t.last_updated, f.path AS folder_path";

/// Per-project counts for every active project, including projects with no tasks.
fn task_summaries(conn: &Connection) -> Result<Vec<TaskSummary>> {
    let mut stmt = conn.prepare(
        "SELECT f.path,
                COUNT(t.id) AS total_tasks,
                COALESCE(SUM(CASE WHEN t.completed = 1 THEN 1 ELSE 0 END), 0) AS completed_tasks,
                COALESCE(SUM(CASE WHEN t.completed = 0 THEN 1 ELSE 0 END), 0) AS pending_tasks,
                MAX(t.last_updated) AS last_updated
         FROM folders f
         LEFT JOIN tasks t ON f.id = t.folder_id
         WHERE f.active = 1
         GROUP BY f.id, f.path
         ORDER BY f.path",
    )?;

    let summaries = stmt
        .query_map([], |row| {
            Ok(TaskSummary {
                folder_path: row.get(0)?,
                total_tasks: row.get(1)?,
                completed_tasks: row.get(2)?,
                pending_tasks: row.get(3)?,
                last_updated: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(summaries)
}

impl Database {
    /// Replace every task row of a project with `tasks`, in one transaction.
    ///
    /// Row ids are not preserved across calls. Also stamps the project's
    /// `last_scan`. Returns the number of rows written.
    pub fn replace_project_tasks(&self, project_id: i64, tasks: &[Task]) -> Result<usize> {
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let known: Option<i64> = tx
                .query_row(
                    "SELECT id FROM folders WHERE id = ?1",
                    params![project_id],
                    |row| row.get(0),
                )
                .optional()?;
            if known.is_none() {
                return Err(Error::project_not_found(project_id));
            }

            tx.execute("DELETE FROM tasks WHERE folder_id = ?1", params![project_id])?;

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO tasks (folder_id, file_path, line_number, content, completed, last_updated)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for task in tasks {
                    stmt.execute(params![
                        project_id,
                        NOTES_FILE,
                        task.index as i64,
                        &task.text,
                        task.checked,
                        now,
                    ])?;
                }
            }

            tx.execute(
                "UPDATE folders SET last_scan = ?1 WHERE id = ?2",
                params![now, project_id],
            )?;

            tx.commit()?;
            Ok(tasks.len())
        })
    }

    /// Every task of every active project, with per-project summaries.
    ///
    /// Ordered by project path, then open before completed, then most recently
    /// updated first.
    pub fn list_global_tasks(&self) -> Result<GlobalTasks> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {GLOBAL_TASK_COLUMNS}
                 FROM tasks t
                 JOIN folders f ON t.folder_id = f.id
                 WHERE f.active = 1
                 ORDER BY f.path, t.completed, t.last_updated DESC, t.line_number"
            );
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map([], parse_global_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let summaries = task_summaries(conn)?;

            Ok(GlobalTasks {
                total: tasks.len(),
                tasks,
                summaries,
            })
        })
    }

    /// Get one global task by id.
    pub fn get_global_task(&self, id: i64) -> Result<Option<GlobalTask>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {GLOBAL_TASK_COLUMNS}
                 FROM tasks t
                 JOIN folders f ON t.folder_id = f.id
                 WHERE t.id = ?1"
            );
            let task = conn
                .query_row(&sql, params![id], parse_global_task_row)
                .optional()?;
            Ok(task)
        })
    }

    /// Set the completion flag of one global task.
    pub fn set_task_completion(&self, id: i64, completed: bool) -> Result<()> {
        let now = now_ms();

        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tasks SET completed = ?1, last_updated = ?2 WHERE id = ?3",
                params![completed, now, id],
            )?;
            if updated == 0 {
                return Err(Error::global_task_not_found(id));
            }
            Ok(())
        })
    }
}
