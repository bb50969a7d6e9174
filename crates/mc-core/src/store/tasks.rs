use rusqlite::{OptionalExtension, Row, params};

use super::{Store, parse_enum, parse_json, parse_opt_ts, parse_ts, ts};
use crate::model::{Task, TaskStatus};
use crate::{Error, Result};

const TASK_COLUMNS: &str = "id, title, description, status, priority, assignee_ids, created_by, \
     due_at, created_at, updated_at, completed_at";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(3)?;
    let priority: String = row.get(4)?;
    let assignees: String = row.get(5)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: parse_enum(3, &status)?,
        priority: parse_enum(4, &priority)?,
        assignee_ids: parse_json(5, &assignees)?,
        created_by: row.get(6)?,
        due_at: parse_opt_ts(7, row.get(7)?)?,
        created_at: parse_ts(8, &created_at)?,
        updated_at: parse_ts(9, &updated_at)?,
        completed_at: parse_opt_ts(10, row.get(10)?)?,
    })
}

impl Store {
    pub fn insert_task(&self, task: &Task) -> Result<()> {
        let assignees = serde_json::to_string(&task.assignee_ids)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tasks (id, title, description, status, priority, assignee_ids, created_by,
                due_at, created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                task.id,
                task.title,
                task.description,
                task.status.as_str(),
                task.priority.as_str(),
                assignees,
                task.created_by,
                task.due_at.as_ref().map(ts),
                ts(&task.created_at),
                ts(&task.updated_at),
                task.completed_at.as_ref().map(ts),
            ],
        )?;
        Ok(())
    }

    pub fn task(&self, id: &str) -> Result<Option<Task>> {
        let conn = self.conn()?;
        let task = conn
            .query_row(
                &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                params![id],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    /// List tasks, oldest first, optionally filtered by status
    pub fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        let conn = self.conn()?;
        let tasks = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM tasks WHERE status = ?1 ORDER BY created_at",
                    TASK_COLUMNS
                ))?;
                stmt.query_map(params![status.as_str()], task_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM tasks ORDER BY created_at",
                    TASK_COLUMNS
                ))?;
                stmt.query_map([], task_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(tasks)
    }

    /// Overwrite an existing task row
    pub fn save_task(&self, task: &Task) -> Result<()> {
        let assignees = serde_json::to_string(&task.assignee_ids)?;
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE tasks SET title = ?2, description = ?3, status = ?4, priority = ?5,
                assignee_ids = ?6, due_at = ?7, updated_at = ?8, completed_at = ?9
             WHERE id = ?1",
            params![
                task.id,
                task.title,
                task.description,
                task.status.as_str(),
                task.priority.as_str(),
                assignees,
                task.due_at.as_ref().map(ts),
                ts(&task.updated_at),
                task.completed_at.as_ref().map(ts),
            ],
        )?;

        if affected == 0 {
            return Err(Error::not_found("task", &task.id));
        }
        Ok(())
    }

    /// Delete a task row; returns false when it did not exist
    pub fn delete_task(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let affected = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}
