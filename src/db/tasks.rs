//! Task entity store: row mapping, CRUD, and the conditional bulk updates
//! the lifecycle manager and the sweeper rely on.

use super::{Database, now_ms};
use crate::clock::{DATE_FORMAT, TIME_FORMAT, format_instant};
use crate::types::{Priority, ReminderKind, Task, TaskStatus};
use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

const TASK_COLUMNS: &str = "id, owner_id, title, description, start_date, due_date, time_due,
    priority, status, is_completed, is_notified, is_past_due_notified,
    is_one_day_before_notified, schedule_epoch, created_at, updated_at";

fn conversion_error(
    column: &str,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    tracing::error!(column, error = %err, "Corrupt task column");
    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(err))
}

#[derive(Debug)]
struct UnknownValue(String);

impl std::fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownValue {}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let start_date: String = row.get("start_date")?;
    let due_date: String = row.get("due_date")?;
    let time_due: String = row.get("time_due")?;
    let priority: String = row.get("priority")?;
    let status: String = row.get("status")?;

    Ok(Task {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        start_date: NaiveDate::parse_from_str(&start_date, DATE_FORMAT)
            .map_err(|e| conversion_error("start_date", e))?,
        due_date: NaiveDate::parse_from_str(&due_date, DATE_FORMAT)
            .map_err(|e| conversion_error("due_date", e))?,
        time_due: NaiveTime::parse_from_str(&time_due, TIME_FORMAT)
            .map_err(|e| conversion_error("time_due", e))?,
        priority: Priority::parse(&priority)
            .ok_or_else(|| conversion_error("priority", UnknownValue(priority.clone())))?,
        status: TaskStatus::parse(&status)
            .ok_or_else(|| conversion_error("status", UnknownValue(status.clone())))?,
        is_completed: row.get("is_completed")?,
        is_notified: row.get("is_notified")?,
        is_past_due_notified: row.get("is_past_due_notified")?,
        is_one_day_before_notified: row.get("is_one_day_before_notified")?,
        schedule_epoch: row.get("schedule_epoch")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn insert_task(conn: &Connection, task: &Task) -> Result<()> {
    conn.execute(
        "INSERT INTO tasks (id, owner_id, title, description, start_date, due_date, time_due,
             priority, status, is_completed, is_notified, is_past_due_notified,
             is_one_day_before_notified, schedule_epoch, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            task.id,
            task.owner_id,
            task.title,
            task.description,
            task.start_date.format(DATE_FORMAT).to_string(),
            task.due_date.format(DATE_FORMAT).to_string(),
            task.time_due.format(TIME_FORMAT).to_string(),
            task.priority.as_str(),
            task.status.as_str(),
            task.is_completed,
            task.is_notified,
            task.is_past_due_notified,
            task.is_one_day_before_notified,
            task.schedule_epoch,
            task.created_at,
            task.updated_at,
        ],
    )?;
    Ok(())
}

/// Overwrite every mutable column of an existing task.
///
/// Callers must hold the row's read in the same transaction, otherwise a
/// concurrent flag set by the sweeper could be lost.
pub(crate) fn save_task(conn: &Connection, task: &Task) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE tasks SET title = ?2, description = ?3, start_date = ?4, due_date = ?5,
             time_due = ?6, priority = ?7, status = ?8, is_completed = ?9, is_notified = ?10,
             is_past_due_notified = ?11, is_one_day_before_notified = ?12,
             schedule_epoch = ?13, updated_at = ?14
         WHERE id = ?1",
        params![
            task.id,
            task.title,
            task.description,
            task.start_date.format(DATE_FORMAT).to_string(),
            task.due_date.format(DATE_FORMAT).to_string(),
            task.time_due.format(TIME_FORMAT).to_string(),
            task.priority.as_str(),
            task.status.as_str(),
            task.is_completed,
            task.is_notified,
            task.is_past_due_notified,
            task.is_one_day_before_notified,
            task.schedule_epoch,
            task.updated_at,
        ],
    )?;
    Ok(changed > 0)
}

pub(crate) fn task_id_exists(conn: &Connection, task_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM tasks WHERE id = ?1", params![task_id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

/// Fetch a task scoped to its owner.
pub(crate) fn get_task_internal(
    conn: &Connection,
    owner_id: &str,
    task_id: &str,
) -> Result<Option<Task>> {
    let sql = format!(
        "SELECT {} FROM tasks WHERE id = ?1 AND owner_id = ?2",
        TASK_COLUMNS
    );
    let task = conn
        .query_row(&sql, params![task_id, owner_id], parse_task_row)
        .optional()?;
    Ok(task)
}

pub(crate) fn list_tasks_internal(conn: &Connection, owner_id: &str) -> Result<Vec<Task>> {
    let sql = format!(
        "SELECT {} FROM tasks WHERE owner_id = ?1 ORDER BY due_at ASC, created_at ASC, id ASC",
        TASK_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map(params![owner_id], parse_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

/// Flip an owner's non-completed tasks whose due instant is at or before `now` to OverDue.
pub(crate) fn mark_overdue_internal(
    conn: &Connection,
    owner_id: Option<&str>,
    now: NaiveDateTime,
) -> Result<usize> {
    let now_key = format_instant(now);
    let changed = match owner_id {
        Some(owner) => conn.execute(
            "UPDATE tasks SET status = 'OverDue', updated_at = ?1
             WHERE owner_id = ?2 AND status = 'Pending' AND due_at <= ?3",
            params![now_ms(), owner, now_key],
        )?,
        None => conn.execute(
            "UPDATE tasks SET status = 'OverDue', updated_at = ?1
             WHERE status = 'Pending' AND due_at <= ?2",
            params![now_ms(), now_key],
        )?,
    };
    Ok(changed)
}

impl Database {
    /// Insert a fully formed task.
    pub fn insert_task(&self, task: &Task) -> Result<()> {
        self.with_conn(|conn| insert_task(conn, task))
    }

    /// Get a task by ID, scoped to its owner.
    pub fn get_task(&self, owner_id: &str, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, owner_id, task_id))
    }

    pub fn task_exists(&self, task_id: &str) -> Result<bool> {
        self.with_conn(|conn| task_id_exists(conn, task_id))
    }

    /// List an owner's tasks ordered by ascending due instant, as stored.
    pub fn list_tasks(&self, owner_id: &str) -> Result<Vec<Task>> {
        self.with_conn(|conn| list_tasks_internal(conn, owner_id))
    }

    /// Every task in the store, across all owners.
    pub fn all_tasks(&self) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM tasks ORDER BY due_at ASC, id ASC",
                TASK_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map([], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    /// Hard-delete a task. Returns false if nothing matched.
    pub fn delete_task(&self, owner_id: &str, task_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM tasks WHERE id = ?1 AND owner_id = ?2",
                params![task_id, owner_id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// Bulk OverDue flip for one owner. Returns the number of tasks flipped.
    pub fn mark_overdue(&self, owner_id: &str, now: NaiveDateTime) -> Result<usize> {
        self.with_conn(|conn| mark_overdue_internal(conn, Some(owner_id), now))
    }

    /// Bulk OverDue flip across all owners.
    pub fn mark_all_overdue(&self, now: NaiveDateTime) -> Result<usize> {
        self.with_conn(|conn| mark_overdue_internal(conn, None, now))
    }

    /// Set a reminder's idempotency flag if it is still unset in the epoch the
    /// caller observed.
    ///
    /// Returns false when the flag was already set, the task was rescheduled
    /// since it was read, or the task is gone. In each of those cases the
    /// write must not happen.
    pub fn set_reminder_flag(
        &self,
        task_id: &str,
        kind: ReminderKind,
        schedule_epoch: i64,
    ) -> Result<bool> {
        let column = kind.flag_column();
        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE tasks SET {col} = 1, updated_at = ?1
                 WHERE id = ?2 AND {col} = 0 AND schedule_epoch = ?3",
                col = column
            );
            let changed = conn.execute(&sql, params![now_ms(), task_id, schedule_epoch])?;
            Ok(changed > 0)
        })
    }
}
