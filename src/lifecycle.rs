//! Task lifecycle manager: validated create/update/delete/list with
//! clock-derived status.
//!
//! Status is stored, but every read and write boundary re-derives it with
//! [`derive_status`] against the injected clock, so a task whose due instant
//! has passed reads as `OverDue` even if no sweep has run since.

use crate::clock::{self, Clock};
use crate::db::tasks::{
    get_task_internal, insert_task, list_tasks_internal, mark_overdue_internal, save_task,
    task_id_exists,
};
use crate::db::{Database, now_ms};
use crate::error::{TaskError, TaskResult};
use crate::types::{NewTask, Priority, Task, TaskStatus, TaskUpdate};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Upper bound on identifier regeneration when a candidate already exists.
const MAX_ID_ATTEMPTS: usize = 16;

/// Status as it should read at `now`.
///
/// Anything not completed whose due instant is at or before `now` is OverDue.
/// Applying it twice with the same `now` yields the same result.
pub fn derive_status(status: TaskStatus, due: NaiveDateTime, now: NaiveDateTime) -> TaskStatus {
    if status != TaskStatus::Completed && due <= now {
        TaskStatus::OverDue
    } else {
        status
    }
}

/// An update whose fields have been parsed and checked in isolation.
#[derive(Debug, Clone, Default)]
pub struct ParsedUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub time_due: Option<NaiveTime>,
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub is_completed: Option<bool>,
}

/// Apply a parsed update to a task in place. Returns whether it rescheduled.
///
/// A change to any of start date, due date, or due time resets status to
/// Pending, clears all three reminder flags, and opens a new scheduling
/// epoch, even when the task was Completed.
pub fn apply_update(task: &mut Task, update: ParsedUpdate, now: NaiveDateTime) -> TaskResult<bool> {
    if let Some(title) = update.title {
        task.title = title;
    }
    if let Some(description) = update.description {
        task.description = description;
    }
    if let Some(priority) = update.priority {
        task.priority = priority;
    }

    let mut rescheduled = false;
    if let Some(start) = update.start_date
        && start != task.start_date
    {
        task.start_date = start;
        rescheduled = true;
    }
    if let Some(due) = update.due_date
        && due != task.due_date
    {
        task.due_date = due;
        rescheduled = true;
    }
    if let Some(time) = update.time_due
        && time != task.time_due
    {
        task.time_due = time;
        rescheduled = true;
    }

    if rescheduled {
        task.status = TaskStatus::Pending;
        task.is_notified = false;
        task.is_past_due_notified = false;
        task.is_one_day_before_notified = false;
        task.schedule_epoch += 1;
    }

    if task.start_date > task.due_date {
        return Err(TaskError::validation(
            "start_date",
            "Start date must be on or before due date",
        ));
    }

    if let Some(done) = update.is_completed {
        task.is_completed = done;
    }

    match update.status {
        Some(TaskStatus::Completed) => {
            task.status = TaskStatus::Completed;
            task.is_completed = true;
        }
        Some(requested) if !task.status.is_sticky() => task.status = requested,
        _ => {}
    }

    task.status = derive_status(task.status, task.due_instant(), now);
    Ok(rescheduled)
}

fn required_text(field: &str, value: &str) -> TaskResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TaskError::missing_field(field));
    }
    Ok(trimmed.to_string())
}

fn parse_priority(value: Option<&str>) -> TaskResult<Option<Priority>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Priority::parse(raw)
            .map(Some)
            .ok_or_else(|| TaskError::invalid_priority(raw)),
    }
}

/// Manages user-driven task mutations against a shared store and clock.
#[derive(Clone)]
pub struct TaskManager {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl TaskManager {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn parse_date(&self, field: &str, value: &str) -> TaskResult<NaiveDate> {
        if value.trim().is_empty() {
            return Err(TaskError::missing_field(field));
        }
        clock::to_civil_date(value, self.clock.offset()).map_err(|e| e.with_field(field))
    }

    /// Create a task for `owner_id`.
    pub fn create(&self, owner_id: &str, input: NewTask) -> TaskResult<Task> {
        let owner_id = required_text("owner_id", owner_id)?;
        let title = required_text("title", &input.title)?;
        let description = required_text("description", &input.description)?;
        let start_date = self.parse_date("start_date", &input.start_date)?;
        let due_date = self.parse_date("due_date", &input.due_date)?;
        let priority = parse_priority(input.priority.as_deref())?.unwrap_or_default();
        let time_due = clock::parse_time_of_day(input.time_due.as_deref().unwrap_or(""))?;

        if start_date > due_date {
            return Err(TaskError::validation(
                "start_date",
                "Start date must be on or before due date",
            ));
        }

        let now = now_ms();
        let task = self.db.with_tx(|tx| {
            let mut id = Uuid::now_v7().to_string();
            let mut attempts = 1;
            while task_id_exists(tx, &id)? {
                if attempts >= MAX_ID_ATTEMPTS {
                    return Err(TaskError::internal("Could not allocate a unique task id").into());
                }
                debug!(task_id = %id, "Task id collision, regenerating");
                id = Uuid::now_v7().to_string();
                attempts += 1;
            }

            let task = Task {
                id,
                owner_id,
                title,
                description,
                start_date,
                due_date,
                time_due,
                priority,
                status: TaskStatus::Pending,
                is_completed: false,
                is_notified: false,
                is_past_due_notified: false,
                is_one_day_before_notified: false,
                schedule_epoch: 0,
                created_at: now,
                updated_at: now,
            };
            insert_task(tx, &task)?;
            Ok(task)
        })?;

        info!(task_id = %task.id, owner = %task.owner_id, due = %task.due_instant(), "Task created");
        Ok(task)
    }

    /// Fetch one task with its status derived for the current time.
    pub fn get(&self, owner_id: &str, task_id: &str) -> TaskResult<Task> {
        let mut task = self
            .db
            .get_task(owner_id, task_id)?
            .ok_or_else(|| TaskError::task_not_found(task_id))?;
        task.status = derive_status(task.status, task.due_instant(), self.clock.now());
        Ok(task)
    }

    fn parse_update(&self, changes: &TaskUpdate) -> TaskResult<ParsedUpdate> {
        let status = match changes.status.as_deref() {
            None => None,
            Some(raw) => Some(TaskStatus::parse(raw).ok_or_else(|| {
                TaskError::validation(
                    "status",
                    &format!("Invalid status '{}': expected pending, overdue or completed", raw),
                )
            })?),
        };

        Ok(ParsedUpdate {
            title: changes
                .title
                .as_deref()
                .map(|t| required_text("title", t))
                .transpose()?,
            description: changes
                .description
                .as_deref()
                .map(|d| required_text("description", d))
                .transpose()?,
            start_date: changes
                .start_date
                .as_deref()
                .map(|d| self.parse_date("start_date", d))
                .transpose()?,
            due_date: changes
                .due_date
                .as_deref()
                .map(|d| self.parse_date("due_date", d))
                .transpose()?,
            time_due: changes
                .time_due
                .as_deref()
                .map(clock::parse_time_of_day)
                .transpose()?,
            priority: parse_priority(changes.priority.as_deref())?,
            status,
            is_completed: changes.is_completed,
        })
    }

    /// Apply a partial update.
    ///
    /// The read, the state transition, and the write happen in one
    /// transaction, so a sweeper flag set cannot slip in between them.
    pub fn update(&self, owner_id: &str, task_id: &str, changes: TaskUpdate) -> TaskResult<Task> {
        let parsed = self.parse_update(&changes)?;
        let now = self.clock.now();

        let (task, rescheduled) = self.db.with_tx(|tx| {
            let mut task = get_task_internal(tx, owner_id, task_id)?
                .ok_or_else(|| TaskError::task_not_found(task_id))?;
            let rescheduled = apply_update(&mut task, parsed, now)?;
            task.updated_at = now_ms();
            save_task(tx, &task)?;
            Ok((task, rescheduled))
        })?;

        if rescheduled {
            info!(task_id = %task.id, epoch = task.schedule_epoch, due = %task.due_instant(), "Task rescheduled, reminders reset");
        } else {
            debug!(task_id = %task.id, status = %task.status, "Task updated");
        }
        Ok(task)
    }

    /// Mark a task completed.
    pub fn complete(&self, owner_id: &str, task_id: &str) -> TaskResult<Task> {
        self.update(
            owner_id,
            task_id,
            TaskUpdate {
                status: Some(TaskStatus::Completed.as_str().to_string()),
                ..Default::default()
            },
        )
    }

    /// Hard-delete a task.
    pub fn delete(&self, owner_id: &str, task_id: &str) -> TaskResult<()> {
        if !self.db.delete_task(owner_id, task_id)? {
            return Err(TaskError::task_not_found(task_id));
        }
        info!(task_id = %task_id, owner = %owner_id, "Task deleted");
        Ok(())
    }

    /// List an owner's tasks by ascending due instant.
    ///
    /// Listing first flips the owner's past-due tasks to OverDue, so the
    /// result never shows a stale Pending.
    pub fn list(&self, owner_id: &str) -> TaskResult<Vec<Task>> {
        let now = self.clock.now();
        let (flipped, tasks) = self.db.with_tx(|tx| {
            let flipped = mark_overdue_internal(tx, Some(owner_id), now)?;
            let tasks = list_tasks_internal(tx, owner_id)?;
            Ok((flipped, tasks))
        })?;

        if flipped > 0 {
            debug!(owner = %owner_id, flipped, "Marked tasks OverDue while listing");
        }
        Ok(tasks)
    }
}
