//! Core types for the task lifecycle engine.

use crate::clock;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task priority. Input is case-insensitive; stored and reported lower-case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Parse a priority string; `None` for anything outside {low, medium, high}.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task status.
///
/// `Pending` is initial. `OverDue` is derived from the clock. `Completed` is
/// only ever reached by an explicit caller action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Pending,
    OverDue,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::OverDue => "OverDue",
            TaskStatus::Completed => "Completed",
        }
    }

    /// Parse a caller-supplied status, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['_', '-', ' '], "").as_str() {
            "pending" => Some(TaskStatus::Pending),
            "overdue" => Some(TaskStatus::OverDue),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }

    /// Statuses the caller cannot overwrite except by completing the task.
    pub fn is_sticky(&self) -> bool {
        matches!(self, TaskStatus::OverDue | TaskStatus::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three independent reminders the sweeper dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// Start is within the next window (default one hour).
    StartingSoon,
    /// Due instant has passed.
    PastDue,
    /// Due instant falls between tomorrow 00:00 and a week later.
    DueSoon,
}

impl ReminderKind {
    /// Evaluation order within a sweep tick.
    pub const ALL: [ReminderKind; 3] = [
        ReminderKind::StartingSoon,
        ReminderKind::PastDue,
        ReminderKind::DueSoon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::StartingSoon => "starting_soon",
            ReminderKind::PastDue => "past_due",
            ReminderKind::DueSoon => "due_soon",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "starting_soon" => Some(ReminderKind::StartingSoon),
            "past_due" => Some(ReminderKind::PastDue),
            "due_soon" => Some(ReminderKind::DueSoon),
            _ => None,
        }
    }

    /// Column holding this reminder's idempotency flag.
    pub fn flag_column(&self) -> &'static str {
        match self {
            ReminderKind::StartingSoon => "is_notified",
            ReminderKind::PastDue => "is_past_due_notified",
            ReminderKind::DueSoon => "is_one_day_before_notified",
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-owned task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time_due: NaiveTime,
    pub priority: Priority,
    pub status: TaskStatus,
    pub is_completed: bool,

    // Idempotency flags, one per reminder kind
    pub is_notified: bool,
    pub is_past_due_notified: bool,
    pub is_one_day_before_notified: bool,

    /// Incremented by every reschedule; guards the sweeper's flag writes.
    pub schedule_epoch: i64,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// The exact instant formed by `due_date` and `time_due`.
    pub fn due_instant(&self) -> NaiveDateTime {
        clock::due_instant(self.due_date, self.time_due)
    }

    /// Start instant: midnight of `start_date`.
    pub fn start_instant(&self) -> NaiveDateTime {
        clock::start_of_day(self.start_date)
    }

    pub fn reminder_sent(&self, kind: ReminderKind) -> bool {
        match kind {
            ReminderKind::StartingSoon => self.is_notified,
            ReminderKind::PastDue => self.is_past_due_notified,
            ReminderKind::DueSoon => self.is_one_day_before_notified,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Completed || self.is_completed
    }
}

/// Raw input for creating a task. Dates are unparsed caller strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub due_date: String,
    pub priority: Option<String>,
    pub time_due: Option<String>,
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub time_due: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub is_completed: Option<bool>,
}

/// A user from the directory the sweeper resolves addresses against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: i64,
}

/// An in-app notification record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub task_id: Option<String>,
    pub kind: String,
    pub subject: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: i64,
}

/// `HH:MM` serde representation for times of day.
pub mod hhmm {
    use crate::clock::{TIME_FORMAT, parse_time_of_day};
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_time_of_day(&s).map_err(serde::de::Error::custom)
    }
}
