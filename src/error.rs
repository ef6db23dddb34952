//! Structured error types for lifecycle operations.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Caller errors, never retried
    ValidationError,
    InvalidPriority,
    NotFound,

    // Store read/write failures
    TransientStoreError,

    // Outbound send failures, isolated per task by the sweeper
    NotifySendError,

    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::InvalidPriority => "INVALID_PRIORITY",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::TransientStoreError => "TRANSIENT_STORE_ERROR",
            ErrorCode::NotifySendError => "NOTIFY_SEND_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// Structured error returned by the lifecycle manager.
#[derive(Debug, Serialize)]
pub struct TaskError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl TaskError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorCode::ValidationError, format!("{} is required", field)).with_field(field)
    }

    pub fn validation(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::ValidationError, reason).with_field(field)
    }

    pub fn invalid_priority(value: &str) -> Self {
        Self::new(
            ErrorCode::InvalidPriority,
            format!("Invalid priority '{}': expected low, medium or high", value),
        )
        .with_field("priority")
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("Task not found: {}", task_id))
    }

    pub fn store(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::TransientStoreError, err.to_string())
    }

    pub fn notify_send(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::NotifySendError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TaskError {}

// The store layer speaks anyhow; anything it raises that is not already a
// TaskError is a failed read or write.
impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<TaskError>() {
            Ok(task_err) => task_err,
            Err(err) => TaskError::store(format!("{:#}", err)),
        }
    }
}

impl From<rusqlite::Error> for TaskError {
    fn from(err: rusqlite::Error) -> Self {
        TaskError::store(err)
    }
}

/// Result type for lifecycle operations.
pub type TaskResult<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_screaming_snake_codes() {
        let err = TaskError::invalid_priority("urgent");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INVALID_PRIORITY");
        assert_eq!(json["field"], "priority");
        assert!(json.get("details").is_none());
        assert_eq!(ErrorCode::InvalidPriority.as_str(), "INVALID_PRIORITY");
    }

    #[test]
    fn anyhow_round_trips_task_errors() {
        let original = anyhow::Error::new(TaskError::task_not_found("abc"));
        let err: TaskError = original.into();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn other_anyhow_errors_become_store_errors() {
        let err: TaskError = anyhow::anyhow!("database is locked").into();
        assert_eq!(err.code, ErrorCode::TransientStoreError);
        assert!(err.message.contains("locked"));
    }
}
