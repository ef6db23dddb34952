//! Outbound notification boundary.
//!
//! The sweeper renders an [`OutboundMessage`] per matching task and hands it
//! to a [`Notifier`]. Transports:
//! - [`LogNotifier`]: writes the message to the log only
//! - [`InAppNotifier`]: appends to the in-app notification records
//! - [`WebhookNotifier`]: POSTs JSON to an HTTP endpoint

mod in_app;
mod log;
mod webhook;

pub use in_app::InAppNotifier;
pub use log::LogNotifier;
pub use webhook::WebhookNotifier;

use crate::clock::{DATE_FORMAT, TIME_FORMAT};
use crate::config::{NotifierConfig, NotifierKind};
use crate::db::Database;
use crate::error::TaskError;
use crate::types::{ReminderKind, Task};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a send did not go through.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rejected by receiver: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("no contact address for user {0}")]
    NoAddress(String),
}

impl From<NotifyError> for TaskError {
    fn from(err: NotifyError) -> Self {
        TaskError::notify_send(&err)
    }
}

/// A rendered reminder addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub to: String,
    pub user_id: String,
    pub task_id: String,
    pub kind: ReminderKind,
    pub subject: String,
    pub body: String,
}

impl OutboundMessage {
    /// Render the reminder template for `kind`.
    pub fn reminder(kind: ReminderKind, task: &Task, to: impl Into<String>) -> Self {
        let due_date = task.due_date.format(DATE_FORMAT);
        let due_time = task.time_due.format(TIME_FORMAT);
        let (subject, body) = match kind {
            ReminderKind::StartingSoon => (
                format!("Task starting soon: {}", task.title),
                format!(
                    "Your task \"{}\" starts on {}. It is due {} at {}.",
                    task.title,
                    task.start_date.format(DATE_FORMAT),
                    due_date,
                    due_time
                ),
            ),
            ReminderKind::PastDue => (
                format!("Task past due: {}", task.title),
                format!(
                    "Your task \"{}\" was due {} at {} and is not completed yet.",
                    task.title, due_date, due_time
                ),
            ),
            ReminderKind::DueSoon => (
                format!("Task due soon: {}", task.title),
                format!(
                    "Your task \"{}\" is due {} at {}.",
                    task.title, due_date, due_time
                ),
            ),
        };

        Self {
            to: to.into(),
            user_id: task.owner_id.clone(),
            task_id: task.id.clone(),
            kind,
            subject,
            body,
        }
    }
}

/// An external transport for reminders.
///
/// Implementations need not bound their own latency; the sweeper wraps
/// every call in a timeout.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short transport name for logs.
    fn name(&self) -> &'static str;

    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError>;
}

/// Build the configured transport.
pub fn build_notifier(config: &NotifierConfig, db: &Database) -> Result<Arc<dyn Notifier>> {
    let notifier: Arc<dyn Notifier> = match config.kind {
        NotifierKind::Log => Arc::new(LogNotifier),
        NotifierKind::InApp => Arc::new(InAppNotifier::new(db.clone())),
        NotifierKind::Webhook => {
            let url = config
                .webhook_url
                .as_deref()
                .ok_or_else(|| anyhow!("notifier.webhook_url is required for the webhook notifier"))?;
            Arc::new(WebhookNotifier::new(url)?)
        }
    };
    Ok(notifier)
}
