use super::{Notifier, NotifyError, OutboundMessage};
use crate::db::Database;
use async_trait::async_trait;

/// Delivers reminders into the user's in-app notification list.
#[derive(Clone)]
pub struct InAppNotifier {
    db: Database,
}

impl InAppNotifier {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Notifier for InAppNotifier {
    fn name(&self) -> &'static str {
        "in_app"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        self.db
            .append_notification(
                &message.user_id,
                Some(&message.task_id),
                message.kind.as_str(),
                &message.subject,
                &message.body,
            )
            .map(|_| ())
            .map_err(|e| NotifyError::Transport(format!("{:#}", e)))
    }
}
