use super::{Notifier, NotifyError, OutboundMessage};
use async_trait::async_trait;
use tracing::info;

/// Transport that only logs. Useful for dry runs and local development.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        info!(
            to = %message.to,
            task_id = %message.task_id,
            kind = %message.kind,
            subject = %message.subject,
            "Reminder"
        );
        Ok(())
    }
}
