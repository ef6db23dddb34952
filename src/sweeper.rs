//! Notification dispatch sweeper.
//!
//! Each tick reads every task once, evaluates the three reminder conditions
//! against the injected clock, sends through the configured [`Notifier`], and
//! then sets the matching idempotency flag with a conditional write. The write
//! only lands if the flag is still unset and the task has not been rescheduled
//! since the read, so a concurrent reschedule always wins.
//!
//! A store error abandons the tick; the next tick starts from a fresh read.
//! A send error is isolated to its task.

use crate::clock::{Clock, start_of_day};
use crate::config::{SendFailurePolicy, SweeperConfig};
use crate::db::Database;
use crate::error::TaskResult;
use crate::notify::{Notifier, NotifyError, OutboundMessage};
use crate::types::{ReminderKind, Task};
use chrono::{Duration as CivilDuration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Windows and failure handling for one sweeper.
#[derive(Debug, Clone)]
pub struct SweepSettings {
    pub starting_soon_window: CivilDuration,
    pub due_soon_window: CivilDuration,
    pub send_timeout: Duration,
    pub on_send_failure: SendFailurePolicy,
    pub max_send_attempts: u32,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self::from(&SweeperConfig::default())
    }
}

impl From<&SweeperConfig> for SweepSettings {
    fn from(config: &SweeperConfig) -> Self {
        Self {
            starting_soon_window: config.starting_soon_window(),
            due_soon_window: config.due_soon_window(),
            send_timeout: config.send_timeout(),
            on_send_failure: config.on_send_failure,
            max_send_attempts: config.max_send_attempts,
        }
    }
}

/// Whether `task` currently owes the `kind` reminder.
///
/// Completed tasks owe nothing.
pub fn reminder_due(
    kind: ReminderKind,
    task: &Task,
    now: NaiveDateTime,
    settings: &SweepSettings,
) -> bool {
    if task.reminder_sent(kind) || task.is_done() {
        return false;
    }

    // A window that runs past the calendar's end never matches.
    match kind {
        ReminderKind::StartingSoon => {
            let start = task.start_instant();
            now.checked_add_signed(settings.starting_soon_window)
                .is_some_and(|horizon| now < start && start <= horizon)
        }
        ReminderKind::PastDue => task.due_instant() < now,
        ReminderKind::DueSoon => {
            let due = task.due_instant();
            start_of_day(now.date())
                .checked_add_signed(CivilDuration::days(1))
                .and_then(|open| Some((open, open.checked_add_signed(settings.due_soon_window)?)))
                .is_some_and(|(open, close)| open <= due && due < close)
        }
    }
}

/// Outcome counters for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Civil "now" the tick evaluated against.
    pub now: Option<NaiveDateTime>,
    pub overdue_marked: usize,
    pub starting_soon_sent: usize,
    pub past_due_sent: usize,
    pub due_soon_sent: usize,
    pub send_failures: usize,
    /// Reminders whose owner had no contact address.
    pub skipped: usize,
    pub dead_lettered: usize,
    /// Flag writes that lost to a reschedule, deletion, or an overlapping tick.
    pub superseded: usize,
}

impl SweepReport {
    pub fn sent(&self, kind: ReminderKind) -> usize {
        match kind {
            ReminderKind::StartingSoon => self.starting_soon_sent,
            ReminderKind::PastDue => self.past_due_sent,
            ReminderKind::DueSoon => self.due_soon_sent,
        }
    }

    pub fn total_sent(&self) -> usize {
        self.starting_soon_sent + self.past_due_sent + self.due_soon_sent
    }

    fn record_sent(&mut self, kind: ReminderKind) {
        match kind {
            ReminderKind::StartingSoon => self.starting_soon_sent += 1,
            ReminderKind::PastDue => self.past_due_sent += 1,
            ReminderKind::DueSoon => self.due_soon_sent += 1,
        }
    }
}

/// Periodic reminder dispatcher over the shared task store.
#[derive(Clone)]
pub struct Sweeper {
    db: Database,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    settings: SweepSettings,
}

impl Sweeper {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        settings: SweepSettings,
    ) -> Self {
        Self {
            db,
            clock,
            notifier,
            settings,
        }
    }

    /// Run one sweep tick.
    ///
    /// Returns an error only for store failures, which abandon the tick.
    pub async fn tick(&self) -> TaskResult<SweepReport> {
        let now = self.clock.now();
        let mut report = SweepReport {
            now: Some(now),
            ..Default::default()
        };

        report.overdue_marked = self.db.mark_all_overdue(now)?;
        let tasks = self.db.all_tasks()?;

        for kind in ReminderKind::ALL {
            for task in tasks
                .iter()
                .filter(|t| reminder_due(kind, t, now, &self.settings))
            {
                self.dispatch(kind, task, &mut report).await?;
            }
        }

        Ok(report)
    }

    /// Send one reminder and settle its flag.
    async fn dispatch(
        &self,
        kind: ReminderKind,
        task: &Task,
        report: &mut SweepReport,
    ) -> TaskResult<()> {
        let outcome = match self.db.contact_address(&task.owner_id)? {
            Some(address) => {
                let message = OutboundMessage::reminder(kind, task, address);
                self.send_bounded(&message).await
            }
            None => Err(NotifyError::NoAddress(task.owner_id.clone())),
        };

        let settle = match outcome {
            Ok(()) => {
                report.record_sent(kind);
                true
            }
            Err(err @ NotifyError::NoAddress(_)) => {
                report.skipped += 1;
                warn!(task_id = %task.id, owner = %task.owner_id, kind = %kind, "Reminder skipped, owner has no address");
                self.after_failure(kind, task, &err, report)?
            }
            Err(err) => {
                report.send_failures += 1;
                warn!(
                    task_id = %task.id,
                    owner = %task.owner_id,
                    kind = %kind,
                    notifier = self.notifier.name(),
                    error = %err,
                    "Reminder send failed"
                );
                self.after_failure(kind, task, &err, report)?
            }
        };

        if settle
            && !self
                .db
                .set_reminder_flag(&task.id, kind, task.schedule_epoch)?
        {
            report.superseded += 1;
            debug!(task_id = %task.id, kind = %kind, "Reminder flag write superseded");
        }
        Ok(())
    }

    async fn send_bounded(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        match tokio::time::timeout(self.settings.send_timeout, self.notifier.send(message)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(self.settings.send_timeout)),
        }
    }

    /// Decide whether a failed reminder's flag gets set anyway.
    fn after_failure(
        &self,
        kind: ReminderKind,
        task: &Task,
        err: &NotifyError,
        report: &mut SweepReport,
    ) -> TaskResult<bool> {
        match self.settings.on_send_failure {
            SendFailurePolicy::MarkSent => Ok(true),
            SendFailurePolicy::Retry => {
                // Deleted mid-send: nothing left to retry or record.
                if !self.db.task_exists(&task.id)? {
                    report.superseded += 1;
                    debug!(task_id = %task.id, kind = %kind, "Task deleted during send, failure not recorded");
                    return Ok(false);
                }
                let attempts =
                    self.db
                        .record_send_failure(&task.id, kind, task.schedule_epoch, &err.to_string())?;
                if attempts >= i64::from(self.settings.max_send_attempts) {
                    self.db
                        .mark_dead_lettered(&task.id, kind, task.schedule_epoch)?;
                    report.dead_lettered += 1;
                    warn!(task_id = %task.id, kind = %kind, attempts, "Reminder dead-lettered");
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Run a tick, logging instead of propagating failures.
    pub async fn run_tick(&self) -> Option<SweepReport> {
        match self.tick().await {
            Ok(report) => {
                if report.total_sent() > 0
                    || report.send_failures > 0
                    || report.skipped > 0
                    || report.overdue_marked > 0
                {
                    info!(
                        overdue = report.overdue_marked,
                        starting_soon = report.starting_soon_sent,
                        past_due = report.past_due_sent,
                        due_soon = report.due_soon_sent,
                        failures = report.send_failures,
                        skipped = report.skipped,
                        "Sweep tick complete"
                    );
                } else {
                    debug!("Sweep tick complete, nothing to send");
                }
                Some(report)
            }
            Err(e) => {
                error!(code = e.code.as_str(), error = %e, "Sweep tick abandoned");
                None
            }
        }
    }

    /// Start ticking every `interval` until the handle is shut down.
    ///
    /// The first tick fires immediately. Ticks never overlap: a slow tick
    /// delays the next one and missed ticks are skipped, not bunched up.
    pub fn spawn(self, interval: Duration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let (report_tx, report_rx) = watch::channel::<Option<SweepReport>>(None);

        let join = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs_f64(), notifier = self.notifier.name(), "Sweeper started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!("Sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Some(report) = self.run_tick().await {
                            let _ = report_tx.send(Some(report));
                        }
                    }
                }
            }
        });

        SweeperHandle {
            shutdown_tx: Some(shutdown_tx),
            reports: report_rx,
            join,
        }
    }
}

/// Handle for a running sweeper loop.
pub struct SweeperHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    reports: watch::Receiver<Option<SweepReport>>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Report of the most recent successful tick.
    pub fn latest_report(&self) -> Option<SweepReport> {
        self.reports.borrow().clone()
    }

    /// Subscribe to tick reports.
    pub fn subscribe(&self) -> watch::Receiver<Option<SweepReport>> {
        self.reports.clone()
    }

    /// Stop the loop and wait for the in-flight tick to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.join.await {
            error!("Sweeper task failed: {}", e);
        }
    }
}
