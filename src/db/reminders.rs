//! Ledger of failed reminder sends, used when the sweeper retries instead of
//! marking a failed reminder as sent.

use super::{Database, now_ms};
use crate::types::ReminderKind;
use anyhow::Result;
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};

/// A reminder that exhausted its send attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub task_id: String,
    pub kind: ReminderKind,
    pub schedule_epoch: i64,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub updated_at: i64,
}

impl Database {
    /// Count one more failed attempt. Returns the attempt total for this epoch.
    pub fn record_send_failure(
        &self,
        task_id: &str,
        kind: ReminderKind,
        schedule_epoch: i64,
        error: &str,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reminder_failures (task_id, kind, schedule_epoch, attempts, last_error, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4, ?5)
                 ON CONFLICT(task_id, kind, schedule_epoch)
                 DO UPDATE SET attempts = attempts + 1, last_error = excluded.last_error,
                               updated_at = excluded.updated_at",
                params![task_id, kind.as_str(), schedule_epoch, error, now_ms()],
            )?;
            let attempts = conn.query_row(
                "SELECT attempts FROM reminder_failures
                 WHERE task_id = ?1 AND kind = ?2 AND schedule_epoch = ?3",
                params![task_id, kind.as_str(), schedule_epoch],
                |row| row.get(0),
            )?;
            Ok(attempts)
        })
    }

    /// Attempts recorded so far for a reminder in a given epoch.
    pub fn send_attempts(&self, task_id: &str, kind: ReminderKind, schedule_epoch: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let attempts: Option<i64> = conn
                .query_row(
                    "SELECT attempts FROM reminder_failures
                     WHERE task_id = ?1 AND kind = ?2 AND schedule_epoch = ?3",
                    params![task_id, kind.as_str(), schedule_epoch],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(attempts.unwrap_or(0))
        })
    }

    pub fn mark_dead_lettered(&self, task_id: &str, kind: ReminderKind, schedule_epoch: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE reminder_failures SET dead_lettered = 1, updated_at = ?4
                 WHERE task_id = ?1 AND kind = ?2 AND schedule_epoch = ?3",
                params![task_id, kind.as_str(), schedule_epoch, now_ms()],
            )?;
            Ok(())
        })
    }

    pub fn list_dead_letters(&self) -> Result<Vec<DeadLetter>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT task_id, kind, schedule_epoch, attempts, last_error, updated_at
                 FROM reminder_failures WHERE dead_lettered = 1
                 ORDER BY updated_at DESC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let kind: String = row.get(1)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        kind,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(rows
                .into_iter()
                .filter_map(|(task_id, kind, schedule_epoch, attempts, last_error, updated_at)| {
                    Some(DeadLetter {
                        task_id,
                        kind: ReminderKind::from_str(&kind)?,
                        schedule_epoch,
                        attempts,
                        last_error,
                        updated_at,
                    })
                })
                .collect())
        })
    }
}
