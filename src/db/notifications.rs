//! In-app notification records.

use super::{Database, now_ms};
use crate::types::Notification;
use anyhow::Result;
use rusqlite::params;

impl Database {
    /// Append a notification for a user. Returns the stored record.
    pub fn append_notification(
        &self,
        user_id: &str,
        task_id: Option<&str>,
        kind: &str,
        subject: &str,
        body: &str,
    ) -> Result<Notification> {
        let created_at = now_ms();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (user_id, task_id, kind, subject, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![user_id, task_id, kind, subject, body, created_at],
            )?;
            Ok(Notification {
                id: conn.last_insert_rowid(),
                user_id: user_id.to_string(),
                task_id: task_id.map(String::from),
                kind: kind.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
                is_read: false,
                created_at,
            })
        })
    }

    /// Notifications for a user, newest first.
    pub fn list_notifications(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, task_id, kind, subject, body, is_read, created_at
                 FROM notifications
                 WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)
                 ORDER BY created_at DESC, id DESC",
            )?;
            let records = stmt
                .query_map(params![user_id, unread_only], |row| {
                    Ok(Notification {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        task_id: row.get(2)?,
                        kind: row.get(3)?,
                        subject: row.get(4)?,
                        body: row.get(5)?,
                        is_read: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }

    /// Mark a notification read. Returns false if it does not belong to the user.
    pub fn mark_notification_read(&self, user_id: &str, notification_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
                params![notification_id, user_id],
            )?;
            Ok(changed > 0)
        })
    }
}
