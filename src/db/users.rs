//! User directory: the owners tasks belong to and their contact addresses.

use super::{Database, now_ms};
use crate::types::User;
use anyhow::{Result, anyhow};
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

impl Database {
    /// Register a user. If `id` is not provided, a UUID7 is generated.
    pub fn create_user(&self, id: Option<String>, name: &str, email: &str) -> Result<User> {
        let id = id.unwrap_or_else(|| Uuid::now_v7().to_string());
        if id.trim().is_empty() {
            return Err(anyhow!("User id must not be empty"));
        }
        if !email.contains('@') {
            return Err(anyhow!("Invalid email address: {}", email));
        }

        let user = User {
            id,
            name: name.to_string(),
            email: email.trim().to_string(),
            created_at: now_ms(),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user.id, user.name, user.email, user.created_at],
            )?;
            Ok(())
        })?;

        Ok(user)
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT id, name, email, created_at FROM users WHERE id = ?1",
                    params![user_id],
                    |row| {
                        Ok(User {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            email: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, email, created_at FROM users ORDER BY created_at")?;
            let users = stmt
                .query_map([], |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }

    /// Resolve an owner to the address reminders are sent to.
    pub fn contact_address(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self
            .get_user(user_id)?
            .map(|u| u.email)
            .filter(|email| !email.is_empty()))
    }
}
