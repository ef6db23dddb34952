//! Configuration types.

use crate::clock::parse_utc_offset;
use anyhow::{Result, anyhow, bail};
use chrono::{Duration as CivilDuration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub clock: ClockConfig,

    #[serde(default)]
    pub sweeper: SweeperConfig,

    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// Storage and HTTP surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            api: ApiConfig::default(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".study-tasks/tasks.db")
}

/// JSON API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_bind(),
            port: default_api_port(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    31995
}

/// The fixed zone all civil comparisons happen in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// UTC offset such as `+05:30`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
        }
    }
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

impl ClockConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.utc_offset).map_err(|e| anyhow!("clock.utc_offset: {}", e))
    }
}

/// What to do with the idempotency flag when a send fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendFailurePolicy {
    /// Set the flag anyway: a missed reminder, but never duplicate spam.
    #[default]
    MarkSent,
    /// Leave the flag unset so the next tick retries, up to `max_send_attempts`,
    /// then set it and dead-letter the reminder.
    Retry,
}

/// Notification sweeper settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Look-ahead for the starting-soon reminder.
    #[serde(default = "default_starting_soon_window_mins")]
    pub starting_soon_window_mins: i64,

    /// Length of the due-soon window, starting tomorrow at 00:00.
    #[serde(default = "default_due_soon_window_days")]
    pub due_soon_window_days: i64,

    /// Upper bound on a single send.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    #[serde(default)]
    pub on_send_failure: SendFailurePolicy,

    #[serde(default = "default_max_send_attempts")]
    pub max_send_attempts: u32,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
            starting_soon_window_mins: default_starting_soon_window_mins(),
            due_soon_window_days: default_due_soon_window_days(),
            send_timeout_secs: default_send_timeout_secs(),
            on_send_failure: SendFailurePolicy::default(),
            max_send_attempts: default_max_send_attempts(),
        }
    }
}

/// Longest accepted starting-soon look-ahead: one week.
pub const MAX_STARTING_SOON_WINDOW_MINS: i64 = 7 * 24 * 60;

/// Longest accepted due-soon window: one leap year.
pub const MAX_DUE_SOON_WINDOW_DAYS: i64 = 366;

fn default_interval_secs() -> u64 {
    60
}

fn default_starting_soon_window_mins() -> i64 {
    60
}

fn default_due_soon_window_days() -> i64 {
    7
}

fn default_send_timeout_secs() -> u64 {
    10
}

fn default_max_send_attempts() -> u32 {
    3
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn starting_soon_window(&self) -> CivilDuration {
        CivilDuration::minutes(
            self.starting_soon_window_mins
                .clamp(0, MAX_STARTING_SOON_WINDOW_MINS),
        )
    }

    pub fn due_soon_window(&self) -> CivilDuration {
        CivilDuration::days(self.due_soon_window_days.clamp(0, MAX_DUE_SOON_WINDOW_DAYS))
    }
}

/// Which transport delivers reminders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierKind {
    Log,
    #[default]
    InApp,
    Webhook,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub kind: NotifierKind,

    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Config {
    /// Load configuration from a single YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Empty or comment-only files parse as null
        let config: Option<Config> = serde_yaml::from_str(&content)?;
        Ok(config.unwrap_or_default())
    }

    /// Reject values that would only fail later, at runtime.
    pub fn validate(&self) -> Result<()> {
        self.clock.offset()?;

        if self.sweeper.interval_secs == 0 {
            bail!("sweeper.interval_secs must be greater than zero");
        }
        if self.sweeper.send_timeout_secs == 0 {
            bail!("sweeper.send_timeout_secs must be greater than zero");
        }
        if !(1..=MAX_STARTING_SOON_WINDOW_MINS).contains(&self.sweeper.starting_soon_window_mins) {
            bail!(
                "sweeper.starting_soon_window_mins must be between 1 and {}",
                MAX_STARTING_SOON_WINDOW_MINS
            );
        }
        if !(1..=MAX_DUE_SOON_WINDOW_DAYS).contains(&self.sweeper.due_soon_window_days) {
            bail!(
                "sweeper.due_soon_window_days must be between 1 and {}",
                MAX_DUE_SOON_WINDOW_DAYS
            );
        }
        if self.sweeper.on_send_failure == SendFailurePolicy::Retry
            && self.sweeper.max_send_attempts == 0
        {
            bail!("sweeper.max_send_attempts must be at least 1 with on_send_failure: retry");
        }
        if self.notifier.kind == NotifierKind::Webhook && self.notifier.webhook_url.is_none() {
            bail!("notifier.webhook_url is required when notifier.kind is webhook");
        }
        Ok(())
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
