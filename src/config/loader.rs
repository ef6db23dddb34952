//! Tiered configuration loading.
//!
//! Tiers are merged field by field as JSON values, later tiers winning.
//! Arrays and scalars replace; objects merge recursively; an explicit `null`
//! leaves the lower tier's value in place.

use super::types::Config;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_FILE: &str = "config.yaml";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    Project = 1,
    User = 2,
    Explicit = 3,
    Environment = 4,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Explicit => write!(f, "explicit"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Where each file-backed tier lives.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Project config directory (`./study-tasks` by default).
    pub project_dir: Option<PathBuf>,
    /// User config directory (`~/.study-tasks` by default).
    pub user_dir: Option<PathBuf>,
    /// An explicit config file, from `--config` or `STUDY_TASKS_CONFIG_PATH`.
    pub explicit_file: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover tier locations from the environment and home directory.
    pub fn discover() -> Self {
        let user_dir = std::env::var("STUDY_TASKS_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".study-tasks")));

        let project_dir = std::env::var("STUDY_TASKS_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("study-tasks")));

        let explicit_file = std::env::var("STUDY_TASKS_CONFIG_PATH").ok().map(PathBuf::from);

        Self {
            project_dir,
            user_dir,
            explicit_file,
        }
    }

    pub fn with_explicit_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_file = Some(path.into());
        self
    }
}

/// Loads and merges configuration tiers.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Files that contributed, lowest tier first.
    sources: Vec<(ConfigTier, PathBuf)>,
}

impl ConfigLoader {
    /// Load with explicit paths and an environment lookup.
    pub fn load_with<F>(paths: ConfigPaths, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut merged = serde_json::to_value(Config::default())?;
        let mut sources = Vec::new();

        let tiers = [
            (ConfigTier::Project, paths.project_dir.as_ref().map(|d| d.join(CONFIG_FILE))),
            (ConfigTier::User, paths.user_dir.as_ref().map(|d| d.join(CONFIG_FILE))),
            (ConfigTier::Explicit, paths.explicit_file.clone()),
        ];

        for (tier, file) in tiers {
            let Some(file) = file else { continue };
            // An explicit file must exist; tier directories are optional.
            if tier != ConfigTier::Explicit && !file.exists() {
                continue;
            }
            let overlay = read_yaml(&file)
                .with_context(|| format!("loading {} config {}", tier, file.display()))?;
            debug!(tier = %tier, path = %file.display(), "Merging config tier");
            merged = merge(merged, overlay);
            sources.push((tier, file));
        }

        let mut config: Config =
            serde_json::from_value(merged).context("invalid configuration")?;
        apply_env_overrides(&mut config, env)?;

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Files that contributed to the loaded configuration.
    pub fn sources(&self) -> &[(ConfigTier, PathBuf)] {
        &self.sources
    }
}

fn read_yaml(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    let value: Option<Value> = serde_yaml::from_str(&content)?;
    Ok(value.unwrap_or(Value::Null))
}

fn merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut fields), Value::Object(overrides)) => {
            for (key, value) in overrides {
                let merged = match fields.remove(&key) {
                    Some(existing) => merge(existing, value),
                    None => value,
                };
                fields.insert(key, merged);
            }
            Value::Object(fields)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

fn apply_env_overrides<F>(config: &mut Config, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(db_path) = env("STUDY_TASKS_DB_PATH") {
        config.server.db_path = PathBuf::from(db_path);
    }
    if let Some(offset) = env("STUDY_TASKS_UTC_OFFSET") {
        config.clock.utc_offset = offset;
    }
    if let Some(interval) = env("STUDY_TASKS_SWEEP_INTERVAL_SECS") {
        config.sweeper.interval_secs = interval
            .parse()
            .with_context(|| format!("STUDY_TASKS_SWEEP_INTERVAL_SECS: not a number: {}", interval))?;
    }
    if let Some(url) = env("STUDY_TASKS_WEBHOOK_URL") {
        config.notifier.webhook_url = Some(url);
    }
    Ok(())
}
