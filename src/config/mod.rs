//! Configuration system.
//!
//! Tiers, lowest to highest precedence:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `$CWD/study-tasks/config.yaml`
//! 3. **User** - `~/.study-tasks/config.yaml`
//! 4. **Explicit** - `--config` or `STUDY_TASKS_CONFIG_PATH`
//! 5. **Environment** - individual overrides
//!
//! ## Environment Variables
//! - `STUDY_TASKS_CONFIG_PATH` - Explicit config file
//! - `STUDY_TASKS_DB_PATH` - Database path
//! - `STUDY_TASKS_UTC_OFFSET` - Fixed civil zone, e.g. `+05:30`
//! - `STUDY_TASKS_SWEEP_INTERVAL_SECS` - Sweeper cadence
//! - `STUDY_TASKS_WEBHOOK_URL` - Webhook notifier target
//! - `STUDY_TASKS_USER_DIR` - User config dir (default: `~/.study-tasks`)
//! - `STUDY_TASKS_PROJECT_DIR` - Project config dir (default: `./study-tasks`)

mod loader;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use types::*;
