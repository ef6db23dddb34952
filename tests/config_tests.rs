//! Integration tests for tiered configuration loading.

use std::fs;
use std::path::Path;
use study_tasks::config::{
    Config, ConfigLoader, ConfigPaths, ConfigTier, NotifierKind, SendFailurePolicy,
};
use tempfile::TempDir;

fn write_config(dir: &Path, yaml: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("config.yaml"), yaml).unwrap();
}

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn defaults_when_no_files_exist() {
    let tmp = TempDir::new().unwrap();
    let paths = ConfigPaths {
        project_dir: Some(tmp.path().join("project")),
        user_dir: Some(tmp.path().join("user")),
        explicit_file: None,
    };

    let loader = ConfigLoader::load_with(paths, no_env).unwrap();
    assert_eq!(loader.config(), &Config::default());
    assert!(loader.sources().is_empty());
}

#[test]
fn later_tiers_override_field_by_field() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("project");
    let user = tmp.path().join("user");
    write_config(
        &project,
        "sweeper:\n  interval_secs: 30\n  due_soon_window_days: 3\nnotifier:\n  kind: log\n",
    );
    write_config(&user, "sweeper:\n  interval_secs: 15\n");

    let explicit = tmp.path().join("explicit.yaml");
    fs::write(
        &explicit,
        "clock:\n  utc_offset: \"-05:00\"\nsweeper:\n  on_send_failure: retry\n",
    )
    .unwrap();

    let paths = ConfigPaths {
        project_dir: Some(project),
        user_dir: Some(user),
        explicit_file: None,
    }
    .with_explicit_file(&explicit);

    let loader = ConfigLoader::load_with(paths, no_env).unwrap();
    let config = loader.config();
    assert_eq!(config.sweeper.interval_secs, 15);
    assert_eq!(config.sweeper.due_soon_window_days, 3);
    assert_eq!(config.sweeper.on_send_failure, SendFailurePolicy::Retry);
    assert_eq!(config.notifier.kind, NotifierKind::Log);
    assert_eq!(config.clock.offset().unwrap().local_minus_utc(), -5 * 3600);

    let tiers: Vec<ConfigTier> = loader.sources().iter().map(|(tier, _)| *tier).collect();
    assert_eq!(
        tiers,
        vec![ConfigTier::Project, ConfigTier::User, ConfigTier::Explicit]
    );
}

#[test]
fn environment_beats_files() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("project");
    write_config(
        &project,
        "server:\n  db_path: from-file.db\nclock:\n  utc_offset: \"+01:00\"\n",
    );

    let paths = ConfigPaths {
        project_dir: Some(project),
        user_dir: None,
        explicit_file: None,
    };
    let loader = ConfigLoader::load_with(paths, |key| match key {
        "STUDY_TASKS_DB_PATH" => Some("from-env.db".to_string()),
        "STUDY_TASKS_WEBHOOK_URL" => Some("https://relay.example.edu/hook".to_string()),
        _ => None,
    })
    .unwrap();

    let config = loader.into_config();
    assert_eq!(config.server.db_path, Path::new("from-env.db"));
    assert_eq!(config.clock.utc_offset, "+01:00");
    assert_eq!(
        config.notifier.webhook_url.as_deref(),
        Some("https://relay.example.edu/hook")
    );
}

#[test]
fn missing_explicit_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let paths = ConfigPaths::default().with_explicit_file(tmp.path().join("absent.yaml"));
    assert!(ConfigLoader::load_with(paths, no_env).is_err());
}

#[test]
fn malformed_yaml_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("project");
    write_config(&project, "sweeper:\n  interval_secs: [not, a, number]\n");

    let paths = ConfigPaths {
        project_dir: Some(project),
        user_dir: None,
        explicit_file: None,
    };
    assert!(ConfigLoader::load_with(paths, no_env).is_err());
}

#[test]
fn empty_file_loads_defaults() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("config.yaml");
    fs::write(&file, "# nothing configured yet\n").unwrap();

    let config = Config::load(&file).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn ensure_db_dir_creates_parent() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.server.db_path = tmp.path().join("data").join("tasks.db");

    config.ensure_db_dir().unwrap();
    assert!(tmp.path().join("data").is_dir());
}
