//! study-tasks
//!
//! Student task tracker: a lifecycle manager behind a CLI and JSON API, plus a
//! periodic sweeper that sends starting-soon, past-due and due-soon reminders.

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use study_tasks::api;
use study_tasks::cli::{Cli, Command, NotificationsArgs, ServeArgs, TaskCommand, UserCommand};
use study_tasks::clock::SystemClock;
use study_tasks::config::{Config, ConfigLoader, ConfigPaths};
use study_tasks::db::Database;
use study_tasks::lifecycle::TaskManager;
use study_tasks::logging::{LogTarget, init_logging};
use study_tasks::notify::{Notifier, build_notifier};
use study_tasks::sweeper::{SweepSettings, Sweeper};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut paths = ConfigPaths::discover();
    if let Some(config_path) = &cli.config {
        paths = paths.with_explicit_file(config_path);
    }
    let mut loader = ConfigLoader::load_with(paths, |key| std::env::var(key).ok())?;
    for (tier, path) in loader.sources() {
        debug!(tier = %tier, path = %path.display(), "Loaded config");
    }

    // CLI flags are the highest tier
    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.into();
    }
    if let Some(Command::Serve(args)) = &cli.command
        && let Some(port) = args.port
    {
        config.server.api.port = port;
    }

    let config = loader.into_config();
    config.validate()?;
    config.ensure_db_dir()?;

    let db = Database::open(&config.server.db_path)?;
    let clock = Arc::new(SystemClock::new(config.clock.offset()?));
    let manager = TaskManager::new(db.clone(), clock);
    let notifier = build_notifier(&config.notifier, &db)?;

    match cli.command {
        Some(Command::Serve(args)) => run_serve(config, manager, notifier, args).await?,
        None => run_serve(config, manager, notifier, ServeArgs::default()).await?,
        Some(Command::Sweep) => {
            let sweeper = build_sweeper(&config, &manager, notifier);
            let report = sweeper.tick().await?;
            print_json(&report)?;
        }
        Some(Command::User(cmd)) => run_user(&db, cmd)?,
        Some(Command::Task(cmd)) => run_task(&manager, cmd)?,
        Some(Command::Notifications(args)) => run_notifications(&db, args)?,
        Some(Command::DeadLetters) => print_json(&db.list_dead_letters()?)?,
    }

    Ok(())
}

fn build_sweeper(config: &Config, manager: &TaskManager, notifier: Arc<dyn Notifier>) -> Sweeper {
    Sweeper::new(
        manager.db().clone(),
        Arc::clone(manager.clock()),
        notifier,
        SweepSettings::from(&config.sweeper),
    )
}

/// Run the sweeper loop and the API until Ctrl-C.
async fn run_serve(
    config: Config,
    manager: TaskManager,
    notifier: Arc<dyn Notifier>,
    args: ServeArgs,
) -> Result<()> {
    info!("Starting study-tasks v{}", env!("CARGO_PKG_VERSION"));
    info!("Database: {:?}", config.server.db_path);
    info!("Civil zone: UTC{}", manager.clock().offset());

    let sweeper = if config.sweeper.enabled {
        let sweeper = build_sweeper(&config, &manager, notifier);
        Some(sweeper.spawn(config.sweeper.interval()))
    } else {
        info!("Sweeper disabled (sweeper.enabled = false)");
        None
    };

    let api = if config.server.api.enabled && !args.no_api {
        Some(api::start_server(manager, &config.server.api.bind, config.server.api.port).await?)
    } else {
        info!("HTTP API disabled");
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    if let Some(api) = api {
        api.shutdown();
    }
    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await;
    }
    Ok(())
}

fn run_user(db: &Database, cmd: UserCommand) -> Result<()> {
    match cmd {
        UserCommand::Add { name, email, id } => print_json(&db.create_user(id, &name, &email)?),
        UserCommand::List => print_json(&db.list_users()?),
    }
}

fn run_task(manager: &TaskManager, cmd: TaskCommand) -> Result<()> {
    match cmd {
        TaskCommand::Create(args) => {
            print_json(&manager.create(&args.owner, args.to_new_task())?)
        }
        TaskCommand::List { owner } => print_json(&manager.list(&owner)?),
        TaskCommand::Get { owner, id } => print_json(&manager.get(&owner, &id)?),
        TaskCommand::Update(args) => {
            print_json(&manager.update(&args.owner, &args.id, args.to_update())?)
        }
        TaskCommand::Complete { owner, id } => print_json(&manager.complete(&owner, &id)?),
        TaskCommand::Delete { owner, id } => {
            manager.delete(&owner, &id)?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
    }
}

fn run_notifications(db: &Database, args: NotificationsArgs) -> Result<()> {
    if let Some(id) = args.mark_read {
        let marked = db.mark_notification_read(&args.user, id)?;
        return print_json(&serde_json::json!({ "id": id, "marked_read": marked }));
    }
    print_json(&db.list_notifications(&args.user, args.unread)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
