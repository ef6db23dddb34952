//! CLI command definitions for study-tasks
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::types::{NewTask, TaskUpdate};
use clap::{Args, Parser, Subcommand};

/// Study task tracker with a reminder sweeper
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the reminder sweeper and HTTP API until Ctrl-C (default)
    Serve(ServeArgs),

    /// Run a single sweep tick and print its report
    Sweep,

    /// Manage the user directory
    #[command(subcommand)]
    User(UserCommand),

    /// Create, inspect and edit tasks
    #[command(subcommand)]
    Task(TaskCommand),

    /// List in-app notifications for a user
    Notifications(NotificationsArgs),

    /// List reminders that exhausted their send attempts
    DeadLetters,
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// API port (overrides config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Run the sweeper without the HTTP API
    #[arg(long)]
    pub no_api: bool,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Add a user
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Explicit id (default: generated)
        #[arg(long)]
        id: Option<String>,
    },
    /// List all users
    List,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Create a task
    Create(CreateArgs),
    /// List an owner's tasks by due date
    List {
        #[arg(long)]
        owner: String,
    },
    /// Show one task
    Get {
        #[arg(long)]
        owner: String,
        id: String,
    },
    /// Edit a task; changing a date or time resets its reminders
    Update(UpdateArgs),
    /// Mark a task completed
    Complete {
        #[arg(long)]
        owner: String,
        id: String,
    },
    /// Delete a task
    Delete {
        #[arg(long)]
        owner: String,
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub owner: String,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub description: String,
    /// Start date, YYYY-MM-DD or RFC 3339
    #[arg(long)]
    pub start: String,
    /// Due date, YYYY-MM-DD or RFC 3339
    #[arg(long)]
    pub due: String,
    /// Due time of day, HH:MM (default 00:00)
    #[arg(long)]
    pub time: Option<String>,
    /// low, medium or high (default low)
    #[arg(long)]
    pub priority: Option<String>,
}

impl CreateArgs {
    pub fn to_new_task(&self) -> NewTask {
        NewTask {
            title: self.title.clone(),
            description: self.description.clone(),
            start_date: self.start.clone(),
            due_date: self.due.clone(),
            priority: self.priority.clone(),
            time_due: self.time.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[arg(long)]
    pub owner: String,
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub start: Option<String>,
    #[arg(long)]
    pub due: Option<String>,
    #[arg(long)]
    pub time: Option<String>,
    #[arg(long)]
    pub priority: Option<String>,
    /// pending, overdue or completed
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub completed: Option<bool>,
}

impl UpdateArgs {
    pub fn to_update(&self) -> TaskUpdate {
        TaskUpdate {
            title: self.title.clone(),
            description: self.description.clone(),
            start_date: self.start.clone(),
            due_date: self.due.clone(),
            time_due: self.time.clone(),
            priority: self.priority.clone(),
            status: self.status.clone(),
            is_completed: self.completed,
        }
    }
}

#[derive(Args, Debug)]
pub struct NotificationsArgs {
    #[arg(long)]
    pub user: String,
    /// Only unread notifications
    #[arg(long)]
    pub unread: bool,
    /// Mark this notification read instead of listing
    #[arg(long)]
    pub mark_read: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["study-tasks", "--log", "off"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log, "off");
    }

    #[test]
    fn update_flags_become_partial_update() {
        let cli = Cli::try_parse_from([
            "study-tasks",
            "task",
            "update",
            "--owner",
            "u1",
            "t1",
            "--due",
            "2025-02-01",
            "--completed",
            "false",
        ])
        .unwrap();
        let Some(Command::Task(TaskCommand::Update(args))) = cli.command else {
            panic!("expected task update");
        };
        let update = args.to_update();
        assert_eq!(update.due_date.as_deref(), Some("2025-02-01"));
        assert_eq!(update.is_completed, Some(false));
        assert!(update.title.is_none());
    }

    #[test]
    fn create_requires_dates() {
        let result = Cli::try_parse_from([
            "study-tasks",
            "task",
            "create",
            "--owner",
            "u1",
            "--title",
            "Essay",
            "--description",
            "Draft",
        ]);
        assert!(result.is_err());
    }
}
