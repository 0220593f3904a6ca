//! sitelog - command-line client for daily construction labor logs.
//!
//! Field users record worker counts per shift for each work type and date;
//! administrators manage projects, users and labor unit costs.

mod app;
mod commands;
mod output;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sitelog_core::models::DailyEntry;
use sitelog_core::Config;

use app::App;

#[derive(Parser, Debug)]
#[command(name = "sitelog")]
#[command(about = "Log daily labor on construction projects")]
#[command(version)]
struct Cli {
    /// Backend base URL (default: config file, then SITELOG_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and remember the session
    Login {
        #[arg(short, long)]
        username: Option<String>,
        /// Do not store the password in the OS keychain
        #[arg(long)]
        no_remember: bool,
    },
    /// Sign out and forget the stored password
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List the projects you can access
    Projects,
    /// Show a project's work types and recent entries
    Project { name: String },
    /// Show totals and health for a project
    Summary {
        name: String,
        /// YYYY-MM-DD; the backend picks the latest date when omitted
        #[arg(short, long)]
        date: Option<String>,
    },
    /// List the dates that carry entries
    Dates {
        name: String,
        /// YYYY-MM
        #[arg(short, long)]
        month: Option<String>,
    },
    /// Save daily entries for a project
    Save {
        name: String,
        /// YYYY-MM-DD (default: today)
        #[arg(short, long)]
        date: Option<String>,
        /// WORK:day,night,midnight[,progress] - repeat per work type
        #[arg(short, long = "entry", value_parser = commands::parse_entry_arg, required = true)]
        entries: Vec<(String, DailyEntry)>,
    },
    /// Add a work type to a project
    AddWorkType {
        name: String,
        work_type: String,
        /// Add even if similar work types exist
        #[arg(long)]
        force: bool,
    },
    /// Administration commands
    #[command(subcommand)]
    Admin(AdminCommand),
    /// Check that the backend is reachable
    Health,
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// Overview of every project
    Dashboard,
    /// List user accounts
    Users,
    /// Create a user account
    CreateUser {
        username: String,
        #[arg(long)]
        admin: bool,
        /// Project the user may access - repeatable
        #[arg(short, long = "project")]
        projects: Vec<String>,
    },
    /// Set which projects a user may access
    AssignProjects {
        username: String,
        #[arg(short, long = "project")]
        projects: Vec<String>,
    },
    /// Delete a user account
    DeleteUser { username: String },
    /// Create a project
    CreateProject {
        name: String,
        /// Work type - repeatable
        #[arg(short, long = "work-type")]
        work_types: Vec<String>,
    },
    /// Mark a project active or inactive
    SetStatus {
        name: String,
        #[arg(value_parser = ["active", "inactive"])]
        status: String,
    },
    /// Delete a project and its entries
    DeleteProject { name: String },
    /// Per-shift unit costs by work type
    LaborCosts,
    /// Set per-shift unit costs for a work type
    SetLaborCost {
        work_type: String,
        #[arg(long, value_parser = commands::parse_amount)]
        day: i64,
        #[arg(long, value_parser = commands::parse_amount)]
        night: i64,
        #[arg(long, value_parser = commands::parse_amount)]
        midnight: i64,
    },
    /// Labor cost report by work type for a project
    Report { name: String },
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). The guard must live
/// until exit so buffered file output is flushed.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr = fmt::layer().with_writer(io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sitelog.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref());

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    debug!(api_url = %config.api_url, "Config loaded");

    let mut app = App::new(config, cli.json)?;
    commands::run(&mut app, cli.command).await
}
