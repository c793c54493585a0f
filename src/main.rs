//! Wake Scheduler - Main entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use wake_scheduler_lib::commands::{self, Command};
use wake_scheduler_lib::models::Mode;
use wake_scheduler_lib::scheduler_runner::SchedulerRunner;
use wake_scheduler_lib::settings;
use wake_scheduler_lib::storage::Database;

/// Weekly turn on/off rules and the next RTC wake request
#[derive(Debug, Parser)]
#[command(name = "wake-scheduler", version, about, long_about = None)]
struct Cli {
    /// SQLite database holding rules and configuration
    #[arg(long, env = settings::DATABASE_ENV)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Re-resolve the upcoming wake on an interval until Ctrl-C
    Watch {
        #[arg(short, long, default_value = "default", value_parser = commands::parse_mode)]
        mode: Mode,
        /// Seconds between evaluations
        #[arg(short, long, default_value_t = 60)]
        interval: u64,
    },
    #[command(flatten)]
    Once(Command),
}

#[tokio::main]
async fn main() {
    settings::init_logging();

    let cli = Cli::parse();
    let db_path = cli.database.unwrap_or_else(settings::default_database_path);
    tracing::debug!("Database: {:?}", db_path);

    if let Err(e) = settings::ensure_parent_dir(&db_path) {
        tracing::error!("Failed to create data directory: {}", e);
        process::exit(1);
    }

    let db = match Database::open(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            process::exit(1);
        }
    };

    let command = match cli.action {
        Action::Watch { mode, interval } => {
            tracing::info!("Watching upcoming wake every {}s", interval);
            let runner = SchedulerRunner::new(db, mode, Duration::from_secs(interval.max(1)));
            runner.run().await;
            return;
        }
        Action::Once(command) => command,
    };

    match commands::execute(&db, command) {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                tracing::error!("Failed to render output: {}", e);
                process::exit(1);
            }
        },
        Err(e) => {
            tracing::error!("{}", e);
            process::exit(if e.is_invalid_input() { 2 } else { 1 });
        }
    }
}
