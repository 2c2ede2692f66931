//! `websql` - headless WebSQL workbench
//!
//! Manages data sources and saved entities in the shared store, restores
//! saved tables, and keeps opened files and tables in sync in watch mode.

mod commands;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;
use websql_services::{Workbench, WorkbenchSettings, settings};

use commands::{QueryCommand, SourceCommand, TableCommand};
use logging::LogPreset;

#[derive(Parser, Debug)]
#[command(name = "websql", version, about = "Headless WebSQL workbench")]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, env = "WEBSQL_SETTINGS", global = true)]
    settings: Option<PathBuf>,

    /// Logging preset
    #[arg(long, value_enum, default_value_t = LogPreset::Development, global = true)]
    log: LogPreset,

    /// Print machine-readable JSON where supported
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage data sources
    #[command(subcommand)]
    Sources(SourceCommand),

    /// Manage saved queries
    #[command(subcommand)]
    Queries(QueryCommand),

    /// Inspect saved tables
    #[command(subcommand)]
    Tables(TableCommand),

    /// Replay saved tables and views into the database
    Restore,

    /// Open files of a source and sync them with their tables until Ctrl-C
    Watch {
        /// Data source id
        #[arg(long)]
        source: Uuid,
        /// Files to open; `book.xlsx#Sheet` selects a sheet
        #[arg(required = true)]
        files: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.log.config())?;

    let settings = match &cli.settings {
        Some(path) => WorkbenchSettings::load_from(path)?,
        None => {
            settings::ensure_directories()?;
            WorkbenchSettings::load()?
        }
    };
    tracing::debug!(?settings, "settings loaded");

    let workbench = Workbench::open(&settings).context("Failed to open the workbench")?;

    match cli.command {
        Command::Sources(command) => commands::run_sources(&workbench, command, cli.json).await,
        Command::Queries(command) => commands::run_queries(&workbench, command),
        Command::Tables(command) => commands::run_tables(&workbench, command),
        Command::Restore => {
            let summary = workbench.bootstrap().await;
            commands::print_restore_summary(&summary, cli.json)
        }
        Command::Watch { source, files } => {
            let summary = workbench.bootstrap().await;
            if !summary.is_complete() {
                tracing::warn!(failed = ?summary.failed_names, "some saved tables were not restored");
            }
            commands::watch(&workbench, source, &files).await
        }
    }
}
