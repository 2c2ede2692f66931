//! Subcommands of the `websql` binary

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Table, presets::UTF8_FULL};
use uuid::Uuid;
use websql_datasource::{
    DataSource, DataSourceConfig, FileNode, FileNodeKind, LocalDirConfig, RemoteDbConfig, browse,
};
use websql_services::{RestoreSummary, Workbench};

#[derive(Subcommand, Clone, Debug)]
pub enum SourceCommand {
    /// List configured data sources
    List,

    /// Add a local directory source
    AddLocal {
        /// Display name
        name: String,
        /// Root directory
        path: String,
        /// Prefix of table names imported from this source
        #[arg(long)]
        short_name: String,
        /// Do not reload tables when their files change
        #[arg(long)]
        no_watch: bool,
        /// Do not write in-app edits back to files
        #[arg(long)]
        no_sync: bool,
    },

    /// Add a remote database source
    AddRemote {
        name: String,
        #[arg(long)]
        short_name: String,
        #[arg(long)]
        host: String,
        #[arg(long, default_value_t = 5432)]
        port: u16,
        #[arg(long)]
        database: String,
        #[arg(long)]
        username: String,
        #[arg(long, env = "WEBSQL_DB_PASSWORD", default_value = "", hide_env_values = true)]
        password: String,
        #[arg(long)]
        schema: Option<String>,
    },

    /// Delete a data source and untrack its tables
    Remove { id: Uuid },

    /// Test a data source and record the result
    Connect { id: Uuid },

    /// Print the file tree of a local directory source
    Browse { id: Uuid },
}

#[derive(Subcommand, Clone, Debug)]
pub enum QueryCommand {
    /// List saved queries
    List,

    /// Save a query under a name
    Save { name: String, sql: String },
}

#[derive(Subcommand, Clone, Debug)]
pub enum TableCommand {
    /// List saved tables and views
    List,
}

pub async fn run_sources(workbench: &Workbench, command: SourceCommand, json: bool) -> Result<()> {
    match command {
        SourceCommand::List => {
            let sources = workbench.sources().all();
            if json {
                let masked: Vec<DataSource> = sources.into_iter().map(mask_password).collect();
                println!("{}", serde_json::to_string_pretty(&masked)?);
            } else if sources.is_empty() {
                println!("No data sources configured");
            } else {
                println!("{}", sources_table(&sources));
            }
        }
        SourceCommand::AddLocal {
            name,
            path,
            short_name,
            no_watch,
            no_sync,
        } => {
            let config = LocalDirConfig {
                watch_enabled: !no_watch,
                sync_enabled: !no_sync,
                ..LocalDirConfig::new(path)
            };
            let source = workbench.sources().add(
                &name,
                &short_name,
                DataSourceConfig::LocalDirectory(config),
            );
            println!("Added {} ({})", source.name, source.id);
        }
        SourceCommand::AddRemote {
            name,
            short_name,
            host,
            port,
            database,
            username,
            password,
            schema,
        } => {
            let config = RemoteDbConfig {
                host,
                port,
                database,
                username,
                password,
                schema,
            };
            let source = workbench.sources().add(
                &name,
                &short_name,
                DataSourceConfig::RemoteDatabase(config),
            );
            println!("Added {} ({})", source.name, source.id);
        }
        SourceCommand::Remove { id } => match workbench.delete_data_source(id) {
            Some(untracked) if untracked.is_empty() => println!("Removed {}", id),
            Some(untracked) => println!("Removed {}; untracked {}", id, untracked.join(", ")),
            None => anyhow::bail!("No data source with id {}", id),
        },
        SourceCommand::Connect { id } => {
            workbench
                .sources()
                .connect(id)
                .await
                .with_context(|| format!("Failed to connect data source {}", id))?;
            println!("Connected {}", id);
        }
        SourceCommand::Browse { id } => {
            let source = workbench
                .sources()
                .get(id)
                .with_context(|| format!("No data source with id {}", id))?;
            let gateway = workbench.sources().gateways().for_source(&source)?;
            let tree = browse(gateway.as_ref(), &source).await?;
            let mut out = String::new();
            render_tree(&tree, 0, &mut out);
            print!("{}", out);
        }
    }
    Ok(())
}

pub fn run_queries(workbench: &Workbench, command: QueryCommand) -> Result<()> {
    match command {
        QueryCommand::List => {
            let queries = workbench.saved_queries().all();
            if queries.is_empty() {
                println!("No saved queries");
                return Ok(());
            }
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Name", "Query", "Updated"]);
            for query in queries {
                table.add_row(vec![
                    query.name,
                    first_line(&query.query),
                    query.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }
            println!("{table}");
        }
        QueryCommand::Save { name, sql } => {
            let saved = workbench.saved_queries().save(&name, &sql);
            println!("Saved query {} ({})", saved.name, saved.id);
        }
    }
    Ok(())
}

pub fn run_tables(workbench: &Workbench, command: TableCommand) -> Result<()> {
    match command {
        TableCommand::List => {
            let saved = workbench.saved_tables().all();
            if saved.is_empty() {
                println!("No saved tables");
                return Ok(());
            }
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Name", "Table", "Type", "Origin", "Updated"]);
            for record in saved {
                let origin = workbench
                    .metadata()
                    .get(&record.original_name)
                    .map(|m| format!("{:?}", m.origin).to_lowercase())
                    .unwrap_or_else(|| "-".to_string());
                table.add_row(vec![
                    record.name,
                    record.original_name,
                    format!("{:?}", record.kind).to_lowercase(),
                    origin,
                    record.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

pub fn print_restore_summary(summary: &RestoreSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else if summary.is_complete() {
        println!("Restored {} saved tables", summary.restored_count);
    } else {
        println!(
            "Restored {} saved tables; failed: {}",
            summary.restored_count,
            summary.failed_names.join(", ")
        );
    }
    Ok(())
}

/// Open the given files and keep their tables in sync until Ctrl-C
pub async fn watch(workbench: &Workbench, source_id: Uuid, files: &[String]) -> Result<()> {
    workbench
        .sources()
        .connect(source_id)
        .await
        .with_context(|| format!("Failed to connect data source {}", source_id))?;

    let _reloads = workbench.sync().subscribe_to_table_reload(|table| {
        println!("reloaded {}", table);
    });

    for entry in files {
        let (path, sheet) = split_sheet(entry);
        let table = workbench
            .open_file(source_id, path, sheet)
            .await
            .with_context(|| format!("Failed to open {}", entry))?;
        println!("{} -> {}", entry, table);
    }

    workbench.sync().start_file_watcher();
    println!("Watching {} tables, press Ctrl-C to stop", workbench.sync().tracked_names().len());
    tokio::signal::ctrl_c().await?;
    workbench.sync().stop_file_watcher();
    Ok(())
}

/// `book.xlsx#Orders` names a sheet; anything else is a plain path
pub fn split_sheet(entry: &str) -> (&str, Option<&str>) {
    match entry.rsplit_once('#') {
        Some((path, sheet)) if !path.is_empty() && !sheet.is_empty() => (path, Some(sheet)),
        _ => (entry, None),
    }
}

fn mask_password(mut source: DataSource) -> DataSource {
    if let DataSourceConfig::RemoteDatabase(config) = &mut source.config {
        if !config.password.is_empty() {
            config.password = "********".to_string();
        }
    }
    source
}

fn sources_table(sources: &[DataSource]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Id", "Name", "Short", "Type", "Location", "Status", "Last sync"]);
    for source in sources {
        let location = match &source.config {
            DataSourceConfig::LocalDirectory(config) => config.path.clone(),
            DataSourceConfig::RemoteDatabase(config) => {
                format!("{}:{}/{}", config.host, config.port, config.database)
            }
        };
        let status = match &source.error {
            Some(error) => format!("{} ({})", source.status, error),
            None => source.status.to_string(),
        };
        table.add_row(vec![
            source.id.to_string(),
            source.name.clone(),
            source.short_name.clone(),
            source.kind().to_string(),
            location,
            status,
            source
                .last_sync_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}

fn first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    if text.lines().nth(1).is_some() {
        format!("{} ...", line)
    } else {
        line.to_string()
    }
}

fn render_tree(node: &FileNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let marker = match (node.kind, node.sheet_name.is_some()) {
        (_, true) => "#",
        (FileNodeKind::Directory, false) => "/",
        (FileNodeKind::File, false) => "",
    };
    out.push_str(&format!("{}{}{}\n", indent, node.name, marker));
    for child in &node.children {
        render_tree(child, depth + 1, out);
    }
}
