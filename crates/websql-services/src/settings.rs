//! Workbench settings and application directories

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use websql_datasource::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_SHEET_NAME, SyncOptions};

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .context("Could not determine config directory")
        .map(|p| p.join("websql"))
}

pub fn data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .context("Could not determine data directory")
        .map(|p| p.join("websql"))
}

pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("websql")
        .join("logs")
}

pub fn settings_file() -> Result<PathBuf> {
    config_dir().map(|p| p.join("settings.json"))
}

/// Default location of the key-value store holding data sources and saved entities
pub fn storage_file() -> Result<PathBuf> {
    data_dir().map(|p| p.join("websql.db"))
}

pub fn ensure_directories() -> Result<()> {
    for dir in [config_dir()?, data_dir()?] {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {:?}", dir))?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchSettings {
    /// Time between two change-detection sweeps
    pub poll_interval_ms: u64,
    /// DuckDB database file, or `:memory:`
    pub database_path: String,
    /// Sheet written when a workbook table has no sheet name
    pub default_sheet_name: String,
    /// Overrides [`storage_file`]
    pub storage_path: Option<PathBuf>,
    /// Start the file watcher as soon as a table is tracked
    pub watch_on_startup: bool,
}

impl Default for WorkbenchSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            database_path: ":memory:".to_string(),
            default_sheet_name: DEFAULT_SHEET_NAME.to_string(),
            storage_path: None,
            watch_on_startup: true,
        }
    }
}

impl WorkbenchSettings {
    /// Load from the platform config directory; a missing file gives defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&settings_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        serde_json::from_str(&content).with_context(|| "Failed to parse settings JSON")
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&settings_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn storage_path(&self) -> Result<PathBuf> {
        match &self.storage_path {
            Some(path) => Ok(path.clone()),
            None => storage_file(),
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            default_sheet_name: self.default_sheet_name.clone(),
        }
    }
}
