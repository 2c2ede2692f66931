//! Data source definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of location a data source points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    LocalDirectory,
    RemoteDatabase,
}

impl std::fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSourceKind::LocalDirectory => write!(f, "local_directory"),
            DataSourceKind::RemoteDatabase => write!(f, "remote_database"),
        }
    }
}

/// Settings of a local directory source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDirConfig {
    /// Root directory; relative file paths resolve against it
    pub path: String,
    /// Reload tracked tables when their files change on disk
    pub watch_enabled: bool,
    /// Write in-app edits back to the files
    pub sync_enabled: bool,
}

impl LocalDirConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            watch_enabled: true,
            sync_enabled: true,
        }
    }
}

/// Settings of a remote database source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

/// Kind-specific settings, stored next to a `type` tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum DataSourceConfig {
    LocalDirectory(LocalDirConfig),
    RemoteDatabase(RemoteDbConfig),
}

impl DataSourceConfig {
    pub fn kind(&self) -> DataSourceKind {
        match self {
            DataSourceConfig::LocalDirectory(_) => DataSourceKind::LocalDirectory,
            DataSourceConfig::RemoteDatabase(_) => DataSourceKind::RemoteDatabase,
        }
    }

    pub fn as_local(&self) -> Option<&LocalDirConfig> {
        match self {
            DataSourceConfig::LocalDirectory(config) => Some(config),
            DataSourceConfig::RemoteDatabase(_) => None,
        }
    }
}

/// Connection state of a data source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for DataSourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DataSourceStatus::Disconnected => "disconnected",
            DataSourceStatus::Connecting => "connecting",
            DataSourceStatus::Connected => "connected",
            DataSourceStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// A configured location files or tables can be imported from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub id: Uuid,
    pub name: String,
    /// Prefix of the names of tables imported through this source
    pub short_name: String,
    #[serde(flatten)]
    pub config: DataSourceConfig,
    #[serde(default)]
    pub status: DataSourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, rename = "lastSync", skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DataSource {
    /// Create a disconnected data source with a fresh id
    pub fn new(name: impl Into<String>, short_name: impl Into<String>, config: DataSourceConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            short_name: short_name.into(),
            config,
            status: DataSourceStatus::Disconnected,
            error: None,
            last_sync_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> DataSourceKind {
        self.config.kind()
    }

    pub fn is_connected(&self) -> bool {
        self.status == DataSourceStatus::Connected
    }

    /// Whether external file changes should reload tracked tables
    pub fn watch_enabled(&self) -> bool {
        self.config.as_local().is_none_or(|c| c.watch_enabled)
    }

    /// Whether in-app edits should be written back to files
    pub fn sync_enabled(&self) -> bool {
        self.config.as_local().is_none_or(|c| c.sync_enabled)
    }
}

/// Patch applied by [`DataSourceRegistry::update`](crate::DataSourceRegistry::update)
#[derive(Debug, Clone, Default)]
pub struct DataSourceUpdate {
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub config: Option<DataSourceConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_matches_stored_layout() {
        let source = DataSource::new(
            "Sales data",
            "sales",
            DataSourceConfig::LocalDirectory(LocalDirConfig::new("/data")),
        );
        let json = serde_json::to_value(&source).unwrap();

        assert_eq!(json["type"], "local_directory");
        assert_eq!(json["config"]["path"], "/data");
        assert_eq!(json["config"]["watchEnabled"], true);
        assert_eq!(json["shortName"], "sales");
        assert_eq!(json["status"], "disconnected");
        assert!(json["createdAt"].is_string());
        assert!(json.get("lastSync").is_none());

        let parsed: DataSource = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, source);
    }

    #[test]
    fn test_remote_sources_have_no_file_sync_switches() {
        let source = DataSource::new(
            "Warehouse",
            "wh",
            DataSourceConfig::RemoteDatabase(RemoteDbConfig {
                host: "db.internal".into(),
                port: 5432,
                database: "analytics".into(),
                username: "reader".into(),
                password: String::new(),
                schema: None,
            }),
        );
        assert_eq!(source.kind(), DataSourceKind::RemoteDatabase);
        assert!(source.watch_enabled());
        assert!(source.sync_enabled());
    }
}
