//! File access per data source kind
//!
//! Each data source kind has one [`FileGateway`]. Modification instants leave
//! the gateway as milliseconds since the epoch; [`FileStat::new`] normalizes
//! second-granularity values so callers can compare them directly.

mod local;
mod remote;

pub use local::LocalFileGateway;
pub use remote::RemoteDatabaseGateway;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use websql_core::{Result, WebSqlError};

use crate::{DataSource, DataSourceKind};

/// Anything below this is taken to be seconds, not milliseconds (it is 1973 in ms).
const SECONDS_THRESHOLD: i64 = 100_000_000_000;

/// Scale a second-granularity epoch value up to milliseconds
pub fn normalize_timestamp_ms(raw: i64) -> i64 {
    if raw > 0 && raw < SECONDS_THRESHOLD {
        raw * 1000
    } else {
        raw
    }
}

/// Result of statting a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Modification instant, milliseconds since the epoch
    pub modified_at_ms: i64,
    pub size: u64,
}

impl FileStat {
    pub fn new(raw_modified: i64, size: u64) -> Self {
        Self {
            modified_at_ms: normalize_timestamp_ms(raw_modified),
            size,
        }
    }
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    /// Full path, usable with the other gateway calls
    pub path: String,
    pub is_directory: bool,
    pub size: Option<u64>,
    pub modified_at_ms: Option<i64>,
}

/// What to write to a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContents {
    Text(String),
    Bytes(Vec<u8>),
}

impl FileContents {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContents::Text(text) => text.as_bytes(),
            FileContents::Bytes(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            FileContents::Text(text) => text.into_bytes(),
            FileContents::Bytes(bytes) => bytes,
        }
    }
}

/// Read/write/stat access to files of one data source kind
#[async_trait]
pub trait FileGateway: Send + Sync {
    /// The data source kind this gateway serves
    fn kind(&self) -> DataSourceKind;

    async fn read(&self, source: &DataSource, path: &str) -> Result<Vec<u8>>;

    async fn read_text(&self, source: &DataSource, path: &str) -> Result<String>;

    async fn write(&self, source: &DataSource, path: &str, contents: FileContents) -> Result<()>;

    async fn stat(&self, source: &DataSource, path: &str) -> Result<FileStat>;

    async fn list_directory(&self, source: &DataSource, path: &str) -> Result<Vec<DirEntry>>;
}

/// Gateways by data source kind
pub struct GatewayRegistry {
    gateways: HashMap<DataSourceKind, Arc<dyn FileGateway>>,
}

impl GatewayRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            gateways: HashMap::new(),
        }
    }

    /// Create a registry with the built-in gateways registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(LocalFileGateway::new()));
        registry.register(Arc::new(RemoteDatabaseGateway::new()));
        registry
    }

    /// Register a gateway, replacing any previous one for the same kind
    pub fn register(&mut self, gateway: Arc<dyn FileGateway>) {
        self.gateways.insert(gateway.kind(), gateway);
    }

    pub fn get(&self, kind: DataSourceKind) -> Option<Arc<dyn FileGateway>> {
        self.gateways.get(&kind).cloned()
    }

    /// Gateway serving `source`
    pub fn for_source(&self, source: &DataSource) -> Result<Arc<dyn FileGateway>> {
        self.get(source.kind()).ok_or_else(|| {
            WebSqlError::NotSupported(format!("No file gateway for {} sources", source.kind()))
        })
    }
}

impl Default for GatewayRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_are_scaled_to_millis() {
        assert_eq!(normalize_timestamp_ms(1_700_000_000), 1_700_000_000_000);
        assert_eq!(normalize_timestamp_ms(1_700_000_000_123), 1_700_000_000_123);
        assert_eq!(normalize_timestamp_ms(0), 0);
        assert_eq!(FileStat::new(1_700_000_000, 10).modified_at_ms, 1_700_000_000_000);
    }

    #[test]
    fn test_defaults_cover_every_kind() {
        let registry = GatewayRegistry::with_defaults();
        assert!(registry.get(DataSourceKind::LocalDirectory).is_some());
        assert!(registry.get(DataSourceKind::RemoteDatabase).is_some());
        assert!(GatewayRegistry::new().get(DataSourceKind::LocalDirectory).is_none());
    }
}
