//! Local filesystem access

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use websql_core::{Result, WebSqlError};

use super::{DirEntry, FileContents, FileGateway, FileStat};
use crate::{DataSource, DataSourceKind};

/// Gateway for local directory sources
#[derive(Debug, Default)]
pub struct LocalFileGateway;

impl LocalFileGateway {
    pub fn new() -> Self {
        Self
    }

    /// Absolute paths are used as given; relative ones resolve against the source root
    fn resolve(&self, source: &DataSource, path: &str) -> Result<PathBuf> {
        let config = source.config.as_local().ok_or_else(|| {
            WebSqlError::NotSupported(format!("{} is not a local directory source", source.name))
        })?;

        let candidate = Path::new(path);
        if candidate.is_absolute() {
            return Ok(candidate.to_path_buf());
        }
        if config.path.is_empty() {
            return Err(WebSqlError::Configuration("Directory path is required".into()));
        }
        Ok(Path::new(&config.path).join(candidate))
    }
}

fn millis_since_epoch(time: SystemTime) -> Option<i64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_millis()).ok())
}

#[async_trait]
impl FileGateway for LocalFileGateway {
    fn kind(&self) -> DataSourceKind {
        DataSourceKind::LocalDirectory
    }

    async fn read(&self, source: &DataSource, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(source, path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| WebSqlError::from_io("Failed to read", &full.display().to_string(), e))
    }

    async fn read_text(&self, source: &DataSource, path: &str) -> Result<String> {
        let full = self.resolve(source, path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| WebSqlError::from_io("Failed to read", &full.display().to_string(), e))
    }

    async fn write(&self, source: &DataSource, path: &str, contents: FileContents) -> Result<()> {
        let full = self.resolve(source, path)?;
        tokio::fs::write(&full, contents.as_bytes())
            .await
            .map_err(|e| WebSqlError::from_io("Failed to write", &full.display().to_string(), e))?;
        tracing::debug!(path = %full.display(), "file written");
        Ok(())
    }

    async fn stat(&self, source: &DataSource, path: &str) -> Result<FileStat> {
        let full = self.resolve(source, path)?;
        let metadata = tokio::fs::metadata(&full)
            .await
            .map_err(|e| WebSqlError::from_io("Failed to stat", &full.display().to_string(), e))?;
        let modified = metadata
            .modified()
            .ok()
            .and_then(millis_since_epoch)
            .ok_or_else(|| {
                WebSqlError::Io(format!(
                    "Failed to stat {}: modification time unavailable",
                    full.display()
                ))
            })?;
        Ok(FileStat::new(modified, metadata.len()))
    }

    async fn list_directory(&self, source: &DataSource, path: &str) -> Result<Vec<DirEntry>> {
        let full = self.resolve(source, path)?;
        let display = full.display().to_string();
        let mut reader = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| WebSqlError::from_io("Failed to read directory", &display, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| WebSqlError::from_io("Failed to read directory", &display, e))?
        {
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path().to_string_lossy().replace('\\', "/"),
                is_directory: metadata.is_dir(),
                size: metadata.is_file().then(|| metadata.len()),
                modified_at_ms: metadata.modified().ok().and_then(millis_since_epoch),
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DataSourceConfig, LocalDirConfig, RemoteDbConfig};

    fn source(root: &Path) -> DataSource {
        DataSource::new(
            "local",
            "loc",
            DataSourceConfig::LocalDirectory(LocalDirConfig::new(root.to_string_lossy())),
        )
    }

    #[tokio::test]
    async fn test_relative_paths_resolve_against_root() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = LocalFileGateway::new();
        let source = source(dir.path());

        gateway
            .write(&source, "sales.csv", FileContents::Text("id\n1\n".into()))
            .await
            .unwrap();

        let absolute = dir.path().join("sales.csv");
        let text = gateway
            .read_text(&source, &absolute.to_string_lossy())
            .await
            .unwrap();
        assert_eq!(text, "id\n1\n");

        let stat = gateway.stat(&source, "sales.csv").await.unwrap();
        assert_eq!(stat.size, 5);
        assert!(stat.modified_at_ms > 1_000_000_000_000);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalFileGateway::new()
            .read(&source(dir.path()), "missing.csv")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("missing.csv"));
    }

    #[tokio::test]
    async fn test_list_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("a.csv"), "x\n").unwrap();

        let mut entries = LocalFileGateway::new()
            .list_directory(&source(dir.path()), "")
            .await
            .unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.csv");
        assert!(!entries[0].is_directory);
        assert_eq!(entries[0].size, Some(2));
        assert!(entries[1].is_directory);
    }

    #[tokio::test]
    async fn test_remote_source_is_rejected() {
        let remote = DataSource::new(
            "db",
            "db",
            DataSourceConfig::RemoteDatabase(RemoteDbConfig {
                host: "h".into(),
                port: 1,
                database: "d".into(),
                username: "u".into(),
                password: String::new(),
                schema: None,
            }),
        );
        let err = LocalFileGateway::new().read(&remote, "x.csv").await.unwrap_err();
        assert!(matches!(err, WebSqlError::NotSupported(_)));
    }
}
