//! Remote database sources have no files

use async_trait::async_trait;
use websql_core::{Result, WebSqlError};

use super::{DirEntry, FileContents, FileGateway, FileStat};
use crate::{DataSource, DataSourceKind};

/// Gateway for remote database sources; every file operation is rejected
#[derive(Debug, Default)]
pub struct RemoteDatabaseGateway;

impl RemoteDatabaseGateway {
    pub fn new() -> Self {
        Self
    }
}

fn unsupported(operation: &str) -> WebSqlError {
    WebSqlError::NotSupported(format!(
        "{operation} is not supported for this source type"
    ))
}

#[async_trait]
impl FileGateway for RemoteDatabaseGateway {
    fn kind(&self) -> DataSourceKind {
        DataSourceKind::RemoteDatabase
    }

    async fn read(&self, _source: &DataSource, _path: &str) -> Result<Vec<u8>> {
        Err(unsupported("Reading files"))
    }

    async fn read_text(&self, _source: &DataSource, _path: &str) -> Result<String> {
        Err(unsupported("Reading files"))
    }

    async fn write(&self, _source: &DataSource, _path: &str, _contents: FileContents) -> Result<()> {
        Err(unsupported("Writing files"))
    }

    async fn stat(&self, _source: &DataSource, _path: &str) -> Result<FileStat> {
        Err(unsupported("Inspecting files"))
    }

    async fn list_directory(&self, _source: &DataSource, _path: &str) -> Result<Vec<DirEntry>> {
        Err(unsupported("Listing directories"))
    }
}
