//! Directory tree of a local data source

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use websql_core::{Result, WebSqlError};

use crate::{DataSource, FileGateway, xlsx};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileNodeKind {
    Directory,
    File,
}

/// What opening a file would do with it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Importable as a table
    Columnar,
    Text,
    Sql,
    Other,
}

impl FileType {
    pub fn from_name(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "parquet" | "xlsx" | "xls" => FileType::Columnar,
            "sql" => FileType::Sql,
            "txt" | "md" | "json" | "xml" | "log" => FileType::Text,
            _ => FileType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileNodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<FileType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    /// Set on the children of a workbook node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
}

fn is_workbook(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".xlsx") || lower.ends_with(".xls")
}

/// Build the file tree under the root of a local directory source.
///
/// Directories come before files, each group sorted by name. Office lock
/// files (`~$...`) are skipped. A workbook becomes a directory-like node whose
/// children are its sheets.
#[tracing::instrument(skip(gateway, source), fields(data_source_id = %source.id))]
pub async fn browse(gateway: &dyn FileGateway, source: &DataSource) -> Result<FileNode> {
    let config = source.config.as_local().ok_or_else(|| {
        WebSqlError::NotSupported("Browsing is not supported for this source type".into())
    })?;
    let root = config.path.trim_end_matches(['/', '\\']).to_string();
    let name = root
        .rsplit(['/', '\\'])
        .find(|s| !s.is_empty())
        .unwrap_or("Root")
        .to_string();
    build_directory(gateway, source, name, root).await
}

fn build_directory<'a>(
    gateway: &'a dyn FileGateway,
    source: &'a DataSource,
    name: String,
    path: String,
) -> Pin<Box<dyn Future<Output = Result<FileNode>> + Send + 'a>> {
    Box::pin(async move {
        let entries = gateway.list_directory(source, &path).await?;
        let mut children = Vec::with_capacity(entries.len());

        for entry in entries {
            if entry.name.starts_with("~$") {
                continue;
            }

            if entry.is_directory {
                children.push(build_directory(gateway, source, entry.name, entry.path).await?);
                continue;
            }

            if is_workbook(&entry.name) {
                children.push(workbook_node(gateway, source, entry.name, entry.path).await);
                continue;
            }

            children.push(FileNode {
                file_type: Some(FileType::from_name(&entry.name)),
                name: entry.name,
                path: entry.path,
                kind: FileNodeKind::File,
                children: Vec::new(),
                size: Some(entry.size.unwrap_or(0)),
                modified_at: entry.modified_at_ms.and_then(DateTime::from_timestamp_millis),
                sheet_name: None,
            });
        }

        children.sort_by(|a, b| {
            let dir_first = |n: &FileNode| n.kind != FileNodeKind::Directory;
            dir_first(a)
                .cmp(&dir_first(b))
                .then_with(|| a.name.cmp(&b.name))
        });

        Ok(FileNode {
            name,
            path,
            kind: FileNodeKind::Directory,
            children,
            file_type: None,
            size: None,
            modified_at: None,
            sheet_name: None,
        })
    })
}

async fn workbook_node(gateway: &dyn FileGateway, source: &DataSource, name: String, path: String) -> FileNode {
    let sheets = match gateway.read(source, &path).await {
        Ok(bytes) => xlsx::sheet_names(&bytes).unwrap_or_else(|e| {
            tracing::warn!(path = %path, error = %e, "failed to list workbook sheets");
            Vec::new()
        }),
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "failed to read workbook");
            Vec::new()
        }
    };

    let children = sheets
        .into_iter()
        .map(|sheet| FileNode {
            name: sheet.clone(),
            path: path.clone(),
            kind: FileNodeKind::File,
            children: Vec::new(),
            file_type: Some(FileType::Columnar),
            size: None,
            modified_at: None,
            sheet_name: Some(sheet),
        })
        .collect();

    FileNode {
        name,
        path,
        kind: FileNodeKind::Directory,
        children,
        file_type: Some(FileType::Columnar),
        size: None,
        modified_at: None,
        sheet_name: None,
    }
}
