//! File formats a table can be mirrored to

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Format of a file backing a tracked table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// Comma-delimited text
    Csv,
    /// Apache Parquet
    Parquet,
    /// Office Open XML workbook
    Xlsx,
}

impl FileFormat {
    /// Resolve the format from a file extension (case-insensitive).
    ///
    /// Returns `None` for anything the sync engine cannot write back.
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(FileFormat::Csv),
            "parquet" => Some(FileFormat::Parquet),
            "xlsx" => Some(FileFormat::Xlsx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Parquet => "parquet",
            FileFormat::Xlsx => "xlsx",
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(FileFormat::from_path("/data/sales.csv"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_path("/data/SALES.CSV"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_path("a.parquet"), Some(FileFormat::Parquet));
        assert_eq!(FileFormat::from_path("book.xlsx"), Some(FileFormat::Xlsx));
        assert_eq!(FileFormat::from_path("legacy.xls"), None);
        assert_eq!(FileFormat::from_path("notes.txt"), None);
        assert_eq!(FileFormat::from_path("no_extension"), None);
    }
}
