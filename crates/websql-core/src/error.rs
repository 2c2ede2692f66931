//! Error types for WebSQL

use thiserror::Error;

/// Core error type for WebSQL operations
#[derive(Error, Debug)]
pub enum WebSqlError {
    /// Missing or invalid settings on a data source (path, host, database...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// File access failure, already prefixed with what was being attempted
    #[error("IO error: {0}")]
    Io(String),

    /// Failure reported by the query engine, message kept verbatim
    #[error("{0}")]
    Engine(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Table {0} is not tracked")]
    NotTracked(String),

    #[error("Data source not found: {0}")]
    DataSourceNotFound(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl WebSqlError {
    /// Wrap an I/O failure with a readable prefix, keeping "not found" distinguishable.
    pub fn from_io(action: &str, path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            WebSqlError::NotFound(format!("{action} {path}: file not found"))
        } else {
            WebSqlError::Io(format!("{action} {path}: {err}"))
        }
    }

    /// Check if the error means the target does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, WebSqlError::NotFound(_))
    }
}

/// Result type alias for WebSQL operations
pub type Result<T> = std::result::Result<T, WebSqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_is_distinguishable() {
        let err = WebSqlError::from_io(
            "Failed to read",
            "/data/sales.csv",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Not found: Failed to read /data/sales.csv: file not found"
        );
    }

    #[test]
    fn test_io_other_kept_as_io() {
        let err = WebSqlError::from_io(
            "Failed to write",
            "/data/sales.csv",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(!err.is_not_found());
        assert!(err.to_string().starts_with("IO error: Failed to write /data/sales.csv"));
    }

    #[test]
    fn test_engine_message_passes_through() {
        let err = WebSqlError::Engine("Parser Error: syntax error at or near \"CREAT\"".into());
        assert_eq!(
            err.to_string(),
            "Parser Error: syntax error at or near \"CREAT\""
        );
    }
}
