//! Query engine contract
//!
//! The analytical engine is embedded, not implemented here. Everything the
//! workbench needs from it goes through [`QueryEngine`]; failures come back as
//! [`WebSqlError::Engine`](crate::WebSqlError::Engine) carrying the engine's
//! own message.

use crate::{ColumnMeta, QueryResult, Result};
use async_trait::async_trait;

/// The embedded query engine
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Get the engine name (e.g., "duckdb")
    fn engine_name(&self) -> &str;

    /// Execute a single statement and return its rows (if any)
    async fn execute(&self, sql: &str) -> Result<QueryResult>;

    /// Execute a script of one or more `;`-separated statements.
    ///
    /// Stops at the first failing statement and returns its error.
    async fn execute_script(&self, sql: &str) -> Result<()>;

    /// Create `table` from delimited text with a header row
    async fn import_delimited_text(&self, table: &str, text: &str) -> Result<()>;

    /// Create `table` from a binary columnar (Parquet) buffer
    async fn import_binary_columnar(&self, table: &str, bytes: &[u8]) -> Result<()>;

    /// Serialize `table` as delimited text, header row first
    async fn export_as_delimited_text(&self, table: &str, delimiter: u8) -> Result<String>;

    /// Serialize `table` as a binary columnar (Parquet) buffer
    async fn export_as_binary_columnar(&self, table: &str) -> Result<Vec<u8>>;

    /// Drop `table` if it exists
    async fn drop_table(&self, table: &str) -> Result<()>;

    /// List the columns of `table`
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnMeta>>;
}

/// Quote an identifier for use in generated SQL
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal for use in generated SQL
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
