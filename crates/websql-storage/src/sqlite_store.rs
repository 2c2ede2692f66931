//! SQLite-backed key-value store
//!
//! A single `kv` table in a local database file survives process restarts.

use parking_lot::Mutex;
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use websql_core::{Result, WebSqlError};

use crate::KeyValueStore;

/// Key-value store persisted in a SQLite file
pub struct SqliteStore {
    db_path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| WebSqlError::from_io("Failed to create directory", &parent.display().to_string(), e))?;
        }

        let conn = Connection::open(&db_path).map_err(|e| {
            WebSqlError::Storage(format!("Failed to open database at {:?}: {}", db_path, e))
        })?;

        let store = Self {
            db_path,
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;

        tracing::debug!(path = ?store.db_path, "key-value store opened");
        Ok(store)
    }

    /// Open a store that lives only as long as this value
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| WebSqlError::Storage(format!("Failed to open in-memory database: {}", e)))?;
        let store = Self {
            db_path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "CREATE TABLE IF NOT EXISTS kv (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )",
                [],
            )
            .map_err(storage_error)?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT value FROM kv WHERE key = ?1")
            .map_err(storage_error)?;
        let result = stmt.query_row(params![key], |row| row.get(0));

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(storage_error(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .lock()
            .execute(
                "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, value, now],
            )
            .map_err(storage_error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .lock()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(storage_error)?;
        Ok(())
    }
}

fn storage_error(e: rusqlite::Error) -> WebSqlError {
    WebSqlError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("websql-saved-queries", "[]").unwrap();
            store.set("other", "1").unwrap();
            store.remove("other").unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.get("websql-saved-queries").unwrap().as_deref(),
            Some("[]")
        );
        assert_eq!(store.get("other").unwrap(), None);
    }

    #[test]
    fn test_set_replaces_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("k", "a").unwrap();
        store.set("k", "b").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("b"));
    }
}
