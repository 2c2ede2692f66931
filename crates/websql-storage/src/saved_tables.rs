//! Saved tables and views
//!
//! A saved table keeps the SQL needed to rebuild an in-memory table (or view)
//! on the next start. Records are unique by `original_name`, the name of the
//! live table they were exported from.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use websql_core::{ListenerSet, Subscription};

use crate::{KeyValueStore, SAVED_TABLES_KEY, load_collection, save_collection};

/// Whether a saved record rebuilds a table or a view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavedTableKind {
    Table,
    View,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedTable {
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Name of the live table or view
    pub original_name: String,
    #[serde(rename = "type")]
    pub kind: SavedTableKind,
    /// DDL/DML script or view definition
    pub sql: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Saved table collection, persisted on every mutation
pub struct SavedTableStore {
    store: Arc<dyn KeyValueStore>,
    tables: RwLock<Vec<SavedTable>>,
    listeners: ListenerSet<Vec<SavedTable>>,
}

impl SavedTableStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let tables: Vec<SavedTable> = load_collection(store.as_ref(), SAVED_TABLES_KEY);
        tracing::debug!(count = tables.len(), "saved tables loaded");
        Self {
            store,
            tables: RwLock::new(tables),
            listeners: ListenerSet::new(),
        }
    }

    pub fn all(&self) -> Vec<SavedTable> {
        self.tables.read().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<SavedTable> {
        self.tables.read().iter().find(|t| t.id == id).cloned()
    }

    pub fn find_by_original_name(&self, original_name: &str) -> Option<SavedTable> {
        self.tables
            .read()
            .iter()
            .find(|t| t.original_name == original_name)
            .cloned()
    }

    pub fn is_saved(&self, original_name: &str) -> bool {
        self.tables.read().iter().any(|t| t.original_name == original_name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.tables.read().iter().any(|t| t.name == name)
    }

    /// Saved tables of kind `Table`, in stored order
    pub fn tables_for_restore(&self) -> Vec<SavedTable> {
        self.tables
            .read()
            .iter()
            .filter(|t| t.kind == SavedTableKind::Table)
            .cloned()
            .collect()
    }

    /// Save a table, or refresh the existing record for `original_name`
    pub fn save(&self, name: &str, original_name: &str, kind: SavedTableKind, sql: &str) -> SavedTable {
        self.mutate(|tables| {
            let now = Utc::now();
            if let Some(existing) = tables.iter_mut().find(|t| t.original_name == original_name) {
                existing.name = name.to_string();
                existing.sql = sql.to_string();
                existing.updated_at = now;
                return existing.clone();
            }
            let table = SavedTable {
                id: Uuid::new_v4(),
                name: name.to_string(),
                original_name: original_name.to_string(),
                kind,
                sql: sql.to_string(),
                created_at: now,
                updated_at: now,
            };
            tables.push(table.clone());
            table
        })
    }

    pub fn update(&self, id: Uuid, name: Option<&str>, sql: Option<&str>) -> Option<SavedTable> {
        self.modify(id, |table| {
            if let Some(name) = name {
                table.name = name.to_string();
            }
            if let Some(sql) = sql {
                table.sql = sql.to_string();
            }
        })
    }

    /// Point a record at a renamed live table
    pub fn rename(
        &self,
        id: Uuid,
        new_name: &str,
        new_original_name: &str,
        new_sql: Option<&str>,
    ) -> Option<SavedTable> {
        self.modify(id, |table| {
            table.name = new_name.to_string();
            table.original_name = new_original_name.to_string();
            if let Some(sql) = new_sql {
                table.sql = sql.to_string();
            }
        })
    }

    pub fn delete(&self, id: Uuid) -> bool {
        self.remove_where(|t| t.id == id)
    }

    pub fn delete_by_original_name(&self, original_name: &str) -> bool {
        self.remove_where(|t| t.original_name == original_name)
    }

    pub fn subscribe(&self, listener: impl Fn(&Vec<SavedTable>) + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    fn modify(&self, id: Uuid, f: impl FnOnce(&mut SavedTable)) -> Option<SavedTable> {
        if self.get(id).is_none() {
            return None;
        }
        self.mutate(|tables| {
            let table = tables.iter_mut().find(|t| t.id == id)?;
            f(table);
            table.updated_at = Utc::now();
            Some(table.clone())
        })
    }

    fn remove_where(&self, pred: impl Fn(&SavedTable) -> bool) -> bool {
        if !self.tables.read().iter().any(&pred) {
            return false;
        }
        self.mutate(|tables| tables.retain(|t| !pred(t)));
        true
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<SavedTable>) -> R) -> R {
        let (result, snapshot) = {
            let mut tables = self.tables.write();
            let result = f(&mut tables);
            (result, tables.clone())
        };
        save_collection(self.store.as_ref(), SAVED_TABLES_KEY, &snapshot);
        self.listeners.notify(&snapshot);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn store() -> SavedTableStore {
        SavedTableStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_save_upserts_by_original_name() {
        let store = store();
        let first = store.save("Sales", "sales", SavedTableKind::Table, "CREATE TABLE sales (id INTEGER);");
        let second = store.save("Sales v2", "sales", SavedTableKind::Table, "CREATE TABLE sales (id BIGINT);");

        assert_eq!(store.all().len(), 1);
        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.name, "Sales v2");
        assert!(second.sql.contains("BIGINT"));
        assert!(store.is_saved("sales"));
    }

    #[test]
    fn test_tables_for_restore_excludes_views() {
        let store = store();
        store.save("a", "a", SavedTableKind::Table, "CREATE TABLE a (id INTEGER);");
        store.save("v", "v", SavedTableKind::View, "CREATE VIEW v AS SELECT * FROM a;");

        let names: Vec<String> = store.tables_for_restore().into_iter().map(|t| t.original_name).collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn test_rename_and_delete_by_original_name() {
        let store = store();
        let t = store.save("a", "a", SavedTableKind::Table, "CREATE TABLE a (id INTEGER);");

        let renamed = store.rename(t.id, "b", "b", None).unwrap();
        assert_eq!(renamed.original_name, "b");
        assert_eq!(renamed.sql, t.sql);
        assert!(store.find_by_original_name("a").is_none());

        assert!(store.delete_by_original_name("b"));
        assert!(!store.delete_by_original_name("b"));
        assert!(store.rename(t.id, "c", "c", None).is_none());
    }

    #[test]
    fn test_kind_serialized_as_type() {
        let store = store();
        let t = store.save("v", "v", SavedTableKind::View, "CREATE VIEW v AS SELECT 1;");
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["type"], "view");
        assert_eq!(json["originalName"], "v");
    }
}
