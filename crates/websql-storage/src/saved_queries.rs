//! Saved queries

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use websql_core::{ListenerSet, Subscription};

use crate::{KeyValueStore, SAVED_QUERIES_KEY, load_collection, save_collection};

/// A named SQL query kept across sessions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuery {
    pub id: Uuid,
    pub name: String,
    pub query: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavedQuery {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            query: query.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Saved query collection, persisted on every mutation
pub struct SavedQueryStore {
    store: Arc<dyn KeyValueStore>,
    queries: RwLock<Vec<SavedQuery>>,
    listeners: ListenerSet<Vec<SavedQuery>>,
}

impl SavedQueryStore {
    /// Load the collection from `store`
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let queries: Vec<SavedQuery> = load_collection(store.as_ref(), SAVED_QUERIES_KEY);
        tracing::debug!(count = queries.len(), "saved queries loaded");
        Self {
            store,
            queries: RwLock::new(queries),
            listeners: ListenerSet::new(),
        }
    }

    pub fn all(&self) -> Vec<SavedQuery> {
        self.queries.read().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<SavedQuery> {
        self.queries.read().iter().find(|q| q.id == id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<SavedQuery> {
        self.queries.read().iter().find(|q| q.name == name).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.queries.read().iter().any(|q| q.name == name)
    }

    /// Save a new query
    pub fn save(&self, name: &str, query: &str) -> SavedQuery {
        let saved = SavedQuery::new(name, query);
        self.mutate(|queries| queries.push(saved.clone()));
        saved
    }

    /// Change the name and/or text of a query, returning the updated record
    pub fn update(&self, id: Uuid, name: Option<&str>, query: Option<&str>) -> Option<SavedQuery> {
        if self.get(id).is_none() {
            return None;
        }
        self.mutate(|queries| {
            let existing = queries.iter_mut().find(|q| q.id == id)?;
            if let Some(name) = name {
                existing.name = name.to_string();
            }
            if let Some(query) = query {
                existing.query = query.to_string();
            }
            existing.updated_at = Utc::now();
            Some(existing.clone())
        })
    }

    /// Remove a query; returns whether anything was removed
    pub fn delete(&self, id: Uuid) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.mutate(|queries| queries.retain(|q| q.id != id));
        true
    }

    /// Listen for changes; the listener receives the full collection
    pub fn subscribe(&self, listener: impl Fn(&Vec<SavedQuery>) + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<SavedQuery>) -> R) -> R {
        let (result, snapshot) = {
            let mut queries = self.queries.write();
            let result = f(&mut queries);
            (result, queries.clone())
        };
        save_collection(self.store.as_ref(), SAVED_QUERIES_KEY, &snapshot);
        self.listeners.notify(&snapshot);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_save_update_delete() {
        let store = SavedQueryStore::new(Arc::new(MemoryStore::new()));

        let q = store.save("top sales", "SELECT * FROM sales LIMIT 10");
        assert!(store.exists("top sales"));

        let updated = store.update(q.id, None, Some("SELECT 1")).unwrap();
        assert_eq!(updated.name, "top sales");
        assert_eq!(updated.query, "SELECT 1");
        assert!(updated.updated_at >= q.updated_at);

        assert!(store.update(Uuid::new_v4(), Some("x"), None).is_none());

        assert!(store.delete(q.id));
        assert!(!store.delete(q.id));
        assert!(store.all().is_empty());
    }

    #[test]
    fn test_queries_survive_reload() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let saved = SavedQueryStore::new(kv.clone()).save("q", "SELECT 42");

        let reloaded = SavedQueryStore::new(kv);
        assert_eq!(reloaded.get(saved.id), Some(saved));
        assert!(reloaded.find_by_name("q").is_some());
    }

    #[test]
    fn test_subscribers_see_every_mutation() {
        let store = SavedQueryStore::new(Arc::new(MemoryStore::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let _sub = store.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let q = store.save("a", "SELECT 1");
        store.update(q.id, Some("b"), None);
        store.delete(q.id);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
