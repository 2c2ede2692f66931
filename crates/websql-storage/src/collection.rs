//! JSON collections stored under a single key

use serde::{Serialize, de::DeserializeOwned};

use crate::KeyValueStore;

/// Load the collection stored under `key`.
///
/// A missing key, a read failure, or unparseable JSON all yield the default
/// (empty) collection; the failure is logged.
pub fn load_collection<T>(store: &dyn KeyValueStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            tracing::error!(key, error = %e, "failed to read collection");
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(key, error = %e, "failed to parse collection, starting empty");
            T::default()
        }
    }
}

/// Persist `value` under `key`.
///
/// Failures are logged; the caller's in-memory copy stays authoritative.
pub fn save_collection<T>(store: &dyn KeyValueStore, key: &str, value: &T)
where
    T: Serialize + ?Sized,
{
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(key, error = %e, "failed to serialize collection");
            return;
        }
    };

    if let Err(e) = store.set(key, &json) {
        tracing::error!(key, error = %e, "failed to save collection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn test_corrupt_json_loads_empty() {
        let store = MemoryStore::new();
        store.set("k", "{not json").unwrap();
        let loaded: Vec<String> = load_collection(&store, "k");
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let store = MemoryStore::new();
        save_collection(&store, "k", &vec!["a".to_string(), "b".to_string()]);
        let loaded: Vec<String> = load_collection(&store, "k");
        assert_eq!(loaded, vec!["a", "b"]);
    }
}
