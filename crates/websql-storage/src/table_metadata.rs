//! Per-table metadata: where a table came from

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{KeyValueStore, TABLE_METADATA_KEY, load_collection, save_collection};

/// How a table was created
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableOrigin {
    /// Imported from a file
    File,
    /// Pasted as delimited text
    Paste,
    /// Created by SQL (including restored saved tables)
    Sql,
    /// Union of several files with differing structure
    Combined,
    #[default]
    Unknown,
}

/// Column layout of one file that went into a combined table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedFileStructure {
    pub file_name: String,
    pub columns: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadata {
    pub table_name: String,
    pub origin: TableOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_delimiter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined_file_structures: Option<Vec<CombinedFileStructure>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// Everything in a metadata record except its key and creation stamp
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewTableMetadata {
    pub origin: TableOrigin,
    pub original_filename: Option<String>,
    pub original_delimiter: Option<String>,
    pub combined_file_structures: Option<Vec<CombinedFileStructure>>,
    pub row_count: Option<u64>,
}

impl NewTableMetadata {
    pub fn with_origin(origin: TableOrigin) -> Self {
        Self {
            origin,
            ..Default::default()
        }
    }
}

/// Metadata records keyed by table name
pub struct TableMetadataStore {
    store: Arc<dyn KeyValueStore>,
    records: RwLock<BTreeMap<String, TableMetadata>>,
}

impl TableMetadataStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let records: BTreeMap<String, TableMetadata> = load_collection(store.as_ref(), TABLE_METADATA_KEY);
        Self {
            store,
            records: RwLock::new(records),
        }
    }

    /// Create (or overwrite) the record for `table_name`
    pub fn create(&self, table_name: &str, data: NewTableMetadata) -> TableMetadata {
        let record = TableMetadata {
            table_name: table_name.to_string(),
            origin: data.origin,
            original_filename: data.original_filename,
            original_delimiter: data.original_delimiter,
            combined_file_structures: data.combined_file_structures,
            row_count: data.row_count,
            created_at: Utc::now(),
        };
        self.mutate(|records| {
            records.insert(table_name.to_string(), record.clone());
        });
        record
    }

    /// Modify an existing record; returns false (and stores nothing) when absent
    pub fn update(&self, table_name: &str, f: impl FnOnce(&mut TableMetadata)) -> bool {
        if !self.records.read().contains_key(table_name) {
            return false;
        }
        self.mutate(|records| {
            if let Some(record) = records.get_mut(table_name) {
                f(record);
                // the key is authoritative
                record.table_name = table_name.to_string();
            }
        });
        true
    }

    pub fn get(&self, table_name: &str) -> Option<TableMetadata> {
        self.records.read().get(table_name).cloned()
    }

    pub fn delete(&self, table_name: &str) {
        self.mutate(|records| {
            records.remove(table_name);
        });
    }

    /// Move a record to a new key; no-op when `old_name` has no record
    pub fn rename(&self, old_name: &str, new_name: &str) -> bool {
        if !self.records.read().contains_key(old_name) {
            return false;
        }
        self.mutate(|records| {
            if let Some(mut record) = records.remove(old_name) {
                record.table_name = new_name.to_string();
                records.insert(new_name.to_string(), record);
            }
        });
        true
    }

    pub fn all(&self) -> BTreeMap<String, TableMetadata> {
        self.records.read().clone()
    }

    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<String, TableMetadata>)) {
        let snapshot = {
            let mut records = self.records.write();
            f(&mut records);
            records.clone()
        };
        save_collection(self.store.as_ref(), TABLE_METADATA_KEY, &snapshot);
    }
}
