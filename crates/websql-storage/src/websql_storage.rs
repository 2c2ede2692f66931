//! WebSQL Storage - Persistence of workbench state across sessions
//!
//! Every collection is a JSON document stored under a fixed key in a
//! [`KeyValueStore`]:
//!
//! - data sources (`websql_data_sources`, owned by the data source registry)
//! - saved queries (`websql-saved-queries`)
//! - saved tables and views (`websql-saved-tables`)
//! - per-table metadata (`websql_table_metadata`)
//!
//! Collections are independent; references between them (a saved table's
//! `original_name`, a metadata record's `table_name`) are kept in step by the
//! callers, not by the store.

mod collection;
mod saved_queries;
mod saved_tables;
mod sqlite_store;
mod store;
mod table_metadata;

pub use collection::{load_collection, save_collection};
pub use saved_queries::{SavedQuery, SavedQueryStore};
pub use saved_tables::{SavedTable, SavedTableKind, SavedTableStore};
pub use sqlite_store::SqliteStore;
pub use store::{KeyValueStore, MemoryStore};
pub use table_metadata::{CombinedFileStructure, NewTableMetadata, TableMetadata, TableMetadataStore, TableOrigin};

/// Storage key of the data source collection
pub const DATA_SOURCES_KEY: &str = "websql_data_sources";
/// Storage key of the saved query collection
pub const SAVED_QUERIES_KEY: &str = "websql-saved-queries";
/// Storage key of the saved table collection
pub const SAVED_TABLES_KEY: &str = "websql-saved-tables";
/// Storage key of the table metadata map
pub const TABLE_METADATA_KEY: &str = "websql_table_metadata";
