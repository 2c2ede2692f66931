//! WebSQL Services Layer
//!
//! Wires the query engine, the persistence store and the data-source
//! machinery into one [`Workbench`] constructed at process start.
//!
//! # Architecture
//!
//! ```text
//! Front end (websql-cli)
//!     ↓
//! Service Layer (websql-services) ← This crate
//!     ↓
//! Domain Layer (websql-datasource, websql-storage)
//!     ↓
//! Infrastructure Layer (websql-core, websql-driver-duckdb)
//! ```
//!
//! # Services
//!
//! - [`Workbench`] - bootstrap, file opening and the in-app edit flow
//! - [`RestoreCoordinator`] - replays saved tables and views on startup
//! - [`export_table_as_sql`] - table or view as replayable SQL
//! - [`WorkbenchSettings`] - persisted settings and application directories

mod error;
mod restore;
pub mod settings;
mod sql_export;
mod workbench;

pub use error::{ServiceError, ServiceResult};
pub use restore::{RestoreCoordinator, RestoreSummary};
pub use settings::WorkbenchSettings;
pub use sql_export::{TableSql, export_table_as_sql};
pub use workbench::Workbench;
