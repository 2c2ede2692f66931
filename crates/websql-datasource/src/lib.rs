//! WebSQL Data Sources
//!
//! Configured locations tables are imported from, and the machinery that keeps
//! imported tables in step with their files.
//!
//! - [`DataSourceRegistry`] - CRUD and connection state of data sources
//! - [`FileGateway`] - read/write/stat access per data source kind
//! - [`TableSyncEngine`] - pull, push and change detection for tracked tables
//! - [`browse`] - file tree of a local directory source

mod browse;
mod config;
mod gateway;
pub mod naming;
mod registry;
mod sync;
pub mod xlsx;

pub use browse::{FileNode, FileNodeKind, FileType, browse};
pub use config::*;
pub use gateway::*;
pub use registry::DataSourceRegistry;
pub use sync::*;
