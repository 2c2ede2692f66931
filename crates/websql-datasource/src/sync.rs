//! Table sync engine
//!
//! Keeps in-memory tables and the files they were imported from in step:
//!
//! - **pull** reloads a table from its file after an external change
//! - **push** writes a table back to its file after an in-app edit
//! - a [`ChangeSource`] calls [`TableSyncEngine::sweep`] to detect external
//!   changes by comparing modification instants
//!
//! While a push is writing, its file carries a sync lock so the sweep never
//! mistakes the engine's own write for an external change.

mod engine;
mod state;
mod watcher;

pub use engine::{SyncOptions, TableSyncEngine};
pub use state::TrackedTable;
pub use watcher::{ChangeSource, PollingChangeSource};

/// Default time between two sweeps
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Sheet written when a tracked workbook table has no sheet name
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";
