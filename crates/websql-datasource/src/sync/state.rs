//! In-memory sync state

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;
use websql_core::FileFormat;

/// A table mirroring a file (or one sheet of a workbook)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedTable {
    pub table_name: String,
    pub data_source_id: Uuid,
    pub file_path: String,
    pub sheet_name: Option<String>,
    /// Resolved from the file extension when tracking starts
    pub format: FileFormat,
}

impl TrackedTable {
    pub(crate) fn file_key(&self) -> FileKey {
        FileKey::new(self.data_source_id, &self.file_path)
    }
}

/// A file as addressed through one data source.
///
/// Paths are resolved against the source's root, so the same path string
/// names different files in different sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct FileKey {
    pub data_source_id: Uuid,
    pub path: String,
}

impl FileKey {
    pub fn new(data_source_id: Uuid, path: &str) -> Self {
        Self {
            data_source_id,
            path: path.to_string(),
        }
    }
}

/// Everything the engine mutates; only the engine holds the lock.
#[derive(Debug, Default)]
pub(crate) struct SyncState {
    /// Keyed by table name
    pub tracked: HashMap<String, TrackedTable>,
    /// Last observed modification instant per file, in milliseconds
    pub timestamps: HashMap<FileKey, i64>,
    /// Number of pushes currently writing each file
    pub locks: HashMap<FileKey, usize>,
}

impl SyncState {
    pub fn tables_for_file(&self, key: &FileKey) -> Vec<String> {
        let mut names: Vec<String> = self
            .tracked
            .values()
            .filter(|t| t.data_source_id == key.data_source_id && t.file_path == key.path)
            .map(|t| t.table_name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn is_locked(&self, key: &FileKey) -> bool {
        self.locks.contains_key(key)
    }

    /// Record a modification instant unless a newer one is already known
    pub fn observe_timestamp(&mut self, key: FileKey, modified: i64) {
        self.timestamps
            .entry(key)
            .and_modify(|t| *t = (*t).max(modified))
            .or_insert(modified);
    }

    /// Forget timestamps of files no table tracks any more
    pub fn prune_timestamps(&mut self) {
        let keys: HashSet<FileKey> = self.tracked.values().map(TrackedTable::file_key).collect();
        self.timestamps.retain(|key, _| keys.contains(key));
    }
}

/// Holds the sync lock on one file until dropped.
///
/// Guards on the same file nest: the file stays locked until the last
/// one is dropped.
pub(crate) struct SyncLockGuard {
    state: Arc<Mutex<SyncState>>,
    key: FileKey,
}

impl SyncLockGuard {
    pub fn acquire(state: Arc<Mutex<SyncState>>, key: FileKey) -> Self {
        *state.lock().locks.entry(key.clone()).or_insert(0) += 1;
        Self { state, key }
    }
}

impl Drop for SyncLockGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(count) = state.locks.get_mut(&self.key) {
            *count -= 1;
            if *count == 0 {
                state.locks.remove(&self.key);
                tracing::trace!(path = %self.key.path, "sync lock released");
            }
        }
    }
}
