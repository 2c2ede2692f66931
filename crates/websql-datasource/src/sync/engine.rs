use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;
use uuid::Uuid;
use websql_core::{
    FileFormat, ListenerSet, QueryEngine, Result, Subscription, WebSqlError, quote_identifier,
};

use super::state::{FileKey, SyncLockGuard, SyncState};
use super::{ChangeSource, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SHEET_NAME, PollingChangeSource, TrackedTable};
use crate::xlsx::{self, Sheet};
use crate::{DataSource, DataSourceRegistry, FileContents, FileGateway, GatewayRegistry, naming};

/// Tunables of the sync engine
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Time between two sweeps of the polling change source
    pub poll_interval: Duration,
    /// Sheet a workbook table is written to when it has no sheet name
    pub default_sheet_name: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            default_sheet_name: DEFAULT_SHEET_NAME.to_string(),
        }
    }
}

/// File contents converted for import
enum ImportPayload {
    Delimited(String),
    Columnar(Vec<u8>),
}

/// Mirrors tracked tables to and from their files
pub struct TableSyncEngine {
    engine: Arc<dyn QueryEngine>,
    sources: Arc<DataSourceRegistry>,
    gateways: Arc<GatewayRegistry>,
    options: SyncOptions,
    state: Arc<Mutex<SyncState>>,
    reload_listeners: ListenerSet<String>,
    change_source: Box<dyn ChangeSource>,
    this: Weak<TableSyncEngine>,
}

impl TableSyncEngine {
    /// Create an engine polling on `options.poll_interval`
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        sources: Arc<DataSourceRegistry>,
        options: SyncOptions,
    ) -> Arc<Self> {
        let change_source = Box::new(PollingChangeSource::new(options.poll_interval));
        Self::with_change_source(engine, sources, options, change_source)
    }

    /// Create an engine driven by a custom change source
    pub fn with_change_source(
        engine: Arc<dyn QueryEngine>,
        sources: Arc<DataSourceRegistry>,
        options: SyncOptions,
        change_source: Box<dyn ChangeSource>,
    ) -> Arc<Self> {
        let gateways = sources.gateways().clone();
        Arc::new_cyclic(|this| Self {
            engine,
            sources,
            gateways,
            options,
            state: Arc::new(Mutex::new(SyncState::default())),
            reload_listeners: ListenerSet::new(),
            change_source,
            this: this.clone(),
        })
    }

    // ---- tracking ----

    /// Track `table_name` as a mirror of `file_path`.
    ///
    /// Re-tracking a name replaces its previous mapping. The file's current
    /// modification instant is recorded if it can be read; otherwise the
    /// first sweep establishes it. Starts the change source if needed.
    #[tracing::instrument(skip(self), fields(data_source_id = %data_source_id))]
    pub async fn track_table(
        &self,
        table_name: &str,
        data_source_id: Uuid,
        file_path: &str,
        sheet_name: Option<&str>,
    ) -> Result<TrackedTable> {
        let format = FileFormat::from_path(file_path).ok_or_else(|| {
            WebSqlError::NotSupported(format!("Cannot sync {}: unsupported file format", file_path))
        })?;

        let tracked = TrackedTable {
            table_name: table_name.to_string(),
            data_source_id,
            file_path: file_path.to_string(),
            sheet_name: sheet_name.map(str::to_string),
            format,
        };
        {
            let mut state = self.state.lock();
            state.tracked.insert(table_name.to_string(), tracked.clone());
            state.prune_timestamps();
        }
        tracing::debug!(%format, "table tracked");

        if let Some(source) = self.sources.get(data_source_id) {
            match self.stat_file(&source, file_path).await {
                Ok(modified) => {
                    self.state
                        .lock()
                        .timestamps
                        .insert(tracked.file_key(), modified);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "initial stat failed, deferring to first sweep");
                }
            }
        }

        if !self.change_source.is_running() {
            self.start_file_watcher();
        }
        Ok(tracked)
    }

    /// Stop tracking a table; returns whether it was tracked
    pub fn untrack_table(&self, table_name: &str) -> bool {
        let mut state = self.state.lock();
        let removed = state.tracked.remove(table_name).is_some();
        state.prune_timestamps();
        removed
    }

    /// Stop tracking every table of a data source, returning their names
    pub fn untrack_data_source(&self, data_source_id: Uuid) -> Vec<String> {
        let mut state = self.state.lock();
        let mut removed: Vec<String> = state
            .tracked
            .values()
            .filter(|t| t.data_source_id == data_source_id)
            .map(|t| t.table_name.clone())
            .collect();
        for name in &removed {
            state.tracked.remove(name);
        }
        state.prune_timestamps();
        removed.sort();
        if !removed.is_empty() {
            tracing::debug!(data_source_id = %data_source_id, count = removed.len(), "tables untracked");
        }
        removed
    }

    pub fn is_tracked(&self, table_name: &str) -> bool {
        self.state.lock().tracked.contains_key(table_name)
    }

    pub fn tracked_info(&self, table_name: &str) -> Option<TrackedTable> {
        self.state.lock().tracked.get(table_name).cloned()
    }

    pub fn tracked_names(&self) -> HashSet<String> {
        self.state.lock().tracked.keys().cloned().collect()
    }

    /// Last modification instant observed for `file_path` of a data source
    pub fn file_timestamp(&self, data_source_id: Uuid, file_path: &str) -> Option<i64> {
        let key = FileKey::new(data_source_id, file_path);
        self.state.lock().timestamps.get(&key).copied()
    }

    /// Whether a push is currently writing `file_path` of a data source
    pub fn is_sync_locked(&self, data_source_id: Uuid, file_path: &str) -> bool {
        self.state
            .lock()
            .is_locked(&FileKey::new(data_source_id, file_path))
    }

    /// Be told (with the table name) after every successful pull
    pub fn subscribe_to_table_reload(
        &self,
        listener: impl Fn(&String) + Send + Sync + 'static,
    ) -> Subscription {
        self.reload_listeners.subscribe(listener)
    }

    // ---- opening files ----

    /// Import a file of a data source as a new tracked table and return the
    /// table name.
    #[tracing::instrument(skip(self), fields(data_source_id = %data_source_id))]
    pub async fn open_file(&self, data_source_id: Uuid, file_path: &str, sheet_name: Option<&str>) -> Result<String> {
        let source = self.source(data_source_id)?;
        if source.short_name.trim().is_empty() {
            return Err(WebSqlError::Configuration(format!(
                "Data source {} needs a short name before files can be imported",
                source.name
            )));
        }
        let format = FileFormat::from_path(file_path).ok_or_else(|| {
            WebSqlError::NotSupported(format!("Cannot import {}: unsupported file format", file_path))
        })?;

        let table_name = naming::table_name_for(&source.short_name, file_path, sheet_name);
        let gateway = self.gateways.for_source(&source)?;
        let payload = self
            .read_payload(gateway.as_ref(), &source, file_path, format, sheet_name)
            .await?;
        self.replace_table(&table_name, payload).await?;

        self.track_table(&table_name, data_source_id, file_path, sheet_name)
            .await?;
        tracing::info!(table = %table_name, "file opened");
        Ok(table_name)
    }

    /// Read a text file (SQL script, notes...) of a data source
    pub async fn read_text_file(&self, data_source_id: Uuid, file_path: &str) -> Result<String> {
        let source = self.source(data_source_id)?;
        let gateway = self.gateways.for_source(&source)?;
        gateway.read_text(&source, file_path).await
    }

    // ---- pull ----

    /// Reload a table from its file and notify reload subscribers.
    ///
    /// The file is read and converted before the table is dropped. If the
    /// drop succeeds but the import fails the table is left absent.
    #[tracing::instrument(skip(self))]
    pub async fn pull(&self, table_name: &str) -> Result<()> {
        match self.pull_inner(table_name).await {
            Ok(()) => {
                tracing::info!("table reloaded from file");
                self.reload_listeners.notify(&table_name.to_string());
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to reload table from file");
                Err(e)
            }
        }
    }

    async fn pull_inner(&self, table_name: &str) -> Result<()> {
        let tracked = self.tracked(table_name)?;
        let source = self.source(tracked.data_source_id)?;
        let gateway = self.gateways.for_source(&source)?;

        let payload = self
            .read_payload(
                gateway.as_ref(),
                &source,
                &tracked.file_path,
                tracked.format,
                tracked.sheet_name.as_deref(),
            )
            .await?;
        self.replace_table(table_name, payload).await?;

        match gateway.stat(&source, &tracked.file_path).await {
            Ok(stat) => {
                self.state
                    .lock()
                    .observe_timestamp(tracked.file_key(), stat.modified_at_ms);
            }
            Err(e) => tracing::warn!(error = %e, "failed to refresh timestamp after reload"),
        }
        Ok(())
    }

    async fn read_payload(
        &self,
        gateway: &dyn FileGateway,
        source: &DataSource,
        file_path: &str,
        format: FileFormat,
        sheet_name: Option<&str>,
    ) -> Result<ImportPayload> {
        Ok(match format {
            FileFormat::Csv => ImportPayload::Delimited(gateway.read_text(source, file_path).await?),
            FileFormat::Parquet => ImportPayload::Columnar(gateway.read(source, file_path).await?),
            FileFormat::Xlsx => {
                let bytes = gateway.read(source, file_path).await?;
                ImportPayload::Delimited(xlsx::sheet_to_delimited(&bytes, sheet_name, b',')?)
            }
        })
    }

    async fn replace_table(&self, table_name: &str, payload: ImportPayload) -> Result<()> {
        self.engine.drop_table(table_name).await?;
        match payload {
            ImportPayload::Delimited(text) => self.engine.import_delimited_text(table_name, &text).await,
            ImportPayload::Columnar(bytes) => self.engine.import_binary_columnar(table_name, &bytes).await,
        }
    }

    // ---- push ----

    /// Write a table's current contents back to its file.
    ///
    /// A no-op when the data source has sync disabled. The file is sync
    /// locked from before the write until after the timestamp refresh,
    /// whether or not the write succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn push(&self, table_name: &str) -> Result<()> {
        let tracked = self.tracked(table_name)?;
        let source = self.source(tracked.data_source_id)?;

        if !source.sync_enabled() {
            tracing::debug!("sync disabled for data source, skipping push");
            return Ok(());
        }
        let gateway = self.gateways.for_source(&source)?;

        let _lock = SyncLockGuard::acquire(self.state.clone(), tracked.file_key());

        if let Err(e) = self.write_back(gateway.as_ref(), &source, &tracked).await {
            tracing::error!(error = %e, path = %tracked.file_path, "failed to write table to file");
            return Err(e);
        }

        match gateway.stat(&source, &tracked.file_path).await {
            Ok(stat) => {
                self.state
                    .lock()
                    .observe_timestamp(tracked.file_key(), stat.modified_at_ms);
            }
            Err(e) => tracing::warn!(error = %e, "failed to refresh timestamp after write"),
        }
        tracing::debug!(path = %tracked.file_path, "table written to file");
        Ok(())
    }

    async fn write_back(&self, gateway: &dyn FileGateway, source: &DataSource, tracked: &TrackedTable) -> Result<()> {
        let table = tracked.table_name.as_str();
        let path = tracked.file_path.as_str();

        match tracked.format {
            FileFormat::Csv => {
                let text = self.engine.export_as_delimited_text(table, b',').await?;
                gateway.write(source, path, FileContents::Text(text)).await
            }
            FileFormat::Parquet => {
                let bytes = self.engine.export_as_binary_columnar(table).await?;
                gateway.write(source, path, FileContents::Bytes(bytes)).await
            }
            FileFormat::Xlsx => {
                let result = self
                    .engine
                    .execute(&format!("SELECT * FROM {}", quote_identifier(table)))
                    .await?;
                let existing = match gateway.read(source, path).await {
                    Ok(bytes) => Some(bytes),
                    Err(e) if e.is_not_found() => None,
                    Err(e) => return Err(e),
                };
                let sheet_name = tracked
                    .sheet_name
                    .as_deref()
                    .unwrap_or(&self.options.default_sheet_name);
                let bytes = xlsx::replace_sheet(existing.as_deref(), Sheet::from_result(sheet_name, &result))?;
                gateway.write(source, path, FileContents::Bytes(bytes)).await
            }
        }
    }

    // ---- change detection ----

    /// Begin sweeping tracked files; restarts the change source if running
    pub fn start_file_watcher(&self) {
        self.change_source.start(self.this.clone());
    }

    pub fn stop_file_watcher(&self) {
        self.change_source.stop();
    }

    pub fn is_watching(&self) -> bool {
        self.change_source.is_running()
    }

    /// Check every tracked file once and pull tables whose file changed.
    ///
    /// Never fails: per-file problems are logged and the file is skipped
    /// until the next sweep.
    pub async fn sweep(&self) {
        let tracked: Vec<TrackedTable> = {
            let state = self.state.lock();
            let mut tables: Vec<TrackedTable> = state.tracked.values().cloned().collect();
            tables.sort_by(|a, b| a.table_name.cmp(&b.table_name));
            tables
        };
        let mut pulled: HashSet<String> = HashSet::new();

        for table in tracked {
            let Some(source) = self.sources.get(table.data_source_id) else {
                tracing::trace!(table = %table.table_name, "data source gone, skipping");
                continue;
            };
            if !source.is_connected() || !source.watch_enabled() {
                continue;
            }
            let key = table.file_key();
            if self.state.lock().is_locked(&key) {
                tracing::trace!(path = %table.file_path, "file is being written, skipping");
                continue;
            }

            let modified = match self.stat_file(&source, &table.file_path).await {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::warn!(path = %table.file_path, error = %e, "failed to stat tracked file");
                    continue;
                }
            };

            // a push may have started while the stat was in flight
            let previous = {
                let state = self.state.lock();
                if state.is_locked(&key) {
                    continue;
                }
                state.timestamps.get(&key).copied()
            };

            if previous.is_some_and(|previous| modified > previous) {
                tracing::info!(path = %table.file_path, "external file change detected");
                let targets = match table.format {
                    FileFormat::Xlsx => self.state.lock().tables_for_file(&key),
                    _ => vec![table.table_name.clone()],
                };
                for name in targets {
                    if pulled.insert(name.clone()) {
                        // failure is logged by pull
                        let _ = self.pull(&name).await;
                    }
                }
            }

            // pulls await, and a push finishing meanwhile has stored a newer instant
            self.state.lock().observe_timestamp(key, modified);
        }
    }

    // ---- helpers ----

    async fn stat_file(&self, source: &DataSource, file_path: &str) -> Result<i64> {
        let gateway = self.gateways.for_source(source)?;
        Ok(gateway.stat(source, file_path).await?.modified_at_ms)
    }

    fn tracked(&self, table_name: &str) -> Result<TrackedTable> {
        self.tracked_info(table_name)
            .ok_or_else(|| WebSqlError::NotTracked(table_name.to_string()))
    }

    fn source(&self, id: Uuid) -> Result<DataSource> {
        self.sources
            .get(id)
            .ok_or_else(|| WebSqlError::DataSourceNotFound(id.to_string()))
    }
}

impl Drop for TableSyncEngine {
    fn drop(&mut self) {
        self.change_source.stop();
    }
}
