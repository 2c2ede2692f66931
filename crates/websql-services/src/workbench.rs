//! The workbench service object
//!
//! Built once at process start and handed to every front end. Owns the
//! query engine, the persisted collections, the data-source registry and the
//! sync engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;
use websql_core::{QueryEngine, QueryResult, Value, quote_identifier};
use websql_datasource::{DataSourceRegistry, GatewayRegistry, TableSyncEngine};
use websql_driver_duckdb::DuckDbEngine;
use websql_storage::{
    KeyValueStore, NewTableMetadata, SavedQueryStore, SavedTable, SavedTableStore, SqliteStore,
    TableMetadataStore, TableOrigin,
};

use crate::error::{ServiceError, ServiceResult};
use crate::restore::{RestoreCoordinator, RestoreSummary};
use crate::settings::WorkbenchSettings;
use crate::sql_export::export_table_as_sql;

pub struct Workbench {
    engine: Arc<dyn QueryEngine>,
    sources: Arc<DataSourceRegistry>,
    sync: Arc<TableSyncEngine>,
    saved_queries: Arc<SavedQueryStore>,
    saved_tables: Arc<SavedTableStore>,
    metadata: Arc<TableMetadataStore>,
    auto_watch: bool,
    ready: AtomicBool,
}

impl Workbench {
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        store: Arc<dyn KeyValueStore>,
        gateways: GatewayRegistry,
        settings: &WorkbenchSettings,
    ) -> Self {
        let sources = Arc::new(DataSourceRegistry::new(store.clone(), Arc::new(gateways)));
        let sync = TableSyncEngine::new(engine.clone(), sources.clone(), settings.sync_options());

        Self {
            engine,
            sources,
            sync,
            saved_queries: Arc::new(SavedQueryStore::new(store.clone())),
            saved_tables: Arc::new(SavedTableStore::new(store.clone())),
            metadata: Arc::new(TableMetadataStore::new(store)),
            auto_watch: settings.watch_on_startup,
            ready: AtomicBool::new(false),
        }
    }

    /// Open the DuckDB database and the on-disk store named by `settings`
    #[tracing::instrument(skip(settings), fields(database = %settings.database_path))]
    pub fn open(settings: &WorkbenchSettings) -> ServiceResult<Self> {
        let engine = DuckDbEngine::open(&settings.database_path)?;
        let storage_path = settings
            .storage_path()
            .map_err(|e| ServiceError::StartupFailed(format!("{:#}", e)))?;
        let store = SqliteStore::open(&storage_path)?;

        Ok(Self::new(
            Arc::new(engine),
            Arc::new(store),
            GatewayRegistry::with_defaults(),
            settings,
        ))
    }

    /// Restore saved tables and views, then mark the database ready
    #[tracing::instrument(skip(self))]
    pub async fn bootstrap(&self) -> RestoreSummary {
        self.ready.store(false, Ordering::SeqCst);
        let summary = RestoreCoordinator::new(
            self.engine.clone(),
            self.saved_tables.clone(),
            self.metadata.clone(),
        )
        .restore_all_tables()
        .await;
        self.ready.store(true, Ordering::SeqCst);
        tracing::info!(engine = self.engine.engine_name(), "workbench ready");
        summary
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn ensure_ready(&self) -> ServiceResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(ServiceError::NotReady)
        }
    }

    pub fn engine(&self) -> &Arc<dyn QueryEngine> {
        &self.engine
    }

    pub fn sources(&self) -> &Arc<DataSourceRegistry> {
        &self.sources
    }

    pub fn sync(&self) -> &Arc<TableSyncEngine> {
        &self.sync
    }

    pub fn saved_queries(&self) -> &Arc<SavedQueryStore> {
        &self.saved_queries
    }

    pub fn saved_tables(&self) -> &Arc<SavedTableStore> {
        &self.saved_tables
    }

    pub fn metadata(&self) -> &Arc<TableMetadataStore> {
        &self.metadata
    }

    /// Import a file of a data source as a tracked table and record where it
    /// came from. Returns the table name.
    #[tracing::instrument(skip(self), fields(data_source_id = %data_source_id))]
    pub async fn open_file(
        &self,
        data_source_id: Uuid,
        file_path: &str,
        sheet_name: Option<&str>,
    ) -> ServiceResult<String> {
        self.ensure_ready()?;
        let table_name = self
            .sync
            .open_file(data_source_id, file_path, sheet_name)
            .await?;
        if !self.auto_watch {
            self.sync.stop_file_watcher();
        }

        let file_name = file_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_path)
            .to_string();
        self.metadata.create(
            &table_name,
            NewTableMetadata {
                original_filename: Some(file_name),
                row_count: self.row_count(&table_name).await,
                ..NewTableMetadata::with_origin(TableOrigin::File)
            },
        );
        Ok(table_name)
    }

    /// Apply an in-app edit to `table_name` and mirror it.
    ///
    /// The statement's own failure is returned. Once it has succeeded the
    /// edit stands: a failed push to the backing file or a failed refresh of
    /// the saved SQL is logged only.
    #[tracing::instrument(skip(self, statement))]
    pub async fn apply_cell_edit(&self, table_name: &str, statement: &str) -> ServiceResult<QueryResult> {
        self.ensure_ready()?;
        let result = self.engine.execute(statement).await?;

        if self.sync.is_tracked(table_name) {
            if let Err(e) = self.sync.push(table_name).await {
                tracing::warn!(error = %e, "edit applied but the backing file was not updated");
            }
        }

        if let Some(saved) = self.saved_tables.find_by_original_name(table_name) {
            match export_table_as_sql(self.engine.as_ref(), table_name).await {
                Ok(exported) => {
                    self.saved_tables.update(saved.id, None, Some(&exported.sql));
                }
                Err(e) => tracing::warn!(error = %e, "edit applied but the saved table was not refreshed"),
            }
        }

        Ok(result)
    }

    /// Save a table or view so it is rebuilt on the next start
    #[tracing::instrument(skip(self))]
    pub async fn save_table(&self, table_name: &str, display_name: Option<&str>) -> ServiceResult<SavedTable> {
        self.ensure_ready()?;
        let exported = export_table_as_sql(self.engine.as_ref(), table_name).await?;
        Ok(self.saved_tables.save(
            display_name.unwrap_or(table_name),
            table_name,
            exported.kind,
            &exported.sql,
        ))
    }

    /// Drop a table and forget its tracking and metadata. A saved record, if
    /// any, is kept.
    #[tracing::instrument(skip(self))]
    pub async fn drop_table(&self, table_name: &str) -> ServiceResult<()> {
        self.ensure_ready()?;
        self.engine.drop_table(table_name).await?;
        self.sync.untrack_table(table_name);
        self.metadata.delete(table_name);
        Ok(())
    }

    /// Delete a data source and stop tracking every table opened from it.
    ///
    /// Returns the untracked table names, or `None` when the source does not
    /// exist.
    #[tracing::instrument(skip(self))]
    pub fn delete_data_source(&self, id: Uuid) -> Option<Vec<String>> {
        if !self.sources.delete(id) {
            return None;
        }
        let untracked = self.sync.untrack_data_source(id);
        if !untracked.is_empty() {
            tracing::info!(tables = ?untracked, "tables untracked with their data source");
        }
        Some(untracked)
    }

    async fn row_count(&self, table_name: &str) -> Option<u64> {
        let sql = format!("SELECT count(*) FROM {}", quote_identifier(table_name));
        match self.engine.execute(&sql).await {
            Ok(result) => result
                .rows
                .first()
                .and_then(|row| row.get(0))
                .and_then(Value::as_i64)
                .and_then(|n| u64::try_from(n).ok()),
            Err(e) => {
                tracing::debug!(error = %e, "row count unavailable");
                None
            }
        }
    }
}
