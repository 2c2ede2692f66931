//! Startup restore of saved tables and views

use serde::Serialize;
use std::sync::Arc;
use websql_core::QueryEngine;
use websql_storage::{
    NewTableMetadata, SavedTable, SavedTableKind, SavedTableStore, TableMetadataStore, TableOrigin,
};

/// Outcome of a restore run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSummary {
    pub restored_count: usize,
    /// Display names of the records whose SQL failed to replay
    pub failed_names: Vec<String>,
}

impl RestoreSummary {
    pub fn is_complete(&self) -> bool {
        self.failed_names.is_empty()
    }
}

/// Replays saved SQL through the query engine
pub struct RestoreCoordinator {
    engine: Arc<dyn QueryEngine>,
    saved_tables: Arc<SavedTableStore>,
    metadata: Arc<TableMetadataStore>,
}

impl RestoreCoordinator {
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        saved_tables: Arc<SavedTableStore>,
        metadata: Arc<TableMetadataStore>,
    ) -> Self {
        Self {
            engine,
            saved_tables,
            metadata,
        }
    }

    /// Replay every saved table, then every saved view.
    ///
    /// Each record is replayed on its own; a failure is recorded and the run
    /// continues. Every restored record gets a fresh `Sql` metadata entry.
    #[tracing::instrument(skip(self))]
    pub async fn restore_all_tables(&self) -> RestoreSummary {
        let (tables, views): (Vec<SavedTable>, Vec<SavedTable>) = self
            .saved_tables
            .all()
            .into_iter()
            .partition(|saved| saved.kind == SavedTableKind::Table);

        let mut summary = RestoreSummary::default();
        for saved in tables.iter().chain(views.iter()) {
            match self.engine.execute_script(&saved.sql).await {
                Ok(()) => {
                    summary.restored_count += 1;
                    self.metadata.create(
                        &saved.original_name,
                        NewTableMetadata::with_origin(TableOrigin::Sql),
                    );
                    tracing::debug!(name = %saved.name, kind = ?saved.kind, "saved table restored");
                }
                Err(e) => {
                    tracing::error!(name = %saved.name, kind = ?saved.kind, error = %e, "failed to restore saved table");
                    summary.failed_names.push(saved.name.clone());
                }
            }
        }

        tracing::info!(
            restored = summary.restored_count,
            failed = summary.failed_names.len(),
            "restore finished"
        );
        summary
    }
}
