//! Data source registry
//!
//! Holds every configured data source, persists the collection after each
//! mutation and notifies subscribers. Connection state moves
//! `Disconnected -> Connecting -> Connected | Error`; only [`DataSourceRegistry::connect`]
//! leaves `Error`.

use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;
use websql_core::{ListenerSet, Result, Subscription, WebSqlError};
use websql_storage::{DATA_SOURCES_KEY, KeyValueStore, load_collection, save_collection};

use crate::{DataSource, DataSourceConfig, DataSourceStatus, DataSourceUpdate, GatewayRegistry};

/// Registry of configured data sources
pub struct DataSourceRegistry {
    store: Arc<dyn KeyValueStore>,
    gateways: Arc<GatewayRegistry>,
    sources: RwLock<Vec<DataSource>>,
    listeners: ListenerSet<Vec<DataSource>>,
}

impl DataSourceRegistry {
    /// Load the persisted data sources
    pub fn new(store: Arc<dyn KeyValueStore>, gateways: Arc<GatewayRegistry>) -> Self {
        let sources: Vec<DataSource> = load_collection(store.as_ref(), DATA_SOURCES_KEY);
        tracing::debug!(count = sources.len(), "data sources loaded");
        Self {
            store,
            gateways,
            sources: RwLock::new(sources),
            listeners: ListenerSet::new(),
        }
    }

    pub fn gateways(&self) -> &Arc<GatewayRegistry> {
        &self.gateways
    }

    pub fn all(&self) -> Vec<DataSource> {
        self.sources.read().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<DataSource> {
        self.sources.read().iter().find(|s| s.id == id).cloned()
    }

    /// Register a new, disconnected data source
    pub fn add(&self, name: &str, short_name: &str, config: DataSourceConfig) -> DataSource {
        let source = DataSource::new(name, short_name, config);
        tracing::info!(data_source_id = %source.id, kind = %source.kind(), name, "data source added");
        self.mutate(|sources| sources.push(source.clone()));
        source
    }

    /// Apply `patch`; the id and creation stamp never change
    pub fn update(&self, id: Uuid, patch: DataSourceUpdate) -> Option<DataSource> {
        self.modify(id, |source| {
            if let Some(name) = patch.name {
                source.name = name;
            }
            if let Some(short_name) = patch.short_name {
                source.short_name = short_name;
            }
            if let Some(config) = patch.config {
                source.config = config;
            }
        })
    }

    /// Set the connection state; `error` replaces any previous message
    pub fn update_status(&self, id: Uuid, status: DataSourceStatus, error: Option<String>) -> bool {
        self.modify(id, |source| {
            source.status = status;
            source.error = error;
        })
        .is_some()
    }

    /// Remove a data source. Tables tracked from it are left alone.
    pub fn delete(&self, id: Uuid) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        tracing::info!(data_source_id = %id, "data source deleted");
        self.mutate(|sources| sources.retain(|s| s.id != id));
        true
    }

    /// Listen for changes; the listener receives every data source
    pub fn subscribe(&self, listener: impl Fn(&Vec<DataSource>) + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    /// Check that `source` is usable without changing its state
    #[tracing::instrument(skip(self, source), fields(data_source_id = %source.id, kind = %source.kind()))]
    pub async fn test_connection(&self, source: &DataSource) -> Result<()> {
        match &source.config {
            DataSourceConfig::LocalDirectory(config) => {
                if config.path.trim().is_empty() {
                    return Err(WebSqlError::Configuration("Directory path is required".into()));
                }
                let gateway = self.gateways.for_source(source)?;
                gateway.list_directory(source, &config.path).await?;
            }
            DataSourceConfig::RemoteDatabase(config) => {
                if config.host.trim().is_empty()
                    || config.database.trim().is_empty()
                    || config.username.trim().is_empty()
                {
                    return Err(WebSqlError::Configuration(
                        "Missing required database connection parameters".into(),
                    ));
                }
            }
        }
        tracing::debug!("connection test passed");
        Ok(())
    }

    /// Test the source and record the outcome in its status.
    ///
    /// The failure is stored on the source and also returned.
    #[tracing::instrument(skip(self), fields(data_source_id = %id))]
    pub async fn connect(&self, id: Uuid) -> Result<()> {
        let source = self
            .get(id)
            .ok_or_else(|| WebSqlError::DataSourceNotFound(id.to_string()))?;

        self.update_status(id, DataSourceStatus::Connecting, None);

        match self.test_connection(&source).await {
            Ok(()) => {
                self.modify(id, |source| {
                    source.status = DataSourceStatus::Connected;
                    source.error = None;
                    source.last_sync_at = Some(Utc::now());
                });
                tracing::info!("data source connected");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "data source connection failed");
                self.update_status(id, DataSourceStatus::Error, Some(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn disconnect(&self, id: Uuid) -> bool {
        self.update_status(id, DataSourceStatus::Disconnected, None)
    }

    fn modify(&self, id: Uuid, f: impl FnOnce(&mut DataSource)) -> Option<DataSource> {
        if self.get(id).is_none() {
            return None;
        }
        self.mutate(|sources| {
            let source = sources.iter_mut().find(|s| s.id == id)?;
            let created_at = source.created_at;
            f(source);
            source.id = id;
            source.created_at = created_at;
            source.updated_at = Utc::now();
            Some(source.clone())
        })
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<DataSource>) -> R) -> R {
        let (result, snapshot) = {
            let mut sources = self.sources.write();
            let result = f(&mut sources);
            (result, sources.clone())
        };
        save_collection(self.store.as_ref(), DATA_SOURCES_KEY, &snapshot);
        self.listeners.notify(&snapshot);
        result
    }
}
