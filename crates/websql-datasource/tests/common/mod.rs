//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use tokio::sync::Notify;
use uuid::Uuid;
use websql_core::{
    ColumnMeta, QueryEngine, QueryResult, Result, Value, WebSqlError, delimited::write_delimited,
};
use websql_datasource::{
    DataSource, DataSourceConfig, DataSourceKind, DataSourceRegistry, DirEntry, FileContents,
    FileGateway, FileStat, GatewayRegistry, LocalDirConfig, SyncOptions, TableSyncEngine,
};
use websql_storage::MemoryStore;

#[derive(Debug, Clone, Default)]
pub struct MockTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn parse_delimited(text: &str) -> Result<MockTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let columns = reader
        .headers()
        .map_err(|e| WebSqlError::Engine(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| WebSqlError::Engine(e.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(MockTable { columns, rows })
}

/// In-memory query engine keeping every cell as text.
///
/// "Binary columnar" buffers are UTF-8 delimited text, which is enough to
/// exercise the Parquet code paths without a real engine.
#[derive(Default)]
pub struct MockEngine {
    pub tables: Mutex<HashMap<String, MockTable>>,
    pub import_counts: Mutex<HashMap<String, usize>>,
    pub executed: Mutex<Vec<String>>,
    pub fail_imports: AtomicBool,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn imports_of(&self, table: &str) -> usize {
        self.import_counts.lock().get(table).copied().unwrap_or(0)
    }

    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.lock().get(table).map(|t| t.rows.len())
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.lock().contains_key(table)
    }

    pub fn cell(&self, table: &str, row: usize, column: &str) -> Option<String> {
        let tables = self.tables.lock();
        let t = tables.get(table)?;
        let idx = t.columns.iter().position(|c| c == column)?;
        t.rows.get(row)?.get(idx).cloned()
    }

    /// Simulate an in-app cell edit
    pub fn set_cell(&self, table: &str, row: usize, column: &str, value: &str) {
        let mut tables = self.tables.lock();
        let t = tables.get_mut(table).expect("table exists");
        let idx = t.columns.iter().position(|c| c == column).expect("column exists");
        t.rows[row][idx] = value.to_string();
    }

    fn store(&self, table: &str, parsed: MockTable) {
        self.tables.lock().insert(table.to_string(), parsed);
        *self.import_counts.lock().entry(table.to_string()).or_default() += 1;
    }

    fn get_table(&self, table: &str) -> Result<MockTable> {
        self.tables
            .lock()
            .get(table)
            .cloned()
            .ok_or_else(|| WebSqlError::Engine(format!("Catalog Error: Table with name {} does not exist!", table)))
    }

    fn to_text(table: &MockTable, delimiter: u8) -> Result<String> {
        let rows: Vec<Vec<Value>> = table
            .rows
            .iter()
            .map(|r| r.iter().map(|c| Value::String(c.clone())).collect())
            .collect();
        write_delimited(&table.columns, &rows, delimiter)
    }
}

#[async_trait]
impl QueryEngine for MockEngine {
    fn engine_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        self.executed.lock().push(sql.to_string());
        if let Some(name) = sql.strip_prefix("SELECT * FROM ") {
            let table = self.get_table(name.trim_matches('"'))?;
            let rows = table
                .rows
                .iter()
                .map(|r| r.iter().map(|c| Value::String(c.clone())).collect())
                .collect();
            return Ok(QueryResult::from_rows(table.columns.clone(), rows));
        }
        Ok(QueryResult::empty())
    }

    async fn execute_script(&self, sql: &str) -> Result<()> {
        self.executed.lock().push(sql.to_string());
        Ok(())
    }

    async fn import_delimited_text(&self, table: &str, text: &str) -> Result<()> {
        if self.fail_imports.load(Ordering::SeqCst) {
            return Err(WebSqlError::Engine("Invalid Input Error: import failed".into()));
        }
        let parsed = parse_delimited(text)?;
        self.store(table, parsed);
        Ok(())
    }

    async fn import_binary_columnar(&self, table: &str, bytes: &[u8]) -> Result<()> {
        let text = String::from_utf8(bytes.to_vec()).map_err(|e| WebSqlError::Engine(e.to_string()))?;
        self.import_delimited_text(table, &text).await
    }

    async fn export_as_delimited_text(&self, table: &str, delimiter: u8) -> Result<String> {
        Self::to_text(&self.get_table(table)?, delimiter)
    }

    async fn export_as_binary_columnar(&self, table: &str) -> Result<Vec<u8>> {
        Ok(Self::to_text(&self.get_table(table)?, b',')?.into_bytes())
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        self.tables.lock().remove(table);
        Ok(())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnMeta>> {
        let t = self.get_table(table)?;
        Ok(t.columns
            .iter()
            .enumerate()
            .map(|(i, c)| ColumnMeta::new(c.clone(), "VARCHAR", i))
            .collect())
    }
}

/// Holds a read or write open until released, to interleave a push and a sweep
#[derive(Default)]
pub struct Gate {
    pub started: Notify,
    pub release: Notify,
}

struct MemoryFile {
    bytes: Vec<u8>,
    modified_at_ms: i64,
}

/// In-memory filesystem served as the local-directory gateway.
///
/// Every write advances a private clock by one second, so each write is
/// observable as a newer modification instant.
pub struct MemoryGateway {
    files: Mutex<HashMap<String, MemoryFile>>,
    clock: AtomicI64,
    pub fail_writes: AtomicBool,
    pub failing_stats: Mutex<Vec<String>>,
    pub write_gate: Mutex<Option<Arc<Gate>>>,
    /// Holds only the next read
    pub read_gate: Mutex<Option<Arc<Gate>>>,
    pub writes: AtomicUsize,
}

impl MemoryGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            files: Mutex::new(HashMap::new()),
            clock: AtomicI64::new(1_700_000_000_000),
            fail_writes: AtomicBool::new(false),
            failing_stats: Mutex::new(Vec::new()),
            write_gate: Mutex::new(None),
            read_gate: Mutex::new(None),
            writes: AtomicUsize::new(0),
        })
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(1000, Ordering::SeqCst) + 1000
    }

    /// Replace a file as an external program would
    pub fn put_file(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        let modified_at_ms = self.tick();
        self.files.lock().insert(
            path.to_string(),
            MemoryFile {
                bytes: bytes.into(),
                modified_at_ms,
            },
        );
    }

    pub fn text(&self, path: &str) -> Option<String> {
        self.files
            .lock()
            .get(path)
            .map(|f| String::from_utf8_lossy(&f.bytes).into_owned())
    }

    pub fn bytes(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().get(path).map(|f| f.bytes.clone())
    }

    pub fn modified_at(&self, path: &str) -> Option<i64> {
        self.files.lock().get(path).map(|f| f.modified_at_ms)
    }

    pub fn fail_stat(&self, path: &str) {
        self.failing_stats.lock().push(path.to_string());
    }

    pub fn gate_writes(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.write_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn gate_next_read(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.read_gate.lock() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl FileGateway for MemoryGateway {
    fn kind(&self) -> DataSourceKind {
        DataSourceKind::LocalDirectory
    }

    async fn read(&self, _source: &DataSource, path: &str) -> Result<Vec<u8>> {
        let gate = self.read_gate.lock().take();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        self.bytes(path)
            .ok_or_else(|| WebSqlError::NotFound(format!("Failed to read {}: file not found", path)))
    }

    async fn read_text(&self, source: &DataSource, path: &str) -> Result<String> {
        let bytes = self.read(source, path).await?;
        String::from_utf8(bytes).map_err(|e| WebSqlError::Io(format!("Failed to read {}: {}", path, e)))
    }

    async fn write(&self, _source: &DataSource, path: &str, contents: FileContents) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(WebSqlError::Io(format!("Failed to write {}: permission denied", path)));
        }
        self.put_file(path, contents.into_bytes());
        self.writes.fetch_add(1, Ordering::SeqCst);

        let gate = self.write_gate.lock().clone();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        Ok(())
    }

    async fn stat(&self, _source: &DataSource, path: &str) -> Result<FileStat> {
        if self.failing_stats.lock().iter().any(|p| p == path) {
            return Err(WebSqlError::Io(format!("Failed to stat {}: permission denied", path)));
        }
        let files = self.files.lock();
        let file = files
            .get(path)
            .ok_or_else(|| WebSqlError::NotFound(format!("Failed to stat {}: file not found", path)))?;
        Ok(FileStat::new(file.modified_at_ms, file.bytes.len() as u64))
    }

    async fn list_directory(&self, _source: &DataSource, path: &str) -> Result<Vec<DirEntry>> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let files = self.files.lock();
        let mut entries: Vec<DirEntry> = Vec::new();
        for (file_path, file) in files.iter() {
            let Some(rest) = file_path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    let dir_path = format!("{}{}", prefix, dir);
                    if !entries.iter().any(|e| e.path == dir_path) {
                        entries.push(DirEntry {
                            name: dir.to_string(),
                            path: dir_path,
                            is_directory: true,
                            size: None,
                            modified_at_ms: None,
                        });
                    }
                }
                None => entries.push(DirEntry {
                    name: rest.to_string(),
                    path: file_path.clone(),
                    is_directory: false,
                    size: Some(file.bytes.len() as u64),
                    modified_at_ms: Some(file.modified_at_ms),
                }),
            }
        }
        Ok(entries)
    }
}

/// A sync engine over a mock engine and an in-memory filesystem rooted at `/data`
pub struct Harness {
    pub engine: Arc<MockEngine>,
    pub gateway: Arc<MemoryGateway>,
    pub registry: Arc<DataSourceRegistry>,
    pub sync: Arc<TableSyncEngine>,
    pub source_id: Uuid,
    pub reloads: Arc<Mutex<Vec<String>>>,
    _reload_subscription: websql_core::Subscription,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(LocalDirConfig::new("/data"))
    }

    pub fn with_config(config: LocalDirConfig) -> Self {
        let engine = MockEngine::new();
        let gateway = MemoryGateway::new();

        let mut gateways = GatewayRegistry::with_defaults();
        gateways.register(gateway.clone());

        let registry = Arc::new(DataSourceRegistry::new(
            Arc::new(MemoryStore::new()),
            Arc::new(gateways),
        ));
        let source = registry.add("Data", "ds", DataSourceConfig::LocalDirectory(config));

        let sync = TableSyncEngine::new(engine.clone(), registry.clone(), SyncOptions::default());

        let reloads = Arc::new(Mutex::new(Vec::new()));
        let sink = reloads.clone();
        let subscription = sync.subscribe_to_table_reload(move |table| sink.lock().push(table.clone()));

        Self {
            engine,
            gateway,
            registry,
            sync,
            source_id: source.id,
            reloads,
            _reload_subscription: subscription,
        }
    }

    /// Harness whose data source is already connected
    pub async fn connected() -> Self {
        let harness = Self::new();
        harness.registry.connect(harness.source_id).await.unwrap();
        harness
    }

    /// Put a CSV file in place, import it as `table` and track it
    pub async fn track_csv(&self, table: &str, path: &str, contents: &str) {
        self.gateway.put_file(path, contents);
        self.engine.import_delimited_text(table, contents).await.unwrap();
        self.sync
            .track_table(table, self.source_id, path, None)
            .await
            .unwrap();
    }

    pub fn reloads_of(&self, table: &str) -> usize {
        self.reloads.lock().iter().filter(|t| *t == table).count()
    }
}
