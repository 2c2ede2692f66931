//! DuckDB query engine implementation

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeDelta};
use duckdb::types::{TimeUnit, ValueRef};
use std::io::Write;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;
use websql_core::{
    ColumnMeta, QueryEngine, QueryResult, Result, Row, Value, WebSqlError, delimited::write_delimited,
    quote_identifier, quote_literal,
};

/// DuckDB-backed [`QueryEngine`].
///
/// Runs in-memory (`:memory:`) or persists to a database file. All calls
/// share one connection.
pub struct DuckDbEngine {
    connection: Mutex<duckdb::Connection>,
    path: String,
}

impl DuckDbEngine {
    /// Open (or create) a database; `:memory:` opens an in-memory one
    #[tracing::instrument]
    pub fn open(path: &str) -> Result<Self> {
        let connection = if path == ":memory:" {
            duckdb::Connection::open_in_memory()
        } else {
            duckdb::Connection::open(path)
        }
        .map_err(|e| WebSqlError::Engine(format!("Failed to open DuckDB database: {}", e)))?;

        tracing::debug!("DuckDB engine opened");
        Ok(Self {
            connection: Mutex::new(connection),
            path: path.to_string(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_memory(&self) -> bool {
        self.path == ":memory:"
    }

    fn connection(&self) -> Result<MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| WebSqlError::Engine(format!("Lock poisoned: {}", e)))
    }

    fn query(&self, sql: &str) -> Result<QueryResult> {
        let start = std::time::Instant::now();
        let conn = self.connection()?;

        let mut stmt = conn.prepare(sql).map_err(engine_error)?;
        let mut duckdb_rows = stmt.query([]).map_err(engine_error)?;

        let column_names: Vec<String> = duckdb_rows
            .as_ref()
            .map(|r| r.column_names().iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();
        let column_count = column_names.len();

        let columns: Vec<ColumnMeta> = column_names
            .iter()
            .enumerate()
            .map(|(idx, name)| ColumnMeta::new(name.clone(), "TEXT", idx))
            .collect();

        let mut rows = Vec::new();
        while let Some(row) = duckdb_rows.next().map_err(engine_error)? {
            let values = (0..column_count).map(|i| row_to_value(row, i)).collect();
            rows.push(Row::new(column_names.clone(), values));
        }

        let execution_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            row_count = rows.len(),
            duration_ms = execution_time_ms,
            "query completed"
        );

        Ok(QueryResult {
            id: Uuid::new_v4(),
            columns,
            rows,
            affected_rows: 0,
            execution_time_ms,
        })
    }

    fn statement(&self, sql: &str) -> Result<QueryResult> {
        let start = std::time::Instant::now();
        let conn = self.connection()?;
        let affected = conn.execute(sql, []).map_err(engine_error)?;

        let execution_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            affected_rows = affected,
            duration_ms = execution_time_ms,
            "execute completed"
        );

        Ok(QueryResult {
            affected_rows: affected as u64,
            execution_time_ms,
            ..QueryResult::empty()
        })
    }

    /// Stage `bytes` in a temp file and create `table` from it with `reader`
    fn import_via_file(&self, table: &str, bytes: &[u8], suffix: &str, reader: &str) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("websql-import-")
            .suffix(suffix)
            .tempfile()
            .map_err(|e| WebSqlError::Io(format!("Failed to create staging file: {}", e)))?;
        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| WebSqlError::Io(format!("Failed to write staging file: {}", e)))?;

        let source = quote_literal(&file.path().to_string_lossy());
        let sql = format!(
            "CREATE OR REPLACE TABLE {} AS SELECT * FROM {}",
            quote_identifier(table),
            reader.replace("{path}", &source)
        );
        self.connection()?.execute_batch(&sql).map_err(engine_error)?;

        tracing::debug!(table, bytes = bytes.len(), "table imported");
        Ok(())
    }
}

#[async_trait]
impl QueryEngine for DuckDbEngine {
    fn engine_name(&self) -> &str {
        "duckdb"
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        if returns_rows(sql) {
            self.query(sql)
        } else {
            self.statement(sql)
        }
    }

    async fn execute_script(&self, sql: &str) -> Result<()> {
        self.connection()?.execute_batch(sql).map_err(engine_error)
    }

    #[tracing::instrument(skip(self, text), fields(len = text.len()))]
    async fn import_delimited_text(&self, table: &str, text: &str) -> Result<()> {
        self.import_via_file(table, text.as_bytes(), ".csv", "read_csv_auto({path}, header = true)")
    }

    #[tracing::instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn import_binary_columnar(&self, table: &str, bytes: &[u8]) -> Result<()> {
        self.import_via_file(table, bytes, ".parquet", "read_parquet({path})")
    }

    async fn export_as_delimited_text(&self, table: &str, delimiter: u8) -> Result<String> {
        let result = self.query(&format!("SELECT * FROM {}", quote_identifier(table)))?;
        let rows: Vec<Vec<Value>> = result.rows.into_iter().map(|r| r.values).collect();
        write_delimited(&result.columns.into_iter().map(|c| c.name).collect::<Vec<_>>(), &rows, delimiter)
    }

    #[tracing::instrument(skip(self))]
    async fn export_as_binary_columnar(&self, table: &str) -> Result<Vec<u8>> {
        let dir = tempfile::tempdir()
            .map_err(|e| WebSqlError::Io(format!("Failed to create export directory: {}", e)))?;
        let target = dir.path().join("export.parquet");

        let sql = format!(
            "COPY {} TO {} (FORMAT PARQUET)",
            quote_identifier(table),
            quote_literal(&target.to_string_lossy())
        );
        self.connection()?.execute_batch(&sql).map_err(engine_error)?;

        std::fs::read(&target).map_err(|e| WebSqlError::Io(format!("Failed to read exported parquet: {}", e)))
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        let sql = format!("DROP TABLE IF EXISTS {}", quote_identifier(table));
        self.connection()?.execute_batch(&sql).map_err(engine_error)
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnMeta>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
                 WHERE table_name = ? ORDER BY ordinal_position",
            )
            .map_err(engine_error)?;

        let columns = stmt
            .query_map(duckdb::params![table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(engine_error)?
            .enumerate()
            .map(|(ordinal, row)| {
                let (name, data_type, nullable) = row.map_err(engine_error)?;
                let mut meta = ColumnMeta::new(name, data_type, ordinal);
                meta.nullable = nullable.eq_ignore_ascii_case("YES");
                Ok(meta)
            })
            .collect::<Result<Vec<_>>>()?;

        if columns.is_empty() {
            return Err(WebSqlError::Engine(format!(
                "Catalog Error: Table with name {} does not exist!",
                table
            )));
        }
        Ok(columns)
    }
}

impl std::fmt::Debug for DuckDbEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbEngine").field("path", &self.path).finish()
    }
}

fn engine_error(e: duckdb::Error) -> WebSqlError {
    WebSqlError::Engine(e.to_string())
}

/// Whether `sql` produces a result set rather than an affected-row count
pub(crate) fn returns_rows(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .trim_start_matches('(')
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(
        keyword.as_str(),
        "SELECT"
            | "WITH"
            | "FROM"
            | "VALUES"
            | "TABLE"
            | "SHOW"
            | "DESCRIBE"
            | "SUMMARIZE"
            | "PRAGMA"
            | "EXPLAIN"
    )
}

fn row_to_value(row: &duckdb::Row, idx: usize) -> Value {
    let Ok(value) = row.get_ref(idx) else {
        return Value::Null;
    };
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(n) => Value::Int64(n.into()),
        ValueRef::SmallInt(n) => Value::Int64(n.into()),
        ValueRef::Int(n) => Value::Int64(n.into()),
        ValueRef::BigInt(n) => Value::Int64(n),
        ValueRef::UTinyInt(n) => Value::Int64(n.into()),
        ValueRef::USmallInt(n) => Value::Int64(n.into()),
        ValueRef::UInt(n) => Value::Int64(n.into()),
        ValueRef::UBigInt(n) => i64::try_from(n)
            .map(Value::Int64)
            .unwrap_or_else(|_| Value::Decimal(n.to_string())),
        ValueRef::HugeInt(n) => i64::try_from(n)
            .map(Value::Int64)
            .unwrap_or_else(|_| Value::Decimal(n.to_string())),
        ValueRef::Float(n) => Value::Float64(n.into()),
        ValueRef::Double(n) => Value::Float64(n),
        ValueRef::Decimal(d) => Value::Decimal(d.to_string()),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
        ValueRef::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(TimeDelta::days(days.into())))
            .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        ValueRef::Timestamp(unit, raw) => timestamp_text(unit, raw)
            .map(Value::String)
            .unwrap_or(Value::Null),
        // Anything else (time, interval, nested types) goes through text
        _ => row
            .get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

fn timestamp_text(unit: TimeUnit, raw: i64) -> Option<String> {
    let micros = match unit {
        TimeUnit::Second => raw.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => raw.checked_mul(1_000)?,
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    };
    let ts = DateTime::from_timestamp_micros(micros)?;
    Some(ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string())
}
