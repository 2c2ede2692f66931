//! Unit tests for the DuckDB engine

use crate::engine::returns_rows;
use crate::DuckDbEngine;
use pretty_assertions::assert_eq;
use websql_core::{QueryEngine, Value, WebSqlError};

fn engine() -> DuckDbEngine {
    DuckDbEngine::open_in_memory().unwrap()
}

#[test]
fn test_engine_name_and_path() {
    let engine = engine();
    assert_eq!(engine.engine_name(), "duckdb");
    assert!(engine.is_memory());
}

#[test]
fn test_returns_rows() {
    assert!(returns_rows("SELECT 1"));
    assert!(returns_rows("  with t as (select 1) select * from t"));
    assert!(returns_rows("(SELECT 1) UNION (SELECT 2)"));
    assert!(returns_rows("DESCRIBE sales"));
    assert!(!returns_rows("UPDATE sales SET amount = 1"));
    assert!(!returns_rows("CREATE TABLE t (id INTEGER)"));
    assert!(!returns_rows(""));
}

#[tokio::test]
async fn test_import_and_query_delimited_text() {
    let engine = engine();
    engine
        .import_delimited_text("sales", "id,name,amount\n1,\"Smith, J.\",10\n2,Ada,20\n")
        .await
        .unwrap();

    let result = engine
        .execute("SELECT id, name, amount FROM sales ORDER BY id")
        .await
        .unwrap();
    assert_eq!(result.column_names(), vec!["id", "name", "amount"]);
    assert_eq!(result.row_count(), 2);
    assert_eq!(result.rows[0].get(0), Some(&Value::Int64(1)));
    assert_eq!(result.rows[0].get_by_name("name"), Some(&Value::String("Smith, J.".into())));
}

#[tokio::test]
async fn test_update_reports_affected_rows() {
    let engine = engine();
    engine.import_delimited_text("sales", "id,amount\n1,10\n2,20\n").await.unwrap();

    let result = engine.execute("UPDATE sales SET amount = 0 WHERE id = 2").await.unwrap();
    assert_eq!(result.affected_rows, 1);
    assert!(result.rows.is_empty());
}

#[tokio::test]
async fn test_export_quotes_delimited_fields() {
    let engine = engine();
    engine
        .execute_script("CREATE TABLE people (id INTEGER, name VARCHAR); INSERT INTO people VALUES (1, 'Smith, J.'), (2, NULL);")
        .await
        .unwrap();

    let text = engine.export_as_delimited_text("people", b',').await.unwrap();
    assert_eq!(text, "id,name\n1,\"Smith, J.\"\n2,\n");
}

#[tokio::test]
async fn test_binary_columnar_round_trip() {
    let engine = engine();
    engine
        .execute_script("CREATE TABLE events AS SELECT range AS id FROM range(3);")
        .await
        .unwrap();

    let bytes = engine.export_as_binary_columnar("events").await.unwrap();
    assert!(bytes.starts_with(b"PAR1"));

    engine.import_binary_columnar("events_copy", &bytes).await.unwrap();
    let result = engine.execute("SELECT count(*) FROM events_copy").await.unwrap();
    assert_eq!(result.rows[0].get(0), Some(&Value::Int64(3)));
}

#[tokio::test]
async fn test_describe_table() {
    let engine = engine();
    engine
        .execute_script("CREATE TABLE t (id INTEGER NOT NULL, label VARCHAR);")
        .await
        .unwrap();

    let columns = engine.describe_table("t").await.unwrap();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].name, "id");
    assert_eq!(columns[0].data_type, "INTEGER");
    assert!(!columns[0].nullable);
    assert_eq!(columns[1].ordinal, 1);
    assert!(columns[1].nullable);

    let err = engine.describe_table("missing").await.unwrap_err();
    assert!(matches!(err, WebSqlError::Engine(_)));
}

#[tokio::test]
async fn test_drop_table_is_idempotent() {
    let engine = engine();
    engine.execute_script("CREATE TABLE t (id INTEGER);").await.unwrap();
    engine.drop_table("t").await.unwrap();
    engine.drop_table("t").await.unwrap();
    assert!(engine.execute("SELECT * FROM t").await.is_err());
}

#[tokio::test]
async fn test_script_stops_at_first_error() {
    let engine = engine();
    let err = engine
        .execute_script("CREATE TABLE a (id INTEGER); CREATE TABLE oops ( ; CREATE TABLE c (id INTEGER);")
        .await
        .unwrap_err();
    assert!(matches!(err, WebSqlError::Engine(_)));
    assert!(engine.execute("SELECT * FROM c").await.is_err());
}

#[tokio::test]
async fn test_dates_come_back_as_text() {
    let engine = engine();
    let result = engine
        .execute("SELECT DATE '2024-03-01' AS d, TIMESTAMP '2024-03-01 12:30:00' AS ts")
        .await
        .unwrap();
    assert_eq!(result.rows[0].get(0), Some(&Value::String("2024-03-01".into())));
    assert_eq!(
        result.rows[0].get(1),
        Some(&Value::String("2024-03-01 12:30:00".into()))
    );
}
