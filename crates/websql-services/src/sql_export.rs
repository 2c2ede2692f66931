//! Table and view export as replayable SQL

use websql_core::{QueryEngine, Value, WebSqlError, quote_identifier, quote_literal};
use websql_storage::SavedTableKind;

use crate::error::{ServiceError, ServiceResult};

/// SQL that recreates a table or view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSql {
    pub kind: SavedTableKind,
    pub sql: String,
}

/// Export `table` as SQL.
///
/// A view comes back as its stored definition. A table becomes a
/// `CREATE TABLE` followed by one multi-row `INSERT` holding its current
/// rows (omitted when the table is empty).
#[tracing::instrument(skip(engine))]
pub async fn export_table_as_sql(engine: &dyn QueryEngine, table: &str) -> ServiceResult<TableSql> {
    let failed = |e: WebSqlError| ServiceError::ExportFailed(format!("{}: {}", table, e));

    let views = engine
        .execute(&format!(
            "SELECT sql FROM duckdb_views() WHERE view_name = {} AND NOT internal",
            quote_literal(table)
        ))
        .await
        .map_err(failed)?;
    if let Some(sql) = views.rows.first().and_then(|r| r.get(0)).and_then(Value::as_str) {
        return Ok(TableSql {
            kind: SavedTableKind::View,
            sql: sql.to_string(),
        });
    }

    let columns = engine.describe_table(table).await.map_err(failed)?;
    let data = engine
        .execute(&format!("SELECT * FROM {}", quote_identifier(table)))
        .await
        .map_err(failed)?;

    let definitions = columns
        .iter()
        .map(|c| format!("{} {}", quote_identifier(&c.name), c.data_type))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("CREATE TABLE {} ({});\n", quote_identifier(table), definitions);

    if !data.rows.is_empty() {
        let names = data
            .columns
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let rows = data
            .rows
            .iter()
            .map(|row| {
                let values: Vec<String> = row.values.iter().map(Value::to_sql_literal).collect();
                format!("  ({})", values.join(", "))
            })
            .collect::<Vec<_>>()
            .join(",\n");
        sql.push_str(&format!(
            "\nINSERT INTO {} ({}) VALUES\n{};\n",
            quote_identifier(table),
            names,
            rows
        ));
    }

    tracing::debug!(rows = data.rows.len(), "table exported as SQL");
    Ok(TableSql {
        kind: SavedTableKind::Table,
        sql,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use websql_driver_duckdb::DuckDbEngine;

    #[tokio::test]
    async fn test_table_export_replays() {
        let engine = DuckDbEngine::open_in_memory().unwrap();
        engine
            .execute_script(
                "CREATE TABLE people (id INTEGER, name VARCHAR); \
                 INSERT INTO people VALUES (1, 'O''Brien'), (2, NULL);",
            )
            .await
            .unwrap();

        let exported = export_table_as_sql(&engine, "people").await.unwrap();
        assert_eq!(exported.kind, SavedTableKind::Table);
        assert_eq!(
            exported.sql,
            "CREATE TABLE \"people\" (\"id\" INTEGER, \"name\" VARCHAR);\n\
             \nINSERT INTO \"people\" (\"id\", \"name\") VALUES\n  (1, 'O''Brien'),\n  (2, NULL);\n"
        );

        let replay = DuckDbEngine::open_in_memory().unwrap();
        replay.execute_script(&exported.sql).await.unwrap();
        let result = replay.execute("SELECT name FROM people WHERE id = 1").await.unwrap();
        assert_eq!(result.rows[0].get(0), Some(&Value::String("O'Brien".into())));
    }

    #[tokio::test]
    async fn test_empty_table_has_no_insert() {
        let engine = DuckDbEngine::open_in_memory().unwrap();
        engine.execute_script("CREATE TABLE t (id INTEGER);").await.unwrap();

        let exported = export_table_as_sql(&engine, "t").await.unwrap();
        assert_eq!(exported.sql, "CREATE TABLE \"t\" (\"id\" INTEGER);\n");
    }

    #[tokio::test]
    async fn test_view_exports_definition() {
        let engine = DuckDbEngine::open_in_memory().unwrap();
        engine
            .execute_script("CREATE TABLE t (id INTEGER); CREATE VIEW v AS SELECT id FROM t;")
            .await
            .unwrap();

        let exported = export_table_as_sql(&engine, "v").await.unwrap();
        assert_eq!(exported.kind, SavedTableKind::View);
        assert!(exported.sql.to_uppercase().starts_with("CREATE VIEW"));
    }

    #[tokio::test]
    async fn test_missing_table() {
        let engine = DuckDbEngine::open_in_memory().unwrap();
        let err = export_table_as_sql(&engine, "missing").await.unwrap_err();
        assert!(err.to_string().starts_with("Table export failed: missing:"));
    }
}
