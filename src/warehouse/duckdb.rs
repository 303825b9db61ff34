//! DuckDB warehouse implementation
//!
//! Provides an embedded target for running the full pipeline locally and in
//! tests. DuckDB has no object-storage COPY, so staging tables are filled
//! through [`Warehouse::insert_rows`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{QueryResult, SqlValue, Warehouse, WarehouseError, WarehouseResult, insert_statement};
use crate::sql::Dialect;

/// DuckDB warehouse
///
/// Supports both file-based persistence and in-memory mode.
pub struct DuckDBWarehouse {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// DuckDB connection (wrapped in Mutex for thread safety)
    connection: Mutex<duckdb::Connection>,
}

impl DuckDBWarehouse {
    /// Open (or create) a file-based DuckDB database
    pub fn new(db_path: impl AsRef<Path>) -> WarehouseResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = duckdb::Connection::open(&path).map_err(|e| {
            WarehouseError::ConnectionFailed(format!("Failed to open DuckDB: {}", e))
        })?;

        tracing::debug!("Opened DuckDB database at {}", path.display());

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(connection),
        })
    }

    /// Create an in-memory DuckDB warehouse
    pub fn in_memory() -> WarehouseResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            WarehouseError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(connection),
        })
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Check if this is an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn lock(&self) -> WarehouseResult<std::sync::MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| WarehouseError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    fn to_duckdb_value(value: &SqlValue) -> duckdb::types::Value {
        use duckdb::types::Value;

        match value {
            SqlValue::Null => Value::Null,
            SqlValue::Int(i) => Value::BigInt(*i),
            SqlValue::Float(f) => Value::Double(*f),
            SqlValue::Text(s) => Value::Text(s.clone()),
        }
    }

    /// Convert a DuckDB row to a JSON value
    fn row_to_json(row: &duckdb::Row, columns: &[String]) -> serde_json::Value {
        let mut map = serde_json::Map::new();

        for (i, col_name) in columns.iter().enumerate() {
            let value: serde_json::Value = match row.get_ref(i) {
                Ok(value_ref) => Self::value_ref_to_json(value_ref),
                Err(_) => serde_json::Value::Null,
            };
            map.insert(col_name.clone(), value);
        }

        serde_json::Value::Object(map)
    }

    /// Convert a DuckDB ValueRef to a JSON value
    fn value_ref_to_json(value: duckdb::types::ValueRef) -> serde_json::Value {
        use duckdb::types::{TimeUnit, ValueRef};

        match value {
            ValueRef::Null => serde_json::Value::Null,
            ValueRef::Boolean(b) => serde_json::Value::Bool(b),
            ValueRef::TinyInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::SmallInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::Int(i) => serde_json::Value::Number(i.into()),
            ValueRef::BigInt(i) => serde_json::Value::Number(i.into()),
            // i128 may not fit in a JSON number
            ValueRef::HugeInt(i) => serde_json::Value::String(i.to_string()),
            ValueRef::UTinyInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::USmallInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::UInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::UBigInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::Float(f) => serde_json::Number::from_f64(f as f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Double(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned().into(),
            ValueRef::Blob(bytes) => {
                use base64::Engine;
                serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            ValueRef::Timestamp(unit, v) => {
                let micros = match unit {
                    TimeUnit::Second => v.saturating_mul(1_000_000),
                    TimeUnit::Millisecond => v.saturating_mul(1_000),
                    TimeUnit::Microsecond => v,
                    TimeUnit::Nanosecond => v / 1_000,
                };
                chrono::DateTime::from_timestamp_micros(micros)
                    .map(|dt| serde_json::Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
                    .unwrap_or(serde_json::Value::Null)
            }
            ValueRef::Date32(_) => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::Time64(_, _) => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::Interval { .. } => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::List(_, _) => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::Enum(_, _) => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::Struct(_, _) => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::Map(_, _) => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::Union(_, _) => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::Array(_, _) => serde_json::Value::String(format!("{:?}", value)),
            ValueRef::Decimal(d) => serde_json::Value::String(d.to_string()),
        }
    }
}

#[async_trait(?Send)]
impl Warehouse for DuckDBWarehouse {
    async fn execute(&self, sql: &str) -> WarehouseResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(sql)
            .map_err(|e| WarehouseError::QueryFailed(format!("Execute failed: {}", e)))
    }

    async fn query(&self, sql: &str) -> WarehouseResult<QueryResult> {
        let start = std::time::Instant::now();

        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| WarehouseError::QueryFailed(format!("Prepare failed: {}", e)))?;

        // In DuckDB 1.4+, we need to execute the query first, then get columns
        let mut result_rows = stmt
            .query([])
            .map_err(|e| WarehouseError::QueryFailed(format!("Query failed: {}", e)))?;

        let column_count = result_rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let columns: Vec<String> = (0..column_count)
            .map(|i| {
                result_rows
                    .as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        let mut rows = Vec::new();
        while let Some(row) = result_rows
            .next()
            .map_err(|e| WarehouseError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            rows.push(Self::row_to_json(row, &columns));
        }

        Ok(QueryResult {
            columns,
            rows,
            rows_affected: None,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
    ) -> WarehouseResult<usize> {
        let sql = insert_statement(table, columns, |_| "?".to_string());

        let mut conn = self.lock()?;

        let tx = conn.transaction().map_err(|e| {
            WarehouseError::TransactionFailed(format!("Failed to begin transaction: {}", e))
        })?;

        {
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| WarehouseError::QueryFailed(format!("Prepare failed: {}", e)))?;

            for (index, row) in rows.iter().enumerate() {
                if row.len() != columns.len() {
                    return Err(WarehouseError::InvalidInput(format!(
                        "Row {} has {} values, expected {}",
                        index,
                        row.len(),
                        columns.len()
                    )));
                }

                let params: Vec<duckdb::types::Value> =
                    row.iter().map(Self::to_duckdb_value).collect();

                stmt.execute(duckdb::params_from_iter(params)).map_err(|e| {
                    WarehouseError::QueryFailed(format!(
                        "Insert into {} failed at row {}: {}",
                        table, index, e
                    ))
                })?;
            }
        }

        tx.commit().map_err(|e| {
            WarehouseError::TransactionFailed(format!("Failed to commit: {}", e))
        })?;

        Ok(rows.len())
    }

    fn dialect(&self) -> Dialect {
        Dialect::DuckDb
    }

    fn backend_type(&self) -> &'static str {
        "duckdb"
    }

    async fn health_check(&self) -> WarehouseResult<bool> {
        let result = self.query("SELECT 1 AS healthy").await?;
        Ok(!result.rows.is_empty())
    }

    async fn close(&self) -> WarehouseResult<()> {
        // Connection is closed when dropped
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let warehouse = DuckDBWarehouse::in_memory().unwrap();
        assert!(warehouse.is_in_memory());
        assert!(warehouse.db_path().is_none());
        assert_eq!(warehouse.backend_type(), "duckdb");
        assert_eq!(warehouse.dialect(), Dialect::DuckDb);
    }

    #[tokio::test]
    async fn test_health_check() {
        let warehouse = DuckDBWarehouse::in_memory().unwrap();
        assert!(warehouse.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_rows_and_query() {
        let warehouse = DuckDBWarehouse::in_memory().unwrap();
        warehouse
            .execute("CREATE TABLE t (id BIGINT, name TEXT, score DOUBLE PRECISION, small SMALLINT)")
            .await
            .unwrap();

        let inserted = warehouse
            .insert_rows(
                "t",
                &["id", "name", "score", "small"],
                &[
                    vec![
                        SqlValue::Int(1),
                        SqlValue::Text("a".to_string()),
                        SqlValue::Float(1.5),
                        SqlValue::Int(3),
                    ],
                    vec![SqlValue::Int(2), SqlValue::Null, SqlValue::Null, SqlValue::Null],
                ],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let result = warehouse
            .query("SELECT id, name, score, small FROM t ORDER BY id")
            .await
            .unwrap();
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.rows[0]["name"], "a");
        assert_eq!(result.rows[0]["score"], 1.5);
        assert_eq!(result.rows[0]["small"], 3);
        assert!(result.rows[1]["name"].is_null());
    }

    #[tokio::test]
    async fn test_insert_rows_is_all_or_nothing() {
        let warehouse = DuckDBWarehouse::in_memory().unwrap();
        warehouse.execute("CREATE TABLE t (n SMALLINT)").await.unwrap();

        let result = warehouse
            .insert_rows(
                "t",
                &["n"],
                &[vec![SqlValue::Int(1)], vec![SqlValue::Text("not a number".to_string())]],
            )
            .await;
        assert!(result.is_err());

        let count = warehouse.query("SELECT COUNT(*) AS n FROM t").await.unwrap();
        assert_eq!(count.scalar_i64(), Some(0));
    }

    #[tokio::test]
    async fn test_timestamps_render_as_text() {
        let warehouse = DuckDBWarehouse::in_memory().unwrap();
        let result = warehouse
            .query("SELECT TIMESTAMP '2018-11-02 01:25:34' AS ts")
            .await
            .unwrap();
        assert_eq!(result.rows[0]["ts"], "2018-11-02 01:25:34");
    }

    #[tokio::test]
    async fn test_execute_reports_errors() {
        let warehouse = DuckDBWarehouse::in_memory().unwrap();
        let err = warehouse.execute("SELEC nonsense").await.unwrap_err();
        assert!(matches!(err, WarehouseError::QueryFailed(_)));
    }
}
