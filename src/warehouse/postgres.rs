//! PostgreSQL wire-protocol warehouse implementation
//!
//! Serves both plain PostgreSQL and Amazon Redshift clusters; the dialect
//! decides which SQL the pipeline renders for it.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::types::{ToSql, Type};

use super::{QueryResult, SqlValue, Warehouse, WarehouseError, WarehouseResult, insert_statement};
use crate::sql::Dialect;

type BoxedParam = Box<dyn ToSql + Sync + Send>;

/// PostgreSQL or Redshift warehouse
pub struct PostgresWarehouse {
    /// SQL dialect of the server
    dialect: Dialect,
    /// PostgreSQL client (wrapped for async access)
    client: Arc<Mutex<tokio_postgres::Client>>,
}

impl PostgresWarehouse {
    /// Connect to a PostgreSQL-compatible server
    ///
    /// # Arguments
    /// * `connection_string` - key/value or URL connection string
    /// * `dialect` - `Dialect::Postgres` or `Dialect::Redshift`
    pub async fn connect(connection_string: &str, dialect: Dialect) -> WarehouseResult<Self> {
        if dialect == Dialect::DuckDb {
            return Err(WarehouseError::InvalidInput(
                "DuckDB dialect cannot be used over a PostgreSQL connection".to_string(),
            ));
        }

        let (client, connection) =
            tokio_postgres::connect(connection_string, tokio_postgres::NoTls)
                .await
                .map_err(|e| {
                    WarehouseError::ConnectionFailed(format!("Failed to connect to {}: {}", dialect, e))
                })?;

        // Spawn connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("Warehouse connection error: {}", e);
            }
        });

        Ok(Self {
            dialect,
            client: Arc::new(Mutex::new(client)),
        })
    }

    /// Convert a PostgreSQL row to a JSON value
    fn row_to_json(row: &tokio_postgres::Row, columns: &[String]) -> serde_json::Value {
        let mut map = serde_json::Map::new();

        for (i, col_name) in columns.iter().enumerate() {
            map.insert(col_name.clone(), Self::get_column_value(row, i));
        }

        serde_json::Value::Object(map)
    }

    /// Get a column value as JSON
    fn get_column_value(row: &tokio_postgres::Row, idx: usize) -> serde_json::Value {
        if let Ok(v) = row.try_get::<_, Option<String>>(idx) {
            return v
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<i64>>(idx) {
            return v
                .map(|n| serde_json::Value::Number(n.into()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<i32>>(idx) {
            return v
                .map(|n| serde_json::Value::Number(n.into()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<i16>>(idx) {
            return v
                .map(|n| serde_json::Value::Number(n.into()))
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<bool>>(idx) {
            return v
                .map(serde_json::Value::Bool)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<f64>>(idx) {
            return v
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<f32>>(idx) {
            return v
                .and_then(|f| serde_json::Number::from_f64(f as f64))
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null);
        }
        if let Ok(v) = row.try_get::<_, Option<chrono::NaiveDateTime>>(idx) {
            return v
                .map(|ts| serde_json::Value::String(ts.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or(serde_json::Value::Null);
        }

        serde_json::Value::Null
    }
}

/// Convert a value to a parameter of the type the server inferred
pub(crate) fn to_param(value: &SqlValue, ty: &Type) -> WarehouseResult<BoxedParam> {
    let param: BoxedParam = match (value, ty) {
        (SqlValue::Null, t) if *t == Type::INT2 => Box::new(None::<i16>),
        (SqlValue::Null, t) if *t == Type::INT4 => Box::new(None::<i32>),
        (SqlValue::Null, t) if *t == Type::INT8 => Box::new(None::<i64>),
        (SqlValue::Null, t) if *t == Type::FLOAT4 => Box::new(None::<f32>),
        (SqlValue::Null, t) if *t == Type::FLOAT8 => Box::new(None::<f64>),
        (SqlValue::Null, _) => Box::new(None::<String>),

        (SqlValue::Int(i), t) if *t == Type::INT2 => Box::new(i16::try_from(*i).map_err(|_| {
            WarehouseError::InvalidInput(format!("{} is out of range for smallint", i))
        })?),
        (SqlValue::Int(i), t) if *t == Type::INT4 => Box::new(i32::try_from(*i).map_err(|_| {
            WarehouseError::InvalidInput(format!("{} is out of range for integer", i))
        })?),
        (SqlValue::Int(i), t) if *t == Type::INT8 => Box::new(*i),
        (SqlValue::Int(i), t) if *t == Type::FLOAT4 => Box::new(*i as f32),
        (SqlValue::Int(i), t) if *t == Type::FLOAT8 => Box::new(*i as f64),
        (SqlValue::Int(i), _) => Box::new(i.to_string()),

        (SqlValue::Float(f), t) if *t == Type::FLOAT4 => Box::new(*f as f32),
        (SqlValue::Float(f), t) if *t == Type::FLOAT8 => Box::new(*f),
        (SqlValue::Float(f), t) if *t == Type::TEXT || *t == Type::VARCHAR || *t == Type::BPCHAR => {
            Box::new(f.to_string())
        }

        (SqlValue::Text(s), t) if *t == Type::TEXT || *t == Type::VARCHAR || *t == Type::BPCHAR => {
            Box::new(s.clone())
        }

        (value, t) => {
            return Err(WarehouseError::InvalidInput(format!(
                "Cannot bind {:?} to a {} parameter",
                value, t
            )));
        }
    };

    Ok(param)
}

#[async_trait(?Send)]
impl Warehouse for PostgresWarehouse {
    async fn execute(&self, sql: &str) -> WarehouseResult<()> {
        let client = self.client.lock().await;

        client
            .batch_execute(sql)
            .await
            .map_err(|e| WarehouseError::QueryFailed(format!("Execute failed: {}", e)))
    }

    async fn query(&self, sql: &str) -> WarehouseResult<QueryResult> {
        let start = std::time::Instant::now();
        let client = self.client.lock().await;

        let rows = client
            .query(sql, &[])
            .await
            .map_err(|e| WarehouseError::QueryFailed(format!("Query failed: {}", e)))?;

        let columns: Vec<String> = if !rows.is_empty() {
            rows[0]
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect()
        } else {
            Vec::new()
        };

        let json_rows: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| Self::row_to_json(row, &columns))
            .collect();

        Ok(QueryResult {
            columns,
            rows: json_rows,
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
        let sql = insert_statement(table, columns, |i| format!("${}", i));

        let mut client = self.client.lock().await;

        let tx = client.transaction().await.map_err(|e| {
            WarehouseError::TransactionFailed(format!("Failed to begin transaction: {}", e))
        })?;

        let stmt = tx
            .prepare(&sql)
            .await
            .map_err(|e| WarehouseError::QueryFailed(format!("Prepare failed: {}", e)))?;

        for (index, row) in rows.iter().enumerate() {
            if row.len() != stmt.params().len() {
                return Err(WarehouseError::InvalidInput(format!(
                    "Row {} has {} values, expected {}",
                    index,
                    row.len(),
                    stmt.params().len()
                )));
            }

            let params = row
                .iter()
                .zip(stmt.params())
                .map(|(value, ty)| to_param(value, ty))
                .collect::<WarehouseResult<Vec<BoxedParam>>>()?;
            let param_refs: Vec<&(dyn ToSql + Sync)> = params
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect();

            tx.execute(&stmt, &param_refs).await.map_err(|e| {
                WarehouseError::QueryFailed(format!(
                    "Insert into {} failed at row {}: {}",
                    table, index, e
                ))
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| WarehouseError::TransactionFailed(format!("Failed to commit: {}", e)))?;

        Ok(rows.len())
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn backend_type(&self) -> &'static str {
        match self.dialect {
            Dialect::Redshift => "redshift",
            _ => "postgres",
        }
    }

    async fn health_check(&self) -> WarehouseResult<bool> {
        let result = self.query("SELECT 1 AS healthy").await?;
        Ok(!result.rows.is_empty())
    }

    async fn close(&self) -> WarehouseResult<()> {
        // Connection is closed when the client is dropped
        Ok(())
    }
}
