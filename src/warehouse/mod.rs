//! Warehouse connection abstraction
//!
//! This module provides the connection the pipeline runs its statements on:
//! - DuckDB: Embedded database for local runs and tests
//! - PostgreSQL: Plain PostgreSQL, or an Amazon Redshift cluster over the
//!   PostgreSQL wire protocol
//!
//! The pipeline only executes DDL/DML. Result sets are read by the CLI
//! inspection commands and by tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::sql::Dialect;

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

#[cfg(feature = "postgres-backend")]
pub mod postgres;

pub mod config;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDBWarehouse;

#[cfg(feature = "postgres-backend")]
pub use self::postgres::PostgresWarehouse;

pub use config::{PipelineConfig, WarehouseBackendType};

/// Error type for warehouse operations
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    /// Failed to connect to the warehouse
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Statement execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backend not compiled in
    #[error("Backend not enabled: {0}")]
    BackendNotEnabled(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type for warehouse operations
pub type WarehouseResult<T> = Result<T, WarehouseError>;

/// A scalar bound to an insert parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

/// Query result row as a JSON value
pub type QueryRow = serde_json::Value;

/// Query result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<QueryRow>,
    /// Number of rows affected (for INSERT/UPDATE/DELETE)
    pub rows_affected: Option<u64>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(columns: Vec<String>, rows: Vec<QueryRow>) -> Self {
        Self {
            columns,
            rows,
            rows_affected: None,
            execution_time_ms: 0,
        }
    }

    /// Create an empty result
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row as an integer, for `SELECT COUNT(*)` style queries
    pub fn scalar_i64(&self) -> Option<i64> {
        let column = self.columns.first()?;
        let value = self.rows.first()?.get(column)?;
        match value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Warehouse connection trait
///
/// Statements run sequentially on a single connection. Failures are
/// reported as-is; there is no retry.
#[async_trait(?Send)]
pub trait Warehouse {
    /// Execute one or more SQL statements that return no rows
    async fn execute(&self, sql: &str) -> WarehouseResult<()>;

    /// Execute a SQL query and return results
    async fn query(&self, sql: &str) -> WarehouseResult<QueryResult>;

    /// Insert rows into a table in a single transaction
    ///
    /// Either every row is inserted or none is.
    ///
    /// # Returns
    /// Number of rows inserted
    async fn insert_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
    ) -> WarehouseResult<usize>;

    /// SQL dialect spoken by this connection
    fn dialect(&self) -> Dialect;

    /// Get the backend type name ("duckdb", "postgres" or "redshift")
    fn backend_type(&self) -> &'static str;

    /// Check if the warehouse is reachable
    async fn health_check(&self) -> WarehouseResult<bool>;

    /// Close the connection
    async fn close(&self) -> WarehouseResult<()>;
}

/// Build a parameterized INSERT statement
///
/// `placeholder` renders the n-th (1-based) parameter marker.
pub(crate) fn insert_statement(
    table: &str,
    columns: &[&str],
    placeholder: impl Fn(usize) -> String,
) -> String {
    let markers: Vec<String> = (1..=columns.len()).map(placeholder).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        markers.join(", ")
    )
}

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Format query results for display
pub fn format_query_result(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&result.rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => format_as_csv(result),
        OutputFormat::Table => format_as_table(result),
    }
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn format_as_csv(result: &QueryResult) -> String {
    let mut output = String::new();

    output.push_str(&result.columns.join(","));
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = result
            .columns
            .iter()
            .map(|col| match row.get(col).unwrap_or(&serde_json::Value::Null) {
                serde_json::Value::String(s) => {
                    if s.contains(',') || s.contains('"') || s.contains('\n') {
                        format!("\"{}\"", s.replace('"', "\"\""))
                    } else {
                        s.clone()
                    }
                }
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect();
        output.push_str(&values.join(","));
        output.push('\n');
    }

    output
}

fn format_as_table(result: &QueryResult) -> String {
    if result.is_empty() {
        return "(0 rows)".to_string();
    }

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();

    for row in &result.rows {
        for (i, col) in result.columns.iter().enumerate() {
            let value = row.get(col).unwrap_or(&serde_json::Value::Null);
            widths[i] = widths[i].max(display_value(value).len());
        }
    }

    let mut output = String::new();

    let header: Vec<String> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:width$}", c, width = widths[i]))
        .collect();
    output.push_str(&header.join(" | "));
    output.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&separator.join("-+-"));
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = result
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let value = row.get(col).unwrap_or(&serde_json::Value::Null);
                format!("{:width$}", display_value(value), width = widths[i])
            })
            .collect();
        output.push_str(&values.join(" | "));
        output.push('\n');
    }

    output.push_str(&format!("({} rows)", result.row_count()));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(
            OutputFormat::from_str("table").unwrap(),
            OutputFormat::Table
        );
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("csv").unwrap(), OutputFormat::Csv);
        assert!(OutputFormat::from_str("xml").is_err());
    }

    #[test]
    fn test_format_as_table() {
        let result = QueryResult::new(
            vec!["table_name".to_string(), "rows".to_string()],
            vec![
                serde_json::json!({"table_name": "dimUser", "rows": 96}),
                serde_json::json!({"table_name": "factSongplay", "rows": 333}),
            ],
        );

        let output = format_as_table(&result);
        assert!(output.contains("table_name"));
        assert!(output.contains("factSongplay"));
        assert!(output.contains("(2 rows)"));
    }

    #[test]
    fn test_format_as_csv_quotes_commas() {
        let result = QueryResult::new(
            vec!["name".to_string(), "location".to_string()],
            vec![serde_json::json!({"name": "Faithless", "location": "London, England"})],
        );

        let output = format_as_csv(&result);
        assert!(output.starts_with("name,location\n"));
        assert!(output.contains("Faithless,\"London, England\""));
    }

    #[test]
    fn test_scalar_i64() {
        let result = QueryResult::new(
            vec!["n".to_string()],
            vec![serde_json::json!({"n": 7})],
        );
        assert_eq!(result.scalar_i64(), Some(7));
        assert_eq!(QueryResult::empty().scalar_i64(), None);
    }

    #[test]
    fn test_insert_statement() {
        let sql = insert_statement("staging_songs", &["song_id", "title"], |i| format!("${}", i));
        assert_eq!(sql, "INSERT INTO staging_songs (song_id, title) VALUES ($1, $2)");
    }
}
