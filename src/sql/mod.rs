//! SQL statement generation for the star schema
//!
//! Every statement the pipeline runs is rendered here from static table
//! definitions. Rendering is dialect-aware so the same schema can target an
//! Amazon Redshift cluster, a plain PostgreSQL database, or an embedded
//! DuckDB file:
//!
//! - [`schema`] - table definitions, CREATE and DROP statements
//! - [`load`] - bulk load (COPY) statements for the staging tables
//! - [`transform`] - INSERT ... SELECT statements for fact and dimension tables
//! - [`queries`] - the four ordered statement lists

use serde::{Deserialize, Serialize};

pub mod load;
pub mod queries;
pub mod schema;
pub mod transform;

pub use load::{BulkLoad, JsonFormat};
pub use queries::{
    StatementLists, copy_table_queries, create_table_queries, drop_table_queries,
    insert_table_queries,
};
pub use schema::{ColumnDef, ColumnType, TableDef};

/// SQL dialect of the target warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Amazon Redshift (columnar warehouse, COPY from S3)
    Redshift,
    /// Plain PostgreSQL
    Postgres,
    /// Embedded DuckDB (default)
    #[default]
    DuckDb,
}

/// Feature switches that differ between dialects
///
/// Physical layout hints never change query results; they only tell a
/// columnar warehouse how to distribute and sort rows. Targets without them
/// get the same columns and keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Emit DISTKEY / SORTKEY column attributes
    pub physical_layout_hints: bool,
    /// Native `IDENTITY(seed, step)` columns (otherwise a sequence is used)
    pub identity_columns: bool,
    /// Staging tables can be loaded with a server-side COPY from object storage
    pub object_storage_copy: bool,
}

impl Dialect {
    /// Default capabilities for this dialect
    pub fn capabilities(self) -> Capabilities {
        match self {
            Dialect::Redshift => Capabilities {
                physical_layout_hints: true,
                identity_columns: true,
                object_storage_copy: true,
            },
            Dialect::Postgres | Dialect::DuckDb => Capabilities {
                physical_layout_hints: false,
                identity_columns: false,
                object_storage_copy: false,
            },
        }
    }

    /// Expression deriving `start_time` from an epoch-milliseconds column
    ///
    /// Sub-second precision is truncated. Both the songplay and the time
    /// transforms render their timestamps through this function so the two
    /// tables always agree on the key.
    pub fn start_time_expr(self, ts_column: &str) -> String {
        match self {
            Dialect::Redshift => {
                format!("TIMESTAMP 'epoch' + ({} / 1000) * INTERVAL '1 second'", ts_column)
            }
            Dialect::Postgres => format!(
                "TIMESTAMP '1970-01-01 00:00:00' + ({} / 1000) * INTERVAL '1 second'",
                ts_column
            ),
            // `/` is floating point division in DuckDB
            Dialect::DuckDb => format!(
                "TIMESTAMP '1970-01-01 00:00:00' + to_seconds({} // 1000)",
                ts_column
            ),
        }
    }

    /// Date part name for the day of week (Sunday = 0)
    pub fn weekday_part(self) -> &'static str {
        match self {
            Dialect::Redshift => "weekday",
            Dialect::Postgres | Dialect::DuckDb => "dow",
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redshift" => Ok(Dialect::Redshift),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "duckdb" => Ok(Dialect::DuckDb),
            _ => Err(format!(
                "Unknown SQL dialect: {}. Use 'redshift', 'postgres' or 'duckdb'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Redshift => write!(f, "redshift"),
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::DuckDb => write!(f, "duckdb"),
        }
    }
}

/// Quote a value as a SQL string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
