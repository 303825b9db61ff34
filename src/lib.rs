//! Star-schema loader for song play analytics
//!
//! Stages raw song metadata and user activity logs into two staging tables,
//! then builds one fact table and four dimension tables from them:
//! - `sql`: table definitions, bulk load statements and transforms, rendered
//!   per warehouse dialect
//! - `warehouse`: connection trait with DuckDB and PostgreSQL/Redshift backends,
//!   plus the configuration file
//! - `staging`: local JSON loads for warehouses without object-storage COPY
//! - `pipeline`: runs the drop, create, copy and insert lists in order

pub mod pipeline;
pub mod sql;
pub mod staging;
pub mod warehouse;

pub use pipeline::{Phase, Pipeline, PipelineError, RunReport};
pub use sql::{
    BulkLoad, Dialect, StatementLists, copy_table_queries, create_table_queries,
    drop_table_queries, insert_table_queries,
};
pub use staging::{IngestError, IngestStats};
pub use warehouse::{
    PipelineConfig, QueryResult, SqlValue, Warehouse, WarehouseBackendType, WarehouseError,
    WarehouseResult,
};

#[cfg(feature = "duckdb-backend")]
pub use warehouse::DuckDBWarehouse;

#[cfg(feature = "postgres-backend")]
pub use warehouse::PostgresWarehouse;
