//! Local staging loads
//!
//! Warehouses without object-storage COPY (DuckDB, plain PostgreSQL) load the
//! staging tables from JSON files on disk instead. The load follows the same
//! contract as the warehouse COPY:
//!
//! - every `*.json` file under the source is read
//! - fields map to columns by name, exact match first, then case-insensitive
//! - values too long for a `VARCHAR(n)` column are truncated
//! - the whole table loads in one transaction, so a bad record loads nothing

mod error;
pub mod ingest;
pub mod records;

use std::time::Instant;

pub use error::IngestError;
pub use ingest::{DiscoveredFile, IngestStats, discover_local_files, parse_json_objects};
pub use records::RowMapper;

use crate::sql::BulkLoad;
use crate::warehouse::{SqlValue, Warehouse};

/// Load one staging table from local JSON files
pub async fn load_local<W: Warehouse + ?Sized>(
    warehouse: &W,
    load: &BulkLoad,
) -> Result<IngestStats, IngestError> {
    if load.is_object_storage() {
        return Err(IngestError::ObjectStorageSource(load.source.clone()));
    }

    let start = Instant::now();
    let mut stats = IngestStats::new(load.table.name);
    let mapper = RowMapper::new(load.table);

    let files = discover_local_files(&load.source)?;
    if files.is_empty() {
        tracing::warn!("No JSON files found under {}", load.source);
    } else {
        tracing::debug!("Found {} files under {}", files.len(), load.source);
    }

    let mut rows: Vec<Vec<SqlValue>> = Vec::new();
    for file in &files {
        let records = parse_json_objects(&file.path)?;

        for (index, record) in records.iter().enumerate() {
            let row = mapper
                .map(record)
                .map_err(|e| IngestError::UnmappableValue {
                    path: file.path.clone(),
                    record: index,
                    column: e.column.to_string(),
                    reason: e.reason,
                })?;
            stats.values_truncated += row.truncated;
            rows.push(row.values);
        }

        stats.files_processed += 1;
        stats.bytes_processed += file.size;
    }

    let columns = mapper.columns();
    stats.records_ingested = if rows.is_empty() {
        0
    } else {
        warehouse.insert_rows(load.table.name, &columns, &rows).await?
    };
    stats.duration = start.elapsed();

    if stats.values_truncated > 0 {
        tracing::info!(
            "Truncated {} values to fit {}",
            stats.values_truncated,
            load.table.name
        );
    }
    tracing::info!(
        "Loaded {} records from {} files into {} in {}",
        stats.records_ingested,
        stats.files_processed,
        load.table.name,
        stats.duration_string()
    );

    Ok(stats)
}
