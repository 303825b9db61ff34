//! Staging load errors

use std::path::PathBuf;

use crate::warehouse::WarehouseError;

/// Errors that can occur while loading staging tables from local files
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(String),

    #[error("Object storage source {0} cannot be loaded into a local warehouse")]
    ObjectStorageSource(String),

    #[error("JSON parse error in {path} at record {record}: {error}")]
    JsonParse {
        path: PathBuf,
        record: usize,
        error: String,
    },

    #[error("Cannot load {path} record {record} into column {column}: {reason}")]
    UnmappableValue {
        path: PathBuf,
        record: usize,
        column: String,
        reason: String,
    },

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}
