//! CLI-specific error types

use dwh_etl::{PipelineError, WarehouseError};
use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("File already exists: {0} (use --force to overwrite)")]
    FileExists(PathBuf),

    #[error("Failed to write file {0}: {1}")]
    FileWriteError(PathBuf, String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("Pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),
}
