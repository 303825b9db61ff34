//! CLI command implementations

pub mod init;
pub mod query;
pub mod run;
pub mod sql;
pub mod status;

use std::path::{Path, PathBuf};

use dwh_etl::warehouse::{PipelineConfig, Warehouse, WarehouseBackendType};

use crate::error::CliError;

/// Loaded configuration and the directory relative paths resolve against
pub struct Context {
    pub config_path: PathBuf,
    pub base_dir: PathBuf,
    pub config: PipelineConfig,
}

impl Context {
    /// Load the configuration file, apply environment overrides and resolve
    /// local data paths
    pub fn load(config_path: &Path) -> Result<Self, CliError> {
        let base_dir = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut config = PipelineConfig::load(config_path)?;
        config.resolve_data_paths(&base_dir);

        tracing::debug!(
            "Loaded config from {} (backend: {})",
            config_path.display(),
            config.warehouse.backend
        );

        Ok(Self {
            config_path: config_path.to_path_buf(),
            base_dir,
            config,
        })
    }
}

pub fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}

/// Open a connection to the configured warehouse
pub async fn open_warehouse(ctx: &Context) -> Result<Box<dyn Warehouse>, CliError> {
    match ctx.config.warehouse.backend {
        WarehouseBackendType::DuckDB => {
            #[cfg(feature = "duckdb-backend")]
            {
                let db_path = ctx.config.get_duckdb_path(&ctx.base_dir);
                tracing::info!("Opening DuckDB warehouse at {}", db_path.display());
                let warehouse = dwh_etl::warehouse::DuckDBWarehouse::new(&db_path)?;
                Ok(Box::new(warehouse))
            }
            #[cfg(not(feature = "duckdb-backend"))]
            {
                Err(dwh_etl::WarehouseError::BackendNotEnabled(
                    "DuckDB backend not enabled. Build with --features duckdb-backend".to_string(),
                )
                .into())
            }
        }
        backend @ (WarehouseBackendType::Postgres | WarehouseBackendType::Redshift) => {
            #[cfg(feature = "postgres-backend")]
            {
                tracing::info!(
                    "Connecting to {} ({})",
                    backend,
                    ctx.config.connection_string_masked()
                );
                let warehouse = dwh_etl::warehouse::PostgresWarehouse::connect(
                    &ctx.config.connection_string(),
                    backend.dialect(),
                )
                .await?;
                Ok(Box::new(warehouse))
            }
            #[cfg(not(feature = "postgres-backend"))]
            {
                Err(dwh_etl::WarehouseError::BackendNotEnabled(format!(
                    "{} backend not enabled. Build with --features postgres-backend",
                    backend
                ))
                .into())
            }
        }
    }
}
