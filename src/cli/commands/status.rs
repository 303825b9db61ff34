//! Warehouse status: connectivity and row counts per table

use std::path::PathBuf;

use dwh_etl::sql::schema::ALL_TABLES;

use super::{Context, open_warehouse, runtime};
use crate::error::CliError;

/// Status command arguments
#[derive(Debug, Clone)]
pub struct StatusArgs {
    /// Configuration file
    pub config: PathBuf,
}

pub fn handle_status(args: &StatusArgs) -> Result<(), CliError> {
    let ctx = Context::load(&args.config)?;

    println!("Warehouse Status:");
    println!("  Config:   {}", ctx.config_path.display());
    println!("  Backend:  {}", ctx.config.warehouse.backend);

    let rt = runtime()?;

    rt.block_on(async {
        let warehouse = open_warehouse(&ctx).await?;

        let healthy = warehouse.health_check().await.unwrap_or(false);
        println!("  Healthy:  {}", if healthy { "yes" } else { "no" });
        println!();
        println!("Tables:");

        for table in ALL_TABLES {
            let sql = format!("SELECT COUNT(*) AS count FROM {}", table.name);
            match warehouse.query(&sql).await {
                Ok(result) => {
                    let count = result.scalar_i64().unwrap_or(0);
                    println!("  {:<16} {}", table.name, count);
                }
                Err(e) => {
                    tracing::debug!("Count failed for {}: {}", table.name, e);
                    println!("  {:<16} (missing)", table.name);
                }
            }
        }

        warehouse.close().await?;
        Ok::<(), CliError>(())
    })
}
