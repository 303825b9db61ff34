//! SQL query CLI command
//!
//! Runs an ad hoc query against the configured warehouse for inspection.

use std::path::PathBuf;

use dwh_etl::warehouse::{OutputFormat, format_query_result};

use super::{Context, open_warehouse, runtime};
use crate::error::CliError;

/// Query command arguments
#[derive(Debug, Clone)]
pub struct QueryArgs {
    /// Configuration file
    pub config: PathBuf,
    /// SQL query to execute
    pub sql: String,
    /// Output format
    pub format: String,
}

/// Execute a SQL query against the warehouse
pub fn handle_query(args: &QueryArgs) -> Result<(), CliError> {
    let ctx = Context::load(&args.config)?;

    // Parse output format
    let output_format: OutputFormat = args.format.parse().map_err(CliError::InvalidArgument)?;

    let rt = runtime()?;

    rt.block_on(async {
        let warehouse = open_warehouse(&ctx).await?;
        let result = warehouse.query(&args.sql).await?;

        println!("{}", format_query_result(&result, output_format));

        // Print execution time for non-JSON formats
        if output_format != OutputFormat::Json {
            eprintln!("\nExecution time: {}ms", result.execution_time_ms);
        }

        warehouse.close().await?;
        Ok::<(), CliError>(())
    })
}
