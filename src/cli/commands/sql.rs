//! Print the statement lists without connecting

use std::path::PathBuf;

use dwh_etl::sql::{BulkLoad, StatementLists};
use dwh_etl::warehouse::WarehouseBackendType;
use dwh_etl::{Phase, PipelineConfig};

use super::Context;
use crate::error::CliError;

/// Sql command arguments
#[derive(Debug, Clone)]
pub struct SqlArgs {
    /// Configuration file
    pub config: PathBuf,
    /// Only print this phase
    pub phase: Option<String>,
    /// Render for this backend instead of the configured one
    pub backend: Option<String>,
}

pub fn handle_sql(args: &SqlArgs) -> Result<(), CliError> {
    let ctx = Context::load(&args.config)?;

    let backend: WarehouseBackendType = match &args.backend {
        Some(b) => b.parse().map_err(CliError::InvalidArgument)?,
        None => ctx.config.warehouse.backend,
    };
    let phases: Vec<Phase> = match &args.phase {
        Some(p) => vec![p.parse().map_err(CliError::InvalidArgument)?],
        None => Phase::ALL.to_vec(),
    };

    print!("{}", render(&ctx.config, backend, &phases));
    Ok(())
}

fn render(config: &PipelineConfig, backend: WarehouseBackendType, phases: &[Phase]) -> String {
    let lists = StatementLists::new(config, backend.dialect());
    let mut output = String::new();

    for phase in phases {
        output.push_str(&format!("-- {} ({})\n", phase, backend));
        let statements: Vec<String> = match phase {
            Phase::Drop => lists.drop.clone(),
            Phase::Create => lists.create.clone(),
            Phase::Copy if lists.capabilities.object_storage_copy => lists.copy_sql(),
            Phase::Copy => lists.copy.iter().map(local_load_comment).collect(),
            Phase::Insert => lists.insert_sql(),
        };
        for statement in statements {
            output.push_str(&statement);
            if !statement.ends_with(';') && !statement.starts_with("--") {
                output.push(';');
            }
            output.push_str("\n\n");
        }
    }

    output
}

fn local_load_comment(load: &BulkLoad) -> String {
    format!(
        "-- {}: loaded from local JSON files under {}",
        load.table.name, load.source
    )
}
