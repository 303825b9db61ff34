//! Pipeline commands: create-tables, etl and run

use std::path::PathBuf;

use dwh_etl::{Phase, Pipeline, RunReport};

use super::{Context, open_warehouse, runtime};
use crate::error::CliError;

/// Pipeline command arguments
#[derive(Debug, Clone)]
pub struct RunArgs {
    /// Configuration file
    pub config: PathBuf,
    /// Phases to run, in order
    pub phases: Vec<Phase>,
}

/// Run the requested phases against the configured warehouse
pub fn handle_run(args: &RunArgs) -> Result<(), CliError> {
    let ctx = Context::load(&args.config)?;
    ctx.config.validate()?;

    let rt = runtime()?;

    let report = rt.block_on(async {
        let warehouse = open_warehouse(&ctx).await?;
        let pipeline = Pipeline::new(warehouse.as_ref(), &ctx.config);

        let result = pipeline.run(&args.phases).await;
        warehouse.close().await?;

        Ok::<RunReport, CliError>(result?)
    })?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Run {} on {}", report.run_id, report.backend);
    for (phase, count) in &report.statements {
        println!("  {:<8} {} statements", phase, count);
    }
    for load in &report.loads {
        println!(
            "  loaded   {} records into {} from {} files",
            load.records_ingested, load.table, load.files_processed
        );
    }
    println!("Finished in {:.2}s", report.duration.as_secs_f64());
}
