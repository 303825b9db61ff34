//! CLI binary entry point for dwh-etl

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::init::{InitArgs, handle_init};
use commands::query::{QueryArgs, handle_query};
use commands::run::{RunArgs, handle_run};
use commands::sql::{SqlArgs, handle_sql};
use commands::status::{StatusArgs, handle_status};
use dwh_etl::Phase;
use dwh_etl::warehouse::config::CONFIG_FILENAME;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dwh-etl")]
#[command(about = "Load song play logs and song metadata into a star schema")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Log every statement as it runs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Drop and recreate all staging, fact and dimension tables
    CreateTables,

    /// Load the staging tables and build the star schema
    Etl,

    /// Drop, create, load and transform in one run
    Run,

    /// Print the SQL statements without running them
    Sql {
        /// Only print one phase (drop, create, copy, insert)
        #[arg(short, long)]
        phase: Option<String>,
        /// Render for a backend other than the configured one
        #[arg(short, long)]
        backend: Option<String>,
    },

    /// Execute a SQL query against the warehouse
    Query {
        /// SQL query to execute
        sql: String,
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show connectivity and row counts per table
    Status,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config;
    let pipeline = |phases: &[Phase]| {
        handle_run(&RunArgs {
            config: config.clone(),
            phases: phases.to_vec(),
        })
    };

    let result = match cli.command {
        Commands::Init { force } => handle_init(&InitArgs {
            config: config.clone(),
            force,
        }),
        Commands::CreateTables => pipeline(&[Phase::Drop, Phase::Create]),
        Commands::Etl => pipeline(&[Phase::Copy, Phase::Insert]),
        Commands::Run => pipeline(&Phase::ALL),
        Commands::Sql { phase, backend } => handle_sql(&SqlArgs {
            config: config.clone(),
            phase,
            backend,
        }),
        Commands::Query { sql, format } => handle_query(&QueryArgs {
            config: config.clone(),
            sql,
            format,
        }),
        Commands::Status => handle_status(&StatusArgs {
            config: config.clone(),
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
