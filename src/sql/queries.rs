//! The four ordered statement lists
//!
//! A run executes them in this order: drop, create, copy, insert.

use super::load::{BulkLoad, JsonFormat};
use super::schema::{ALL_TABLES, STAGING_EVENTS, STAGING_SONGS};
use super::transform::{self, Transform};
use super::{Capabilities, Dialect};
use crate::warehouse::config::PipelineConfig;

/// Ordered statements for one pipeline run
#[derive(Debug, Clone)]
pub struct StatementLists {
    pub dialect: Dialect,
    pub capabilities: Capabilities,
    pub drop: Vec<String>,
    pub create: Vec<String>,
    pub copy: Vec<BulkLoad>,
    pub insert: Vec<Transform>,
}

impl StatementLists {
    /// Build all lists for a dialect, using the configured capability overrides
    pub fn new(config: &PipelineConfig, dialect: Dialect) -> Self {
        let capabilities = config.capabilities(dialect);

        Self {
            dialect,
            capabilities,
            drop: ALL_TABLES
                .iter()
                .map(|t| t.drop_sql(capabilities))
                .collect(),
            create: ALL_TABLES
                .iter()
                .map(|t| t.create_sql(dialect, capabilities))
                .collect(),
            copy: bulk_loads(config),
            insert: transform::all(dialect),
        }
    }

    /// COPY statements as SQL text
    pub fn copy_sql(&self) -> Vec<String> {
        self.copy.iter().map(BulkLoad::to_copy_sql).collect()
    }

    /// Transform statements as SQL text
    pub fn insert_sql(&self) -> Vec<String> {
        self.insert.iter().map(|t| t.sql.clone()).collect()
    }
}

fn bulk_loads(config: &PipelineConfig) -> Vec<BulkLoad> {
    let events_format = match &config.s3.log_jsonpath {
        Some(path) if !path.is_empty() => JsonFormat::JsonPaths(path.clone()),
        _ => JsonFormat::AutoIgnoreCase,
    };

    vec![
        BulkLoad {
            table: &STAGING_EVENTS,
            source: config.s3.log_data.clone(),
            iam_role: config.iam_role.arn.clone(),
            region: config.s3.region.clone(),
            format: events_format,
        },
        BulkLoad {
            table: &STAGING_SONGS,
            source: config.s3.song_data.clone(),
            iam_role: config.iam_role.arn.clone(),
            region: config.s3.region.clone(),
            format: JsonFormat::Auto,
        },
    ]
}

/// Drop statements, one per table
pub fn drop_table_queries(config: &PipelineConfig, dialect: Dialect) -> Vec<String> {
    StatementLists::new(config, dialect).drop
}

/// Create statements, one per table
pub fn create_table_queries(config: &PipelineConfig, dialect: Dialect) -> Vec<String> {
    StatementLists::new(config, dialect).create
}

/// Warehouse COPY statements for the two staging tables
pub fn copy_table_queries(config: &PipelineConfig) -> Vec<String> {
    StatementLists::new(config, Dialect::Redshift).copy_sql()
}

/// Transform statements, fact table first
pub fn insert_table_queries(config: &PipelineConfig, dialect: Dialect) -> Vec<String> {
    StatementLists::new(config, dialect).insert_sql()
}
