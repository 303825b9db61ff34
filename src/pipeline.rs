//! Pipeline orchestration
//!
//! Runs the statement lists against one warehouse connection: drop, create,
//! copy, insert. Statements run one at a time in list order and the first
//! failure stops the run.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sql::{BulkLoad, StatementLists};
use crate::staging::{self, IngestError, IngestStats};
use crate::warehouse::{PipelineConfig, Warehouse, WarehouseError};

/// A stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Drop,
    Create,
    Copy,
    Insert,
}

impl Phase {
    /// Every phase in execution order
    pub const ALL: [Phase; 4] = [Phase::Drop, Phase::Create, Phase::Copy, Phase::Insert];
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Drop => write!(f, "drop"),
            Phase::Create => write!(f, "create"),
            Phase::Copy => write!(f, "copy"),
            Phase::Insert => write!(f, "insert"),
        }
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(Phase::Drop),
            "create" => Ok(Phase::Create),
            "copy" => Ok(Phase::Copy),
            "insert" => Ok(Phase::Insert),
            _ => Err(format!("Unknown phase: {}", s)),
        }
    }
}

/// Error raised by a pipeline run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A statement failed; earlier statements stay applied
    #[error("{phase} statement {index} failed: {source}")]
    Statement {
        phase: Phase,
        index: usize,
        #[source]
        source: WarehouseError,
    },

    /// A local staging load failed; nothing was loaded into that table
    #[error("copy statement {index} failed: {source}")]
    Load {
        index: usize,
        #[source]
        source: IngestError,
    },
}

/// Summary of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Unique id of this run, attached to its log lines
    pub run_id: Uuid,
    /// Backend the run executed on
    pub backend: String,
    /// Statements executed per phase
    pub statements: BTreeMap<Phase, usize>,
    /// Local staging loads, one per staging table
    pub loads: Vec<IngestStats>,
    #[serde(skip)]
    pub duration: Duration,
}

impl RunReport {
    fn new(backend: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            backend: backend.to_string(),
            statements: BTreeMap::new(),
            loads: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Total statements executed
    pub fn total_statements(&self) -> usize {
        self.statements.values().sum()
    }

    /// Records loaded into staging tables from local files
    pub fn rows_loaded(&self) -> usize {
        self.loads.iter().map(|l| l.records_ingested).sum()
    }
}

/// Runs the statement lists on a warehouse
pub struct Pipeline<'a, W: Warehouse + ?Sized> {
    warehouse: &'a W,
    statements: StatementLists,
}

impl<'a, W: Warehouse + ?Sized> Pipeline<'a, W> {
    /// Build the statement lists for the warehouse's dialect
    pub fn new(warehouse: &'a W, config: &PipelineConfig) -> Self {
        Self {
            warehouse,
            statements: StatementLists::new(config, warehouse.dialect()),
        }
    }

    /// The statements this pipeline will run
    pub fn statements(&self) -> &StatementLists {
        &self.statements
    }

    /// Drop and recreate every table
    pub async fn create_tables(&self) -> Result<RunReport, PipelineError> {
        self.run(&[Phase::Drop, Phase::Create]).await
    }

    /// Load staging tables and build the star schema
    pub async fn etl(&self) -> Result<RunReport, PipelineError> {
        self.run(&[Phase::Copy, Phase::Insert]).await
    }

    /// Run all four phases
    pub async fn run_all(&self) -> Result<RunReport, PipelineError> {
        self.run(&Phase::ALL).await
    }

    /// Run the given phases in the order given
    pub async fn run(&self, phases: &[Phase]) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        let mut report = RunReport::new(self.warehouse.backend_type());

        tracing::info!(
            run_id = %report.run_id,
            backend = %report.backend,
            "Starting pipeline run"
        );

        for &phase in phases {
            let phase_start = Instant::now();
            tracing::info!(run_id = %report.run_id, "Phase {} started", phase);

            let executed = match phase {
                Phase::Drop => self.execute_all(phase, &self.statements.drop).await?,
                Phase::Create => self.execute_all(phase, &self.statements.create).await?,
                Phase::Copy => self.copy(&mut report).await?,
                Phase::Insert => {
                    self.execute_all(phase, &self.statements.insert_sql())
                        .await?
                }
            };

            *report.statements.entry(phase).or_insert(0) += executed;
            tracing::info!(
                run_id = %report.run_id,
                "Phase {} finished: {} statements in {}ms",
                phase,
                executed,
                phase_start.elapsed().as_millis()
            );
        }

        report.duration = start.elapsed();
        tracing::info!(
            run_id = %report.run_id,
            "Pipeline run finished: {} statements, {} rows loaded",
            report.total_statements(),
            report.rows_loaded()
        );

        Ok(report)
    }

    async fn execute_all(&self, phase: Phase, statements: &[String]) -> Result<usize, PipelineError> {
        for (index, sql) in statements.iter().enumerate() {
            tracing::debug!("Executing {} statement {}:\n{}", phase, index, sql);
            self.warehouse
                .execute(sql)
                .await
                .map_err(|source| PipelineError::Statement {
                    phase,
                    index,
                    source,
                })?;
        }
        Ok(statements.len())
    }

    async fn copy(&self, report: &mut RunReport) -> Result<usize, PipelineError> {
        let in_warehouse = self.statements.capabilities.object_storage_copy;

        for (index, load) in self.statements.copy.iter().enumerate() {
            if in_warehouse {
                self.copy_in_warehouse(index, load).await?;
            } else {
                tracing::debug!(
                    "Loading {} from local files under {}",
                    load.table.name,
                    load.source
                );
                let stats = staging::load_local(self.warehouse, load)
                    .await
                    .map_err(|source| PipelineError::Load { index, source })?;
                report.loads.push(stats);
            }
        }

        Ok(self.statements.copy.len())
    }

    async fn copy_in_warehouse(&self, index: usize, load: &BulkLoad) -> Result<(), PipelineError> {
        let sql = load.to_copy_sql();
        tracing::debug!("Executing copy statement {}:\n{}", index, sql);
        self.warehouse
            .execute(&sql)
            .await
            .map_err(|source| PipelineError::Statement {
                phase: Phase::Copy,
                index,
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::Dialect;
    use crate::warehouse::{QueryResult, SqlValue, WarehouseResult};
    use async_trait::async_trait;
    use std::cell::RefCell;
    use std::str::FromStr;

    /// Records executed SQL and fails on a chosen statement
    struct RecordingWarehouse {
        dialect: Dialect,
        executed: RefCell<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingWarehouse {
        fn new(dialect: Dialect) -> Self {
            Self {
                dialect,
                executed: RefCell::new(Vec::new()),
                fail_on: None,
            }
        }
    }

    #[async_trait(?Send)]
    impl Warehouse for RecordingWarehouse {
        async fn execute(&self, sql: &str) -> WarehouseResult<()> {
            if let Some(needle) = self.fail_on {
                if sql.contains(needle) {
                    return Err(WarehouseError::QueryFailed(format!("boom: {}", needle)));
                }
            }
            self.executed.borrow_mut().push(sql.to_string());
            Ok(())
        }

        async fn query(&self, _sql: &str) -> WarehouseResult<QueryResult> {
            Ok(QueryResult::empty())
        }

        async fn insert_rows(
            &self,
            _table: &str,
            _columns: &[&str],
            rows: &[Vec<SqlValue>],
        ) -> WarehouseResult<usize> {
            Ok(rows.len())
        }

        fn dialect(&self) -> Dialect {
            self.dialect
        }

        fn backend_type(&self) -> &'static str {
            "recording"
        }

        async fn health_check(&self) -> WarehouseResult<bool> {
            Ok(true)
        }

        async fn close(&self) -> WarehouseResult<()> {
            Ok(())
        }
    }

    fn redshift_config() -> PipelineConfig {
        PipelineConfig::parse(
            r#"
[warehouse]
backend = "redshift"

[CLUSTER]
HOST = "example.redshift.amazonaws.com"

[IAM_ROLE]
ARN = "arn:aws:iam::123456789012:role/dwhRole"

[S3]
LOG_DATA = "s3://udacity-dend/log_data"
SONG_DATA = "s3://udacity-dend/song_data"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_phase_order_and_parsing() {
        assert_eq!(
            Phase::ALL,
            [Phase::Drop, Phase::Create, Phase::Copy, Phase::Insert]
        );
        assert_eq!(Phase::from_str("COPY").unwrap(), Phase::Copy);
        assert!(Phase::from_str("vacuum").is_err());
        assert_eq!(Phase::Insert.to_string(), "insert");
    }

    #[tokio::test]
    async fn test_run_all_executes_lists_in_order() {
        let warehouse = RecordingWarehouse::new(Dialect::Redshift);
        let pipeline = Pipeline::new(&warehouse, &redshift_config());

        let report = pipeline.run_all().await.unwrap();

        let executed = warehouse.executed.borrow();
        assert_eq!(executed.len(), 7 + 7 + 2 + 5);
        assert!(executed[0].starts_with("DROP TABLE IF EXISTS staging_events"));
        assert!(executed[7].starts_with("CREATE TABLE IF NOT EXISTS staging_events"));
        assert!(executed[14].starts_with("COPY staging_events FROM 's3://udacity-dend/log_data'"));
        assert!(executed[15].starts_with("COPY staging_songs"));
        assert!(executed[16].starts_with("INSERT INTO factSongplay"));
        assert!(executed[20].starts_with("INSERT INTO dimTime"));

        assert_eq!(report.total_statements(), 21);
        assert_eq!(report.statements[&Phase::Copy], 2);
        assert_eq!(report.rows_loaded(), 0);
    }

    #[tokio::test]
    async fn test_create_tables_only_drops_and_creates() {
        let warehouse = RecordingWarehouse::new(Dialect::Redshift);
        let pipeline = Pipeline::new(&warehouse, &redshift_config());

        let report = pipeline.create_tables().await.unwrap();

        assert_eq!(report.total_statements(), 14);
        assert!(!report.statements.contains_key(&Phase::Copy));
    }

    #[tokio::test]
    async fn test_failure_stops_run_with_phase_and_index() {
        let mut warehouse = RecordingWarehouse::new(Dialect::Redshift);
        warehouse.fail_on = Some("INSERT INTO dimUser");
        let pipeline = Pipeline::new(&warehouse, &redshift_config());

        let err = pipeline.etl().await.unwrap_err();

        match err {
            PipelineError::Statement { phase, index, .. } => {
                assert_eq!(phase, Phase::Insert);
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {}", other),
        }

        let executed = warehouse.executed.borrow();
        assert!(!executed.iter().any(|s| s.contains("dimSong")));
    }
}
