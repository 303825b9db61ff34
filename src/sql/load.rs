//! Bulk load statements for the staging tables

use super::quote_literal;
use super::schema::TableDef;

/// Default AWS region of the source bucket
pub const DEFAULT_REGION: &str = "us-west-2";

/// How JSON fields are matched to staging columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonFormat {
    /// Field names must equal column names
    Auto,
    /// Field names match column names case-insensitively
    AutoIgnoreCase,
    /// Explicit JSONPaths file mapping fields to columns in order
    JsonPaths(String),
}

impl JsonFormat {
    fn sql(&self) -> String {
        match self {
            JsonFormat::Auto => "'auto'".to_string(),
            JsonFormat::AutoIgnoreCase => "'auto ignorecase'".to_string(),
            JsonFormat::JsonPaths(path) => quote_literal(path),
        }
    }
}

/// A bulk load of one staging table from newline-delimited JSON
///
/// Fields beyond the table's columns are discarded. Values too long for a
/// bounded text column are truncated. A malformed record fails the whole load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkLoad {
    /// Target staging table
    pub table: &'static TableDef,
    /// Object storage prefix, or a local directory for non-warehouse targets
    pub source: String,
    /// IAM role the warehouse assumes to read the source
    pub iam_role: String,
    /// Region of the source bucket
    pub region: String,
    pub format: JsonFormat,
}

impl BulkLoad {
    /// Render the warehouse COPY statement
    pub fn to_copy_sql(&self) -> String {
        format!(
            "COPY {} FROM {}\nCREDENTIALS {}\nFORMAT AS JSON {}\nREGION {}\nTRUNCATECOLUMNS;",
            self.table.name,
            quote_literal(&self.source),
            quote_literal(&format!("aws_iam_role={}", self.iam_role)),
            self.format.sql(),
            quote_literal(&self.region),
        )
    }

    /// Whether the source points at object storage rather than the local filesystem
    pub fn is_object_storage(&self) -> bool {
        let lower = self.source.to_lowercase();
        lower.starts_with("s3://") || lower.starts_with("s3a://")
    }
}
