//! Pipeline configuration file support
//!
//! Handles parsing of `dwh.toml` configuration files and environment
//! variable overrides. The configuration is loaded once at startup and passed
//! explicitly to the pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{WarehouseError, WarehouseResult};
use crate::sql::load::DEFAULT_REGION;
use crate::sql::{Capabilities, Dialect};

/// Default configuration filename
pub const CONFIG_FILENAME: &str = "dwh.toml";

/// Default database filename for DuckDB
pub const DEFAULT_DUCKDB_FILENAME: &str = "dwh.duckdb";

/// Default Redshift port
pub const DEFAULT_CLUSTER_PORT: u16 = 5439;

/// Environment variable for the warehouse backend
pub const ENV_BACKEND: &str = "DWH_BACKEND";

/// Environment variable for the DuckDB path
pub const ENV_DUCKDB_PATH: &str = "DWH_DUCKDB_PATH";

/// Environment variable for the event log source
pub const ENV_LOG_DATA: &str = "DWH_LOG_DATA";

/// Environment variable for the song metadata source
pub const ENV_SONG_DATA: &str = "DWH_SONG_DATA";

/// Environment variable for the IAM role ARN
pub const ENV_IAM_ROLE_ARN: &str = "DWH_IAM_ROLE_ARN";

/// Environment variable for the cluster password
pub const ENV_DB_PASSWORD: &str = "DWH_DB_PASSWORD";

/// Warehouse backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseBackendType {
    /// DuckDB embedded database (default)
    #[default]
    DuckDB,
    /// PostgreSQL database
    Postgres,
    /// Amazon Redshift cluster (PostgreSQL wire protocol)
    Redshift,
}

impl WarehouseBackendType {
    /// SQL dialect spoken by this backend
    pub fn dialect(self) -> Dialect {
        match self {
            WarehouseBackendType::DuckDB => Dialect::DuckDb,
            WarehouseBackendType::Postgres => Dialect::Postgres,
            WarehouseBackendType::Redshift => Dialect::Redshift,
        }
    }
}

impl std::str::FromStr for WarehouseBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "duckdb" => Ok(WarehouseBackendType::DuckDB),
            "postgres" | "postgresql" => Ok(WarehouseBackendType::Postgres),
            "redshift" => Ok(WarehouseBackendType::Redshift),
            _ => Err(format!(
                "Unknown warehouse backend: {}. Use 'duckdb', 'postgres' or 'redshift'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for WarehouseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarehouseBackendType::DuckDB => write!(f, "duckdb"),
            WarehouseBackendType::Postgres => write!(f, "postgres"),
            WarehouseBackendType::Redshift => write!(f, "redshift"),
        }
    }
}

/// Warehouse selection section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseSection {
    /// Backend type
    #[serde(default)]
    pub backend: WarehouseBackendType,

    /// Path to DuckDB database file (relative to the config file, or absolute)
    #[serde(default = "default_duckdb_path")]
    pub path: String,

    /// Override for emitting DISTKEY/SORTKEY hints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_hints: Option<bool>,
}

fn default_duckdb_path() -> String {
    DEFAULT_DUCKDB_FILENAME.to_string()
}

impl Default for WarehouseSection {
    fn default() -> Self {
        Self {
            backend: WarehouseBackendType::default(),
            path: default_duckdb_path(),
            physical_hints: None,
        }
    }
}

/// Cluster connection section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSection {
    #[serde(rename = "HOST", default)]
    pub host: String,

    #[serde(rename = "DB_NAME", default)]
    pub db_name: String,

    #[serde(rename = "DB_USER", default)]
    pub db_user: String,

    #[serde(rename = "DB_PASSWORD", default)]
    pub db_password: String,

    #[serde(rename = "DB_PORT", default = "default_cluster_port")]
    pub db_port: u16,
}

fn default_cluster_port() -> u16 {
    DEFAULT_CLUSTER_PORT
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            host: String::new(),
            db_name: String::new(),
            db_user: String::new(),
            db_password: String::new(),
            db_port: default_cluster_port(),
        }
    }
}

/// IAM role section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IamRoleSection {
    /// Role the warehouse assumes to read object storage
    #[serde(rename = "ARN", default)]
    pub arn: String,
}

/// Object storage section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Section {
    /// Event log location
    #[serde(rename = "LOG_DATA", default)]
    pub log_data: String,

    /// Optional JSONPaths file for event logs
    #[serde(rename = "LOG_JSONPATH", default, skip_serializing_if = "Option::is_none")]
    pub log_jsonpath: Option<String>,

    /// Song metadata location
    #[serde(rename = "SONG_DATA", default)]
    pub song_data: String,

    /// Bucket region
    #[serde(rename = "REGION", default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Default for S3Section {
    fn default() -> Self {
        Self {
            log_data: String::new(),
            log_jsonpath: None,
            song_data: String::new(),
            region: default_region(),
        }
    }
}

/// Main configuration structure
///
/// Represents the `dwh.toml` configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub warehouse: WarehouseSection,

    #[serde(rename = "CLUSTER", default)]
    pub cluster: ClusterSection,

    #[serde(rename = "IAM_ROLE", default)]
    pub iam_role: IamRoleSection,

    #[serde(rename = "S3", default)]
    pub s3: S3Section,
}

impl PipelineConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a DuckDB configuration reading local JSON directories
    pub fn duckdb(
        path: impl Into<String>,
        log_data: impl Into<String>,
        song_data: impl Into<String>,
    ) -> Self {
        Self {
            warehouse: WarehouseSection {
                backend: WarehouseBackendType::DuckDB,
                path: path.into(),
                physical_hints: None,
            },
            s3: S3Section {
                log_data: log_data.into(),
                song_data: song_data.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Load configuration from a file
    ///
    /// Falls back to defaults if the file does not exist. Environment
    /// variable overrides are applied in both cases.
    pub fn load(config_path: &Path) -> WarehouseResult<Self> {
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| WarehouseError::IoError(format!("Failed to read config: {}", e)))?;

            Self::parse(&content)?
        } else {
            tracing::debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> WarehouseResult<Self> {
        toml::from_str(content)
            .map_err(|e| WarehouseError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a file
    pub fn save(&self, config_path: &Path) -> WarehouseResult<()> {
        let content = self.to_toml()?;

        std::fs::write(config_path, content)
            .map_err(|e| WarehouseError::IoError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> WarehouseResult<String> {
        toml::to_string_pretty(self).map_err(|e| {
            WarehouseError::SerializationError(format!("Failed to serialize config: {}", e))
        })
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(backend) = std::env::var(ENV_BACKEND)
            && let Ok(backend_type) = backend.parse()
        {
            self.warehouse.backend = backend_type;
        }

        if let Ok(path) = std::env::var(ENV_DUCKDB_PATH) {
            self.warehouse.path = path;
        }

        if let Ok(log_data) = std::env::var(ENV_LOG_DATA) {
            self.s3.log_data = log_data;
        }

        if let Ok(song_data) = std::env::var(ENV_SONG_DATA) {
            self.s3.song_data = song_data;
        }

        if let Ok(arn) = std::env::var(ENV_IAM_ROLE_ARN) {
            self.iam_role.arn = arn;
        }

        if let Ok(password) = std::env::var(ENV_DB_PASSWORD) {
            self.cluster.db_password = password;
        }
    }

    /// Check that everything the selected backend needs is present
    pub fn validate(&self) -> WarehouseResult<()> {
        let mut missing = Vec::new();

        if self.s3.log_data.is_empty() {
            missing.push("S3.LOG_DATA");
        }
        if self.s3.song_data.is_empty() {
            missing.push("S3.SONG_DATA");
        }

        match self.warehouse.backend {
            WarehouseBackendType::Redshift => {
                if self.iam_role.arn.is_empty() {
                    missing.push("IAM_ROLE.ARN");
                }
                if self.cluster.host.is_empty() {
                    missing.push("CLUSTER.HOST");
                }
            }
            WarehouseBackendType::Postgres => {
                if self.cluster.host.is_empty() {
                    missing.push("CLUSTER.HOST");
                }
            }
            WarehouseBackendType::DuckDB => {}
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(WarehouseError::ConfigError(format!(
                "Missing required keys: {}",
                missing.join(", ")
            )))
        }
    }

    /// Capabilities for a dialect after applying configured overrides
    pub fn capabilities(&self, dialect: Dialect) -> Capabilities {
        let mut caps = dialect.capabilities();
        if let Some(hints) = self.warehouse.physical_hints {
            caps.physical_layout_hints = hints;
        }
        caps
    }

    /// Get the DuckDB database path, resolved against the config directory
    pub fn get_duckdb_path(&self, base_dir: &Path) -> PathBuf {
        if self.warehouse.path.is_empty() {
            base_dir.join(DEFAULT_DUCKDB_FILENAME)
        } else if Path::new(&self.warehouse.path).is_absolute() {
            PathBuf::from(&self.warehouse.path)
        } else {
            base_dir.join(&self.warehouse.path)
        }
    }

    /// Resolve relative local data paths against the config directory
    ///
    /// Object storage prefixes are left untouched.
    pub fn resolve_data_paths(&mut self, base_dir: &Path) {
        for source in [&mut self.s3.log_data, &mut self.s3.song_data] {
            if source.is_empty() || source.contains("://") || Path::new(source.as_str()).is_absolute() {
                continue;
            }
            *source = base_dir.join(source.as_str()).to_string_lossy().into_owned();
        }
    }

    /// Connection string for PostgreSQL or Redshift built from `[CLUSTER]`
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            quote_conn_value(&self.cluster.host),
            self.cluster.db_port,
            quote_conn_value(&self.cluster.db_name),
            quote_conn_value(&self.cluster.db_user),
            quote_conn_value(&self.cluster.db_password),
        )
    }

    /// Connection string with the password masked, for logging
    pub fn connection_string_masked(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password=****",
            self.cluster.host, self.cluster.db_port, self.cluster.db_name, self.cluster.db_user,
        )
    }
}

/// Quote a key/value connection parameter when it contains spaces or quotes
fn quote_conn_value(value: &str) -> String {
    if value.is_empty() || value.contains([' ', '\'', '\\']) {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
    } else {
        value.to_string()
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# Star-schema loader configuration

[warehouse]
# Backend: "duckdb" (default), "postgres" or "redshift"
backend = "duckdb"

# Path to DuckDB database file (relative to this file, or absolute)
path = "dwh.duckdb"

# Emit DISTKEY/SORTKEY hints (defaults to true on redshift only)
# physical_hints = true

# Cluster connection (used when backend = "postgres" or "redshift")
[CLUSTER]
HOST = ""
DB_NAME = "dwh"
DB_USER = "dwhuser"
DB_PASSWORD = ""
DB_PORT = 5439

[IAM_ROLE]
# Role the cluster assumes to read the source bucket (redshift only)
ARN = ""

[S3]
# Local directories for duckdb/postgres, s3:// prefixes for redshift
LOG_DATA = "data/log_data"
SONG_DATA = "data/song_data"
# LOG_JSONPATH = "s3://udacity-dend/log_json_path.json"
REGION = "us-west-2"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::new();
        assert_eq!(config.warehouse.backend, WarehouseBackendType::DuckDB);
        assert_eq!(config.warehouse.path, DEFAULT_DUCKDB_FILENAME);
        assert_eq!(config.cluster.db_port, DEFAULT_CLUSTER_PORT);
        assert_eq!(config.s3.region, "us-west-2");
        assert!(config.s3.log_jsonpath.is_none());
    }

    #[test]
    fn test_parse_redshift_config() {
        let toml = r#"
[warehouse]
backend = "redshift"

[CLUSTER]
HOST = "dwh.abc123.us-west-2.redshift.amazonaws.com"
DB_NAME = "dev"
DB_USER = "awsuser"
DB_PASSWORD = "Passw0rd"
DB_PORT = 5439

[IAM_ROLE]
ARN = "arn:aws:iam::123456789012:role/dwhRole"

[S3]
LOG_DATA = "s3://udacity-dend/log_data"
LOG_JSONPATH = "s3://udacity-dend/log_json_path.json"
SONG_DATA = "s3://udacity-dend/song_data"
"#;
        let config = PipelineConfig::parse(toml).unwrap();
        assert_eq!(config.warehouse.backend, WarehouseBackendType::Redshift);
        assert_eq!(config.cluster.db_name, "dev");
        assert_eq!(config.iam_role.arn, "arn:aws:iam::123456789012:role/dwhRole");
        assert_eq!(config.s3.log_data, "s3://udacity-dend/log_data");
        assert_eq!(
            config.s3.log_jsonpath.as_deref(),
            Some("s3://udacity-dend/log_json_path.json")
        );
        assert_eq!(config.s3.region, "us-west-2");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_missing_keys() {
        let config = PipelineConfig::parse(
            r#"
[warehouse]
backend = "redshift"
"#,
        )
        .unwrap();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("S3.LOG_DATA"));
        assert!(err.contains("S3.SONG_DATA"));
        assert!(err.contains("IAM_ROLE.ARN"));
        assert!(err.contains("CLUSTER.HOST"));
    }

    #[test]
    fn test_duckdb_needs_no_role() {
        let config = PipelineConfig::duckdb("test.duckdb", "data/log_data", "data/song_data");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        let config = PipelineConfig::duckdb("my.duckdb", "logs", "songs");

        config.save(&path).unwrap();
        assert!(path.exists());

        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded.warehouse.path, "my.duckdb");
        assert_eq!(loaded.s3.song_data, "songs");
    }

    #[test]
    fn test_get_duckdb_path() {
        let config = PipelineConfig::duckdb("relative.duckdb", "", "");
        assert_eq!(
            config.get_duckdb_path(Path::new("/srv/etl")),
            PathBuf::from("/srv/etl/relative.duckdb")
        );
    }

    #[test]
    fn test_connection_string() {
        let mut config = PipelineConfig::new();
        config.cluster.host = "localhost".to_string();
        config.cluster.db_name = "dwh".to_string();
        config.cluster.db_user = "etl".to_string();
        config.cluster.db_password = "it's secret".to_string();
        config.cluster.db_port = 5432;

        assert_eq!(
            config.connection_string(),
            "host=localhost port=5432 dbname=dwh user=etl password='it\\'s secret'"
        );
        assert!(!config.connection_string_masked().contains("secret"));
    }

    #[test]
    fn test_capability_override() {
        let mut config = PipelineConfig::new();
        assert!(config.capabilities(Dialect::Redshift).physical_layout_hints);

        config.warehouse.physical_hints = Some(false);
        assert!(!config.capabilities(Dialect::Redshift).physical_layout_hints);

        config.warehouse.physical_hints = Some(true);
        assert!(config.capabilities(Dialect::DuckDb).physical_layout_hints);
    }

    #[test]
    fn test_backend_type_from_str() {
        assert_eq!(
            "redshift".parse::<WarehouseBackendType>().unwrap(),
            WarehouseBackendType::Redshift
        );
        assert_eq!(
            "postgresql".parse::<WarehouseBackendType>().unwrap(),
            WarehouseBackendType::Postgres
        );
        assert!("oracle".parse::<WarehouseBackendType>().is_err());
        assert_eq!(WarehouseBackendType::Redshift.dialect(), Dialect::Redshift);
    }

    #[test]
    fn test_sample_config_is_valid() {
        let sample = sample_config();
        let config = PipelineConfig::parse(sample).expect("Sample config should be valid TOML");
        assert_eq!(config.s3.log_data, "data/log_data");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_data_paths() {
        let mut config = PipelineConfig::duckdb("dwh.duckdb", "data/log_data", "/abs/song_data");
        config.resolve_data_paths(Path::new("/project"));
        assert_eq!(config.s3.log_data, "/project/data/log_data");
        assert_eq!(config.s3.song_data, "/abs/song_data");

        let mut config = PipelineConfig::duckdb("dwh.duckdb", "s3://bucket/log_data", "");
        config.resolve_data_paths(Path::new("/project"));
        assert_eq!(config.s3.log_data, "s3://bucket/log_data");
        assert_eq!(config.s3.song_data, "");
    }
}
