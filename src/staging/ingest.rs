//! File discovery and JSON parsing

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::IngestError;

/// Statistics from loading one staging table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    /// Target table
    pub table: String,
    /// Number of files read
    pub files_processed: usize,
    /// Number of records inserted
    pub records_ingested: usize,
    /// Total bytes read
    pub bytes_processed: u64,
    /// Text values shortened to fit a bounded column
    pub values_truncated: usize,
    /// Duration of the load
    #[serde(skip)]
    pub duration: Duration,
}

impl IngestStats {
    /// Create new empty stats for a table
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Get records per second throughput
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.records_ingested as f64 / secs
        }
    }

    /// Format duration as human-readable string
    pub fn duration_string(&self) -> String {
        let secs = self.duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}

/// A discovered file to load
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// Discover JSON files under a local source
///
/// `source` may be a single file, a directory (searched recursively for
/// `*.json`), or a glob pattern.
pub fn discover_local_files(source: &str) -> Result<Vec<DiscoveredFile>, IngestError> {
    let source_path = Path::new(source);

    let pattern = if source_path.is_file() {
        return Ok(vec![DiscoveredFile {
            path: source_path.to_path_buf(),
            size: fs::metadata(source_path)?.len(),
        }]);
    } else if source_path.is_dir() {
        format!("{}/**/*.json", source.trim_end_matches('/'))
    } else if source.contains(['*', '?', '[']) {
        source.to_string()
    } else {
        return Err(IngestError::SourceNotFound(source_path.to_path_buf()));
    };

    let entries = glob::glob(&pattern)
        .map_err(|e| IngestError::InvalidPattern(format!("{}: {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    let metadata = fs::metadata(&path)?;
                    files.push(DiscoveredFile {
                        path,
                        size: metadata.len(),
                    });
                }
            }
            Err(e) => {
                tracing::warn!("Error accessing path: {}", e);
            }
        }
    }

    // Sort by path for consistent ordering
    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(files)
}

/// Parse every JSON object in a file
///
/// Accepts newline-delimited JSON as well as objects concatenated or spread
/// over several lines. Every top-level value must be an object.
pub fn parse_json_objects(
    path: &Path,
) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, IngestError> {
    let content = fs::read_to_string(path)?;
    parse_json_objects_str(path, &content)
}

pub(crate) fn parse_json_objects_str(
    path: &Path,
    content: &str,
) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, IngestError> {
    let stream = serde_json::Deserializer::from_str(content).into_iter::<serde_json::Value>();
    let mut records = Vec::new();

    for (index, value) in stream.enumerate() {
        let value = value.map_err(|e| IngestError::JsonParse {
            path: path.to_path_buf(),
            record: index,
            error: e.to_string(),
        })?;

        match value {
            serde_json::Value::Object(map) => records.push(map),
            other => {
                return Err(IngestError::JsonParse {
                    path: path.to_path_buf(),
                    record: index,
                    error: format!("expected a JSON object, found {}", json_kind(&other)),
                });
            }
        }
    }

    Ok(records)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
