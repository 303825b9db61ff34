//! Mapping JSON records onto staging table rows
//!
//! Mirrors what the warehouse COPY does for JSON input: fields are matched to
//! columns by name, extra fields are dropped, missing fields load as NULL and
//! over-long text is cut to the column width.

use serde_json::{Map, Value};

use crate::sql::{ColumnDef, ColumnType, TableDef};
use crate::warehouse::SqlValue;

/// Converts JSON objects into rows in a table's column order
#[derive(Debug, Clone, Copy)]
pub struct RowMapper {
    table: &'static TableDef,
}

/// Why a field could not be stored in its column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unmappable {
    pub column: &'static str,
    pub reason: String,
}

/// One converted row
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    pub values: Vec<SqlValue>,
    /// Number of text values that were truncated
    pub truncated: usize,
}

impl RowMapper {
    pub fn new(table: &'static TableDef) -> Self {
        Self { table }
    }

    /// Column names in insert order
    pub fn columns(&self) -> Vec<&'static str> {
        self.table.column_names()
    }

    /// Convert one record
    pub fn map(&self, record: &Map<String, Value>) -> Result<MappedRow, Unmappable> {
        let mut values = Vec::with_capacity(self.table.columns.len());
        let mut truncated = 0;

        for column in self.table.columns {
            let (value, was_truncated) = match lookup(record, column.name) {
                Some(field) => convert(column, field).map_err(|reason| Unmappable {
                    column: column.name,
                    reason,
                })?,
                None => (SqlValue::Null, false),
            };
            if was_truncated {
                truncated += 1;
            }
            values.push(value);
        }

        Ok(MappedRow { values, truncated })
    }
}

/// Find a field by exact name, falling back to a case-insensitive match
fn lookup<'a>(record: &'a Map<String, Value>, column: &str) -> Option<&'a Value> {
    record.get(column).or_else(|| {
        record
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}

fn convert(column: &ColumnDef, value: &Value) -> Result<(SqlValue, bool), String> {
    if value.is_null() {
        return Ok((SqlValue::Null, false));
    }

    match column.ty {
        ColumnType::Text | ColumnType::Timestamp => Ok((SqlValue::Text(to_text(value)), false)),
        ColumnType::Varchar(width) => {
            let text = to_text(value);
            let cut = truncate_bytes(&text, width as usize);
            let was_truncated = cut.len() < text.len();
            Ok((SqlValue::Text(cut.to_string()), was_truncated))
        }
        ColumnType::SmallInt => to_integer(value, i16::MIN as i64, i16::MAX as i64),
        ColumnType::Integer => to_integer(value, i32::MIN as i64, i32::MAX as i64),
        ColumnType::BigInt => to_integer(value, i64::MIN, i64::MAX),
        ColumnType::Float => to_float(value),
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Longest prefix of at most `max` bytes ending on a character boundary
fn truncate_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn to_integer(value: &Value, min: i64, max: i64) -> Result<(SqlValue, bool), String> {
    let n = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => integral(n.as_f64().unwrap_or(f64::NAN))?,
        },
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok((SqlValue::Null, false));
            }
            match s.parse::<i64>() {
                Ok(i) => i,
                Err(_) => {
                    let f = s
                        .parse::<f64>()
                        .map_err(|_| format!("'{}' is not a number", s))?;
                    integral(f)?
                }
            }
        }
        other => return Err(format!("cannot convert {} to an integer", other)),
    };

    if n < min || n > max {
        return Err(format!("{} is out of range", n));
    }
    Ok((SqlValue::Int(n), false))
}

fn integral(f: f64) -> Result<i64, String> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Ok(f as i64)
    } else {
        Err(format!("{} is not an integer", f))
    }
}

fn to_float(value: &Value) -> Result<(SqlValue, bool), String> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(|f| (SqlValue::Float(f), false))
            .ok_or_else(|| format!("{} is not representable as a float", n)),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok((SqlValue::Null, false));
            }
            s.parse::<f64>()
                .map(|f| (SqlValue::Float(f), false))
                .map_err(|_| format!("'{}' is not a number", s))
        }
        other => Err(format!("cannot convert {} to a float", other)),
    }
}
