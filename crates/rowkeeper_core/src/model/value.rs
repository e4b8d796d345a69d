//! Dynamically typed column values.
//!
//! # Responsibility
//! - Hold one column value of an entity value store.
//! - Convert between Rust values, SQL parameters and decoded rows.
//!
//! # Invariants
//! - Accessors never panic; mismatches surface as `ValueError`.
//! - Timestamps carry second precision and no timezone.

use super::column::TypeFamily;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::{Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Wire format used for timestamps in SQL text and JSON diagnostics.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One column value held by an entity value store.
///
/// Absence of a key in the store means "unset"; `Value::Null` is an explicit
/// SQL NULL written by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
}

/// Typed decode failure for dynamic values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    InvalidTimestamp(String),
}

impl Display for ValueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeMismatch { expected, found } => {
                write!(f, "value type mismatch: expected {expected}, found {found}")
            }
            Self::InvalidTimestamp(text) => write!(f, "invalid timestamp `{text}`"),
        }
    }
}

impl Error for ValueError {}

impl Value {
    /// Short type label used in errors and logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Result<&str, ValueError> {
        match self {
            Self::Text(text) => Ok(text.as_str()),
            other => Err(other.mismatch("text")),
        }
    }

    pub fn as_i64(&self) -> Result<i64, ValueError> {
        match self {
            Self::Integer(value) => Ok(*value),
            other => Err(other.mismatch("integer")),
        }
    }

    pub fn as_f64(&self) -> Result<f64, ValueError> {
        match self {
            Self::Float(value) => Ok(*value),
            Self::Integer(value) => Ok(*value as f64),
            other => Err(other.mismatch("float")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ValueError> {
        match self {
            Self::Bool(value) => Ok(*value),
            other => Err(other.mismatch("bool")),
        }
    }

    /// Decodes a timestamp, accepting text in the canonical wire format.
    pub fn as_timestamp(&self) -> Result<NaiveDateTime, ValueError> {
        match self {
            Self::Timestamp(value) => Ok(*value),
            Self::Text(text) => parse_timestamp(text),
            other => Err(other.mismatch("timestamp")),
        }
    }

    /// Renders the value as plain text, `NULL` as the empty string.
    ///
    /// Used for LIKE patterns and key diagnostics, never for typed decoding.
    pub fn to_text_lossy(&self) -> String {
        self.to_string()
    }

    fn mismatch(&self, expected: &'static str) -> ValueError {
        ValueError::TypeMismatch {
            expected,
            found: self.kind_name(),
        }
    }

    /// Decodes one SQLite cell using the declared column type family.
    ///
    /// Returns `None` for SQL NULL so callers can leave the column unset.
    pub fn from_sql_ref(cell: ValueRef<'_>, family: TypeFamily) -> Option<Self> {
        match cell {
            ValueRef::Null => None,
            ValueRef::Integer(value) => Some(match family {
                TypeFamily::Bool => Self::Bool(value != 0),
                TypeFamily::Float => Self::Float(value as f64),
                TypeFamily::Text => Self::Text(value.to_string()),
                _ => Self::Integer(value),
            }),
            ValueRef::Real(value) => Some(Self::Float(value)),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                let text = String::from_utf8_lossy(bytes).into_owned();
                Some(match family {
                    TypeFamily::DateTime => match parse_timestamp(&text) {
                        Ok(timestamp) => Self::Timestamp(timestamp),
                        Err(_) => Self::Text(text),
                    },
                    TypeFamily::Integer => match text.trim().parse::<i64>() {
                        Ok(value) => Self::Integer(value),
                        Err(_) => Self::Text(text),
                    },
                    _ => Self::Text(text),
                })
            }
        }
    }
}

/// Current local time truncated to whole seconds.
pub fn now_timestamp() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Parses `YYYY-MM-DD HH:MM:SS`, its `T`-separated form, or a bare date.
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, ValueError> {
    let trimmed = text.trim();
    for format in [TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(value) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(value);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ValueError::InvalidTimestamp(trimmed.to_string()))
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(text) => f.write_str(text),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Timestamp(value) => write!(f, "{}", value.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Text(text) => serializer.serialize_str(text),
            Self::Integer(value) => serializer.serialize_i64(*value),
            Self::Float(value) => serializer.serialize_f64(*value),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Timestamp(value) => {
                serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
            }
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Self::Text(text) => ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes())),
            Self::Integer(value) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*value)),
            Self::Float(value) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*value)),
            Self::Bool(value) => {
                ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*value)))
            }
            Self::Timestamp(value) => ToSqlOutput::Owned(rusqlite::types::Value::Text(
                value.format(TIMESTAMP_FORMAT).to_string(),
            )),
        })
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
