//! Column values produced by the generators.

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

/// A single generated or fetched column value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Fixed-point number kept in its exact textual form
    Decimal(String),
    String(String),
    Bytes(Vec<u8>),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// `HH:MM:SS`
    Time(String),
}

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// String form used to track uniqueness, match distribution weights
    /// and key FK lookups.
    pub fn key(&self) -> String {
        self.to_string()
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(n) => Some(*n),
            SqlValue::UInt(n) => i64::try_from(*n).ok(),
            SqlValue::Bool(b) => Some(*b as i64),
            SqlValue::String(s) | SqlValue::Decimal(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Truncate string values to at most `max_chars` characters
    pub fn truncated(self, max_chars: usize) -> Self {
        match self {
            SqlValue::String(s) if s.chars().count() > max_chars => {
                SqlValue::String(s.chars().take(max_chars).collect())
            }
            other => other,
        }
    }
}

/// Whole floats keep one decimal so they stay recognisably fractional
pub fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Int(n) => write!(f, "{}", n),
            SqlValue::UInt(n) => write!(f, "{}", n),
            SqlValue::Float(v) => f.write_str(&format_float(*v)),
            SqlValue::Decimal(s) | SqlValue::String(s) | SqlValue::Time(s) => f.write_str(s),
            SqlValue::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            SqlValue::Bool(b) => f.write_str(if *b { "1" } else { "0" }),
            SqlValue::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            SqlValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}
