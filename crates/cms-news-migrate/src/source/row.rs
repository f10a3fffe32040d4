//! Raw legacy rows.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::error::{MigrateError, Result};

/// A single raw column value.
#[derive(Debug, Clone, PartialEq)]
pub enum RowValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl RowValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RowValue::Null)
    }

    /// Integer view; numeric text is parsed, everything else is `None`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RowValue::Int(v) => Some(*v),
            RowValue::Float(v) => Some(*v as i64),
            RowValue::Text(s) => s.trim().parse().ok(),
            RowValue::Null => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            RowValue::Null => JsonValue::Null,
            RowValue::Int(v) => JsonValue::from(*v),
            RowValue::Float(v) => JsonValue::from(*v),
            RowValue::Text(s) => JsonValue::from(s.as_str()),
        }
    }
}

impl From<i64> for RowValue {
    fn from(v: i64) -> Self {
        RowValue::Int(v)
    }
}

impl From<i32> for RowValue {
    fn from(v: i32) -> Self {
        RowValue::Int(v.into())
    }
}

impl From<&str> for RowValue {
    fn from(v: &str) -> Self {
        RowValue::Text(v.to_string())
    }
}

impl From<String> for RowValue {
    fn from(v: String) -> Self {
        RowValue::Text(v)
    }
}

impl<T: Into<RowValue>> From<Option<T>> for RowValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(RowValue::Null)
    }
}

/// One row read from a legacy table, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyRow {
    columns: BTreeMap<String, RowValue>,
}

impl LegacyRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column setter.
    pub fn with(mut self, column: &str, value: impl Into<RowValue>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: impl Into<RowValue>) {
        self.columns.insert(column.to_string(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&RowValue> {
        self.columns.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &RowValue)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Required integer column.
    pub fn int(&self, column: &str) -> Result<i64> {
        self.get(column).and_then(RowValue::as_i64).ok_or_else(|| {
            MigrateError::Source(format!("column '{}' missing or not an integer", column))
        })
    }

    /// Integer column, with a default for NULL or missing values.
    pub fn int_or(&self, column: &str, default: i64) -> i64 {
        self.get(column).and_then(RowValue::as_i64).unwrap_or(default)
    }

    /// Text column; NULL and missing columns read as empty.
    pub fn text(&self, column: &str) -> String {
        match self.get(column) {
            Some(RowValue::Text(s)) => s.clone(),
            Some(RowValue::Int(v)) => v.to_string(),
            Some(RowValue::Float(v)) => v.to_string(),
            Some(RowValue::Null) | None => String::new(),
        }
    }

    /// Optional ID reference. Zero and NULL both mean "no reference".
    pub fn opt_id(&self, column: &str) -> Option<i64> {
        self.get(column)
            .and_then(RowValue::as_i64)
            .filter(|id| *id != 0)
    }

    /// Boolean flag column (non-zero is true).
    pub fn flag(&self, column: &str) -> bool {
        self.int_or(column, 0) != 0
    }

    /// Column value as JSON, `null` when missing.
    pub fn json(&self, column: &str) -> JsonValue {
        self.get(column)
            .map(RowValue::to_json)
            .unwrap_or(JsonValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opt_id_treats_zero_and_null_as_absent() {
        let row = LegacyRow::new()
            .with("userID", 0)
            .with("groupID", RowValue::Null)
            .with("objectID", 12);
        assert_eq!(row.opt_id("userID"), None);
        assert_eq!(row.opt_id("groupID"), None);
        assert_eq!(row.opt_id("missing"), None);
        assert_eq!(row.opt_id("objectID"), Some(12));
    }

    #[test]
    fn test_int_parses_numeric_text() {
        let row = LegacyRow::new().with("newsID", "42");
        assert_eq!(row.int("newsID").unwrap(), 42);
        assert!(row.int("other").is_err());
    }

    #[test]
    fn test_text_and_json() {
        let row = LegacyRow::new()
            .with("subject", "Hello")
            .with("time", 1_400_000_000)
            .with("teaser", RowValue::Null);
        assert_eq!(row.text("subject"), "Hello");
        assert_eq!(row.text("teaser"), "");
        assert_eq!(row.json("time"), serde_json::json!(1_400_000_000));
        assert_eq!(row.json("teaser"), JsonValue::Null);
    }
}
