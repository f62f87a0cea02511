// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Row-change events as delivered by the replication log reader.
//!
//! A [`RowChangeEvent`] carries no column names, only positional values in
//! the source table's column order. The typed records in [`crate::record`]
//! give those positions meaning.

use crate::position::LogPosition;
use chrono::NaiveDateTime;

/// Row operation captured from the replication log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowAction {
    Insert,
    Update,
    Delete,
}

impl RowAction {
    /// Parse the action names used by binlog readers ("insert", "update", "delete").
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "insert" | "write" => Some(RowAction::Insert),
            "update" => Some(RowAction::Update),
            "delete" => Some(RowAction::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RowAction::Insert => "insert",
            RowAction::Update => "update",
            RowAction::Delete => "delete",
        }
    }
}

impl std::fmt::Display for RowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    /// DECIMAL columns, kept as their exact textual form.
    Decimal(String),
    Text(String),
    /// Raw bytes; binlog readers often deliver VARCHAR columns this way.
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
}

impl ColumnValue {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnValue::Null => "null",
            ColumnValue::Int(_) => "integer",
            ColumnValue::UInt(_) => "unsigned",
            ColumnValue::Float(_) => "float",
            ColumnValue::Decimal(_) => "decimal",
            ColumnValue::Text(_) => "text",
            ColumnValue::Bytes(_) => "bytes",
            ColumnValue::DateTime(_) => "datetime",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }
}

impl From<i64> for ColumnValue {
    fn from(v: i64) -> Self {
        ColumnValue::Int(v)
    }
}

impl From<i32> for ColumnValue {
    fn from(v: i32) -> Self {
        ColumnValue::Int(v as i64)
    }
}

impl From<u64> for ColumnValue {
    fn from(v: u64) -> Self {
        ColumnValue::UInt(v)
    }
}

impl From<f64> for ColumnValue {
    fn from(v: f64) -> Self {
        ColumnValue::Float(v)
    }
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        ColumnValue::Text(v.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(v: String) -> Self {
        ColumnValue::Text(v)
    }
}

impl From<NaiveDateTime> for ColumnValue {
    fn from(v: NaiveDateTime) -> Self {
        ColumnValue::DateTime(v)
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ColumnValue::Null)
    }
}

/// A single row-level change captured from the replication log.
#[derive(Debug, Clone, PartialEq)]
pub struct RowChangeEvent {
    /// Unqualified source table name.
    pub source_table: String,
    pub action: RowAction,
    /// Log position of the event.
    pub position: LogPosition,
    /// Column values in the source table's column order.
    pub columns: Vec<ColumnValue>,
}

impl RowChangeEvent {
    pub fn new(
        source_table: impl Into<String>,
        action: RowAction,
        position: LogPosition,
        columns: Vec<ColumnValue>,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            action,
            position,
            columns,
        }
    }

    /// Shorthand for an insert event, the only action the relay mirrors.
    pub fn insert(
        source_table: impl Into<String>,
        position: LogPosition,
        columns: Vec<ColumnValue>,
    ) -> Self {
        Self::new(source_table, RowAction::Insert, position, columns)
    }
}
