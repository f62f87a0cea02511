// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Typed transaction records built from positional binlog columns.
//!
//! Each tracked source table has a fixed column layout. The router converts
//! the raw column slice into one of these records before any destination
//! write happens, so schema drift surfaces as a single
//! [`RelayError::RowShape`] or [`RelayError::ColumnType`] instead of a
//! mis-assigned column.
//!
//! # Column layouts
//!
//! ```text
//! start        [pk, event_ts, connector_pk, id_tag, start_ts, start_value]
//! stop         [pk, event_ts, event_actor, stop_ts, stop_value, stop_reason]
//! stop_failed  [pk, event_ts, event_actor, stop_ts, stop_value, stop_reason, fail_reason]
//! ```
//!
//! Columns 1 and 2 of the stop tables are not mirrored.

use crate::error::{RelayError, Result};
use crate::event::ColumnValue;
use chrono::{DateTime, NaiveDateTime};

/// Which lifecycle transition a source table drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleKind {
    Start,
    StopNormal,
    StopFailed,
}

impl LifecycleKind {
    /// Number of columns the source table must deliver.
    pub fn expected_columns(&self) -> usize {
        match self {
            LifecycleKind::Start => 6,
            LifecycleKind::StopNormal => 6,
            LifecycleKind::StopFailed => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleKind::Start => "start",
            LifecycleKind::StopNormal => "stop_normal",
            LifecycleKind::StopFailed => "stop_failed",
        }
    }
}

impl std::fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A new transaction (row in the start table).
#[derive(Debug, Clone, PartialEq)]
pub struct StartRecord {
    pub transaction_pk: i64,
    pub event_timestamp: NaiveDateTime,
    pub connector_pk: i64,
    pub id_tag: String,
    pub start_timestamp: Option<NaiveDateTime>,
    pub start_value: Option<String>,
}

/// A normal stop (row in the stop table).
#[derive(Debug, Clone, PartialEq)]
pub struct StopRecord {
    pub transaction_pk: i64,
    pub stop_timestamp: Option<NaiveDateTime>,
    pub stop_value: Option<String>,
    pub stop_reason: Option<String>,
}

/// A failed stop (row in the stop-failed table).
#[derive(Debug, Clone, PartialEq)]
pub struct FailedStopRecord {
    pub stop: StopRecord,
    pub fail_reason: Option<String>,
}

impl StartRecord {
    pub fn from_columns(table: &str, columns: &[ColumnValue]) -> Result<Self> {
        let cols = Columns::new(table, columns, LifecycleKind::Start)?;
        Ok(Self {
            transaction_pk: cols.integer(0)?,
            event_timestamp: cols.datetime(1)?,
            connector_pk: cols.integer(2)?,
            id_tag: cols.text(3)?,
            start_timestamp: cols.opt_datetime(4)?,
            start_value: cols.opt_text(5)?,
        })
    }
}

impl StopRecord {
    pub fn from_columns(table: &str, columns: &[ColumnValue]) -> Result<Self> {
        let cols = Columns::new(table, columns, LifecycleKind::StopNormal)?;
        cols.stop_fields()
    }
}

impl FailedStopRecord {
    pub fn from_columns(table: &str, columns: &[ColumnValue]) -> Result<Self> {
        let cols = Columns::new(table, columns, LifecycleKind::StopFailed)?;
        Ok(Self {
            stop: cols.stop_fields()?,
            fail_reason: cols.opt_text(6)?,
        })
    }
}

/// A validated record for any lifecycle transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionRecord {
    Start(StartRecord),
    StopNormal(StopRecord),
    StopFailed(FailedStopRecord),
}

impl TransactionRecord {
    /// Validate `columns` against the layout for `kind`.
    pub fn from_columns(kind: LifecycleKind, table: &str, columns: &[ColumnValue]) -> Result<Self> {
        match kind {
            LifecycleKind::Start => StartRecord::from_columns(table, columns).map(Self::Start),
            LifecycleKind::StopNormal => StopRecord::from_columns(table, columns).map(Self::StopNormal),
            LifecycleKind::StopFailed => {
                FailedStopRecord::from_columns(table, columns).map(Self::StopFailed)
            }
        }
    }

    pub fn kind(&self) -> LifecycleKind {
        match self {
            TransactionRecord::Start(_) => LifecycleKind::Start,
            TransactionRecord::StopNormal(_) => LifecycleKind::StopNormal,
            TransactionRecord::StopFailed(_) => LifecycleKind::StopFailed,
        }
    }

    pub fn transaction_pk(&self) -> i64 {
        match self {
            TransactionRecord::Start(r) => r.transaction_pk,
            TransactionRecord::StopNormal(r) => r.transaction_pk,
            TransactionRecord::StopFailed(r) => r.stop.transaction_pk,
        }
    }
}

/// Arity-checked view over a column slice.
struct Columns<'a> {
    table: &'a str,
    values: &'a [ColumnValue],
}

impl<'a> Columns<'a> {
    fn new(table: &'a str, values: &'a [ColumnValue], kind: LifecycleKind) -> Result<Self> {
        let expected = kind.expected_columns();
        if values.len() != expected {
            return Err(RelayError::RowShape {
                table: table.to_string(),
                expected,
                actual: values.len(),
            });
        }
        Ok(Self { table, values })
    }

    fn mismatch(&self, index: usize, expected: &'static str) -> RelayError {
        RelayError::ColumnType {
            table: self.table.to_string(),
            index,
            expected,
            actual: self.values[index].type_name(),
        }
    }

    fn stop_fields(&self) -> Result<StopRecord> {
        Ok(StopRecord {
            transaction_pk: self.integer(0)?,
            stop_timestamp: self.opt_datetime(3)?,
            stop_value: self.opt_text(4)?,
            stop_reason: self.opt_text(5)?,
        })
    }

    fn integer(&self, index: usize) -> Result<i64> {
        match &self.values[index] {
            ColumnValue::Int(v) => Ok(*v),
            ColumnValue::UInt(v) => i64::try_from(*v).map_err(|_| self.mismatch(index, "integer")),
            _ => Err(self.mismatch(index, "integer")),
        }
    }

    fn datetime(&self, index: usize) -> Result<NaiveDateTime> {
        self.opt_datetime(index)?
            .ok_or_else(|| self.mismatch(index, "datetime"))
    }

    fn opt_datetime(&self, index: usize) -> Result<Option<NaiveDateTime>> {
        match &self.values[index] {
            ColumnValue::Null => Ok(None),
            ColumnValue::DateTime(v) => Ok(Some(*v)),
            ColumnValue::Text(s) => parse_datetime(s)
                .map(Some)
                .ok_or_else(|| self.mismatch(index, "datetime")),
            _ => Err(self.mismatch(index, "datetime")),
        }
    }

    fn text(&self, index: usize) -> Result<String> {
        self.opt_text(index)?.ok_or_else(|| self.mismatch(index, "text"))
    }

    fn opt_text(&self, index: usize) -> Result<Option<String>> {
        match &self.values[index] {
            ColumnValue::Null => Ok(None),
            ColumnValue::Text(s) => Ok(Some(s.clone())),
            ColumnValue::Decimal(s) => Ok(Some(s.clone())),
            ColumnValue::Int(v) => Ok(Some(v.to_string())),
            ColumnValue::UInt(v) => Ok(Some(v.to_string())),
            ColumnValue::Float(v) => Ok(Some(v.to_string())),
            ColumnValue::Bytes(b) => String::from_utf8(b.clone())
                .map(Some)
                .map_err(|_| self.mismatch(index, "text")),
            ColumnValue::DateTime(_) => Err(self.mismatch(index, "text")),
        }
    }
}

/// Accepts RFC 3339 (offset applied, stored as UTC) or MySQL's
/// `YYYY-MM-DD HH:MM:SS[.ffffff]` form.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok()
}
