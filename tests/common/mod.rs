//! Shared test utilities for relay and integration tests.
//!
//! This module provides:
//! - PostgreSQL / MySQL testcontainer setup
//! - An in-memory TransactionStore that records calls
//! - Row event builders for the three tracked tables
//! - Log output for failing tests (`RUST_LOG=txn_relay=debug`)

#![allow(dead_code)]

pub mod containers;
pub mod mock_store;

pub use containers::*;
pub use mock_store::*;

use txn_relay::event::{ColumnValue, RowAction, RowChangeEvent};
use txn_relay::position::LogPosition;

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub const LOG_NAME: &str = "mysql-bin.000042";

pub fn pos(offset: u64) -> LogPosition {
    LogPosition::new(LOG_NAME, offset)
}

/// Insert on the start table: `[pk, event_ts, connector_pk, id_tag, start_ts, start_value]`.
pub fn start_event(offset: u64, pk: i64) -> RowChangeEvent {
    RowChangeEvent::insert(
        "transaction_start",
        pos(offset),
        vec![
            pk.into(),
            "2024-01-01T00:00:00Z".into(),
            7i64.into(),
            "TAG-1".into(),
            "2024-01-01T00:00:05Z".into(),
            "1200".into(),
        ],
    )
}

/// Insert on the stop table: `[pk, event_ts, event_actor, stop_ts, stop_value, stop_reason]`.
pub fn stop_event(offset: u64, pk: i64) -> RowChangeEvent {
    RowChangeEvent::insert(
        "transaction_stop",
        pos(offset),
        vec![
            pk.into(),
            "2024-01-01T01:00:00Z".into(),
            "station".into(),
            "2024-01-01T01:00:00Z".into(),
            ColumnValue::Int(100),
            "Local".into(),
        ],
    )
}

/// Insert on the stop-failed table: the stop layout plus `fail_reason`.
pub fn stop_failed_event(offset: u64, pk: i64, fail_reason: &str) -> RowChangeEvent {
    let mut event = stop_event(offset, pk);
    event.source_table = "transaction_stop_failed".to_string();
    event.columns.push(fail_reason.into());
    event
}

pub fn with_action(mut event: RowChangeEvent, action: RowAction) -> RowChangeEvent {
    event.action = action;
    event
}
