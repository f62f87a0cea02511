//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Events received from the replication log
//! - Events applied per lifecycle transition
//! - Events ignored (replay, untracked table, non-insert, schema change)
//! - Destination write latency, failures, and retries
//! - Engine state and replay baseline
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `relay_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration)
//!
//! # Usage
//!
//! ```rust,no_run
//! use txn_relay::metrics;
//! use std::time::Duration;
//!
//! metrics::record_event_received("transaction_start");
//! metrics::record_write("start", Duration::from_millis(3), 1);
//! ```

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a row event delivered by the event source.
pub fn record_event_received(table: &str) {
    counter!("relay_events_received_total", "table" => table.to_string()).increment(1);
}

/// Record an event that was dropped without a write.
pub fn record_event_ignored(reason: &str) {
    counter!("relay_events_ignored_total", "reason" => reason.to_string()).increment(1);
}

/// Record a successful destination write.
pub fn record_write(kind: &str, duration: Duration, rows_affected: u64) {
    counter!("relay_events_applied_total", "kind" => kind.to_string()).increment(1);
    histogram!("relay_write_duration_seconds", "kind" => kind.to_string())
        .record(duration.as_secs_f64());
    if rows_affected == 0 {
        counter!("relay_writes_unmatched_total", "kind" => kind.to_string()).increment(1);
    }
}

/// Record a failed destination write or row validation.
pub fn record_write_failure(kind: &str, error_type: &str) {
    counter!(
        "relay_write_failures_total",
        "kind" => kind.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Record a destination write retry (retry failure policy only).
pub fn record_write_retry(operation: &str) {
    counter!("relay_write_retries_total", "operation" => operation.to_string()).increment(1);
}

/// Gauge for the replay baseline offset captured at startup.
pub fn set_baseline_offset(offset: u64) {
    gauge!("relay_baseline_offset").set(offset as f64);
}

/// Gauge for the log offset of the last event handled.
pub fn set_last_offset(offset: u64) {
    gauge!("relay_last_event_offset").set(offset as f64);
}

/// Gauge for engine state.
pub fn set_engine_state(state: &str) {
    let value = match state {
        "Created" => 0.0,
        "Starting" => 1.0,
        "Running" => 2.0,
        "ShuttingDown" => 3.0,
        "Stopped" => 4.0,
        "Failed" => 5.0,
        _ => -1.0,
    };
    gauge!("relay_engine_state").set(value);
}
