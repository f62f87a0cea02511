//! Mock TransactionStore for testing.
//!
//! Keeps destination rows in memory keyed by transaction pk, with the same
//! semantics as the PostgreSQL table: a duplicate start insert is rejected,
//! a stop for an unknown pk affects zero rows. Every call is recorded.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use txn_relay::error::RelayError;
use txn_relay::record::{FailedStopRecord, LifecycleKind, StartRecord, StopRecord};
use txn_relay::store::{StoreFuture, TransactionStore};

/// One row of the destination table.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationRow {
    pub transaction_pk: i64,
    pub event_timestamp: NaiveDateTime,
    pub connector_pk: i64,
    pub id_tag: String,
    pub start_timestamp: Option<NaiveDateTime>,
    pub start_value: Option<String>,
    pub stop_timestamp: Option<NaiveDateTime>,
    pub stop_value: Option<String>,
    pub stop_reason: Option<String>,
    pub fail_reason: Option<String>,
}

impl DestinationRow {
    fn from_start(record: &StartRecord) -> Self {
        Self {
            transaction_pk: record.transaction_pk,
            event_timestamp: record.event_timestamp,
            connector_pk: record.connector_pk,
            id_tag: record.id_tag.clone(),
            start_timestamp: record.start_timestamp,
            start_value: record.start_value.clone(),
            stop_timestamp: None,
            stop_value: None,
            stop_reason: None,
            fail_reason: None,
        }
    }

    fn apply_stop(&mut self, record: &StopRecord) {
        self.stop_timestamp = record.stop_timestamp;
        self.stop_value = record.stop_value.clone();
        self.stop_reason = record.stop_reason.clone();
    }
}

/// A recorded store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCall {
    pub kind: LifecycleKind,
    pub transaction_pk: i64,
}

/// In-memory destination store.
///
/// # Example
/// ```rust,ignore
/// let store = Arc::new(MockTransactionStore::new());
/// store.fail_next(2, true);
///
/// // ... run the relay ...
///
/// let row = store.row(1).await.unwrap();
/// assert!(row.stop_timestamp.is_some());
/// ```
pub struct MockTransactionStore {
    rows: RwLock<HashMap<i64, DestinationRow>>,
    calls: RwLock<Vec<StoreCall>>,
    /// Remaining calls that should fail before the store recovers
    failures_remaining: AtomicUsize,
    /// Whether injected failures look transient
    transient_failures: AtomicBool,
    /// Calls that reached the store, including failed ones
    attempts: AtomicUsize,
}

impl MockTransactionStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
            failures_remaining: AtomicUsize::new(0),
            transient_failures: AtomicBool::new(true),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Make the next `n` calls fail.
    pub fn fail_next(&self, n: usize, transient: bool) {
        self.transient_failures.store(transient, Ordering::SeqCst);
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Make every call fail until reconfigured.
    pub fn fail_always(&self, transient: bool) {
        self.fail_next(usize::MAX, transient);
    }

    pub async fn row(&self, pk: i64) -> Option<DestinationRow> {
        self.rows.read().await.get(&pk).cloned()
    }

    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Calls that got past failure injection, in order.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.read().await.clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn injected_failure(&self, operation: &str) -> Option<RelayError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let took = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !took {
            return None;
        }
        let transient = self.transient_failures.load(Ordering::SeqCst);
        Some(RelayError::destination_msg(
            operation,
            "injected failure",
            transient,
        ))
    }

    async fn record_call(&self, kind: LifecycleKind, transaction_pk: i64) {
        self.calls.write().await.push(StoreCall {
            kind,
            transaction_pk,
        });
    }

    async fn update_stop(
        &self,
        kind: LifecycleKind,
        stop: &StopRecord,
        fail_reason: Option<String>,
    ) -> u64 {
        self.record_call(kind, stop.transaction_pk).await;
        let mut rows = self.rows.write().await;
        match rows.get_mut(&stop.transaction_pk) {
            Some(row) => {
                row.apply_stop(stop);
                if kind == LifecycleKind::StopFailed {
                    row.fail_reason = fail_reason;
                }
                1
            }
            None => 0,
        }
    }
}

impl Default for MockTransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionStore for MockTransactionStore {
    fn insert_start(&self, record: &StartRecord) -> StoreFuture<'_, u64> {
        let record = record.clone();
        Box::pin(async move {
            if let Some(e) = self.injected_failure("insert_start") {
                return Err(e);
            }
            self.record_call(LifecycleKind::Start, record.transaction_pk)
                .await;
            let mut rows = self.rows.write().await;
            if rows.contains_key(&record.transaction_pk) {
                return Err(RelayError::destination_msg(
                    "insert_start",
                    format!(
                        "duplicate key value violates unique constraint (transaction_pk)=({})",
                        record.transaction_pk
                    ),
                    false,
                ));
            }
            rows.insert(record.transaction_pk, DestinationRow::from_start(&record));
            Ok(1)
        })
    }

    fn record_stop(&self, record: &StopRecord) -> StoreFuture<'_, u64> {
        let record = record.clone();
        Box::pin(async move {
            if let Some(e) = self.injected_failure("record_stop") {
                return Err(e);
            }
            Ok(self
                .update_stop(LifecycleKind::StopNormal, &record, None)
                .await)
        })
    }

    fn record_failed_stop(&self, record: &FailedStopRecord) -> StoreFuture<'_, u64> {
        let record = record.clone();
        Box::pin(async move {
            if let Some(e) = self.injected_failure("record_failed_stop") {
                return Err(e);
            }
            Ok(self
                .update_stop(LifecycleKind::StopFailed, &record.stop, record.fail_reason)
                .await)
        })
    }
}
