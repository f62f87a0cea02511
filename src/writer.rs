// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Lifecycle writers: one destination write per transaction transition.
//!
//! | Writer | Source columns | Destination write |
//! |--------|----------------|-------------------|
//! | Start | 6 | `INSERT` new transaction row |
//! | StopNormal | 6 | `UPDATE` stop fields by `transaction_pk` |
//! | StopFailed | 7 | `UPDATE` stop fields + `fail_reason` by `transaction_pk` |
//!
//! A stop whose transaction was never started updates zero rows. That is
//! reported in [`WriteOutcome::rows_affected`] and counted in metrics, but is
//! not an error.

use crate::error::Result;
use crate::event::ColumnValue;
use crate::metrics;
use crate::record::{LifecycleKind, TransactionRecord};
use crate::store::TransactionStore;
use std::time::Instant;
use tracing::debug;

/// Result of a successful lifecycle write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub kind: LifecycleKind,
    pub transaction_pk: i64,
    pub rows_affected: u64,
}

/// Translates rows from one source table into destination writes.
#[derive(Debug, Clone)]
pub struct LifecycleWriter {
    kind: LifecycleKind,
    table: String,
}

impl LifecycleWriter {
    pub fn new(kind: LifecycleKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
        }
    }

    pub fn kind(&self) -> LifecycleKind {
        self.kind
    }

    /// Source table this writer reads from.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Check `columns` against this writer's layout.
    pub fn validate(&self, columns: &[ColumnValue]) -> Result<TransactionRecord> {
        TransactionRecord::from_columns(self.kind, &self.table, columns)
    }

    /// Validate and write in one step.
    pub async fn write<S: TransactionStore + ?Sized>(
        &self,
        store: &S,
        columns: &[ColumnValue],
    ) -> Result<WriteOutcome> {
        let record = self.validate(columns)?;
        self.apply(store, &record).await
    }

    /// Issue exactly one destination write for an already-validated record.
    pub async fn apply<S: TransactionStore + ?Sized>(
        &self,
        store: &S,
        record: &TransactionRecord,
    ) -> Result<WriteOutcome> {
        let kind = record.kind();
        let transaction_pk = record.transaction_pk();
        let start = Instant::now();

        let result = match record {
            TransactionRecord::Start(r) => store.insert_start(r).await,
            TransactionRecord::StopNormal(r) => store.record_stop(r).await,
            TransactionRecord::StopFailed(r) => store.record_failed_stop(r).await,
        };

        let rows_affected = match result {
            Ok(rows) => rows,
            Err(e) => {
                metrics::record_write_failure(kind.as_str(), "destination");
                return Err(e);
            }
        };

        metrics::record_write(kind.as_str(), start.elapsed(), rows_affected);

        if rows_affected == 0 {
            debug!(
                kind = %kind,
                transaction_pk,
                "No destination row matched"
            );
        } else {
            debug!(
                kind = %kind,
                transaction_pk,
                rows_affected,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Applied transaction event"
            );
        }

        Ok(WriteOutcome {
            kind,
            transaction_pk,
            rows_affected,
        })
    }
}
