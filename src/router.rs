// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Transaction event router.
//!
//! Every row event from the replication log passes through
//! [`TransactionEventRouter::on_row_event`]:
//!
//! ```text
//! event ──► replay? ──yes──► Ignored(Replay)
//!              │no
//!              ▼
//!        tracked table? ──no──► Ignored(UntrackedTable)
//!              │yes
//!              ▼
//!          insert? ──no──► Ignored(NonInsert)
//!              │yes
//!              ▼
//!      validate columns ──err──► RowShape / ColumnType
//!              │
//!              ▼
//!      lifecycle writer ──err──► propagated unchanged
//!              │
//!              ▼
//!        Applied(outcome)
//! ```
//!
//! Ignored events are not errors and cause no destination write. Errors are
//! never retried here; see [`crate::resilience`] for the optional retry layer.

use crate::config::TrackedTables;
use crate::error::Result;
use crate::event::{RowAction, RowChangeEvent};
use crate::metrics;
use crate::position::{LogPosition, PositionTracker};
use crate::record::LifecycleKind;
use crate::source::{HandlerFuture, RowEventHandler};
use crate::store::TransactionStore;
use crate::writer::{LifecycleWriter, WriteOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, trace};

/// Why an event produced no destination write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Event predates the startup baseline (or the baseline is unknown).
    Replay,
    /// Event is for a table the relay does not track.
    UntrackedTable,
    /// Update or delete on a tracked table.
    NonInsert,
    /// DDL; observed for position bookkeeping only.
    SchemaChange,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::Replay => "replay",
            IgnoreReason::UntrackedTable => "untracked_table",
            IgnoreReason::NonInsert => "non_insert",
            IgnoreReason::SchemaChange => "schema_change",
        }
    }
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful outcome of handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// One destination write was issued.
    Applied(WriteOutcome),
    /// No write; see the reason.
    Ignored(IgnoreReason),
}

impl Disposition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Disposition::Applied(_))
    }

    pub fn ignored_reason(&self) -> Option<IgnoreReason> {
        match self {
            Disposition::Ignored(reason) => Some(*reason),
            Disposition::Applied(_) => None,
        }
    }
}

/// Static map from source table to lifecycle writer.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    writers: HashMap<String, LifecycleWriter>,
}

impl RoutingTable {
    pub fn new(tables: &TrackedTables) -> Self {
        let writers = [
            (LifecycleKind::Start, &tables.start),
            (LifecycleKind::StopNormal, &tables.stop_normal),
            (LifecycleKind::StopFailed, &tables.stop_failed),
        ]
        .into_iter()
        .map(|(kind, table)| (table.clone(), LifecycleWriter::new(kind, table.clone())))
        .collect();
        Self { writers }
    }

    pub fn get(&self, table: &str) -> Option<&LifecycleWriter> {
        self.writers.get(table)
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

/// Routes row events to lifecycle writers.
pub struct TransactionEventRouter<S: TransactionStore + ?Sized> {
    tracker: PositionTracker,
    routes: RoutingTable,
    store: Arc<S>,
}

impl<S: TransactionStore + ?Sized> TransactionEventRouter<S> {
    pub fn new(tracker: PositionTracker, tables: &TrackedTables, store: Arc<S>) -> Self {
        Self {
            tracker,
            routes: RoutingTable::new(tables),
            store,
        }
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Handle one row-change event.
    pub async fn on_row_event(&self, event: &RowChangeEvent) -> Result<Disposition> {
        metrics::record_event_received(&event.source_table);

        if self.tracker.is_replay(&event.position) {
            return Ok(self.ignore(event, IgnoreReason::Replay));
        }

        let Some(writer) = self.routes.get(&event.source_table) else {
            return Ok(self.ignore(event, IgnoreReason::UntrackedTable));
        };

        if event.action != RowAction::Insert {
            return Ok(self.ignore(event, IgnoreReason::NonInsert));
        }

        let record = writer.validate(&event.columns).map_err(|e| {
            metrics::record_write_failure(writer.kind().as_str(), "row_shape");
            error!(
                table = %event.source_table,
                log_name = %event.position.log_name,
                offset = event.position.offset,
                error = %e,
                "Row does not match lifecycle layout"
            );
            e
        })?;

        let outcome = writer.apply(&*self.store, &record).await.map_err(|e| {
            error!(
                table = %event.source_table,
                log_name = %event.position.log_name,
                offset = event.position.offset,
                transaction_pk = record.transaction_pk(),
                error = %e,
                "Destination write failed"
            );
            e
        })?;

        metrics::set_last_offset(event.position.offset);
        Ok(Disposition::Applied(outcome))
    }

    /// Handle a DDL notification. Never mirrored.
    pub fn on_schema_change(&self, position: &LogPosition) -> Disposition {
        let reason = if self.tracker.is_replay(position) {
            IgnoreReason::Replay
        } else {
            IgnoreReason::SchemaChange
        };
        metrics::record_event_ignored(reason.as_str());
        trace!(log_name = %position.log_name, offset = position.offset, reason = %reason, "Schema change observed");
        Disposition::Ignored(reason)
    }

    fn ignore(&self, event: &RowChangeEvent, reason: IgnoreReason) -> Disposition {
        metrics::record_event_ignored(reason.as_str());
        trace!(
            table = %event.source_table,
            action = %event.action,
            offset = event.position.offset,
            reason = %reason,
            "Ignoring row event"
        );
        Disposition::Ignored(reason)
    }
}

impl<S: TransactionStore + ?Sized> RowEventHandler for TransactionEventRouter<S> {
    fn on_row<'a>(&'a self, event: &'a RowChangeEvent) -> HandlerFuture<'a> {
        Box::pin(self.on_row_event(event))
    }

    fn on_schema_change<'a>(&'a self, position: &'a LogPosition) -> HandlerFuture<'a> {
        let disposition = TransactionEventRouter::on_schema_change(self, position);
        Box::pin(async move { Ok(disposition) })
    }
}
