// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Consumer loop: pull events from the source and hand them to the router.
//!
//! Exactly one event is in flight at a time. The loop waits for the next
//! event *or* the shutdown signal, whichever comes first, but once an event
//! has been pulled it is handled to completion before shutdown is checked
//! again. A destination write is never cut off halfway.
//!
//! Any handler error ends the loop: the relay does not skip events it
//! failed to mirror.

use super::types::ConsumerStats;
use crate::error::Result;
use crate::router::Disposition;
use crate::source::{ReplicationEventSource, RowEventHandler};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, Instrument};

/// Run the consumer until the source ends, shutdown is signalled, or an
/// event fails.
pub async fn run_consumer<E, H>(
    mut source: E,
    handler: Arc<H>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<ConsumerStats>
where
    E: ReplicationEventSource,
    H: RowEventHandler + ?Sized,
{
    let span = info_span!("relay");

    async move {
        info!("Starting relay consumer");
        let mut stats = ConsumerStats::default();

        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received");
                break;
            }

            let next = tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received while waiting for events");
                        break;
                    }
                    continue;
                }
                next = source.next_event() => next,
            };

            let event = match next {
                Ok(Some(event)) => event,
                Ok(None) => {
                    info!("Event source ended");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Event source failed, stopping replication");
                    return Err(e);
                }
            };

            stats.received += 1;
            let position = event.position().clone();

            match handler.on_event(&event).await {
                Ok(Disposition::Applied(outcome)) => {
                    stats.applied += 1;
                    debug!(
                        log_name = %position.log_name,
                        offset = position.offset,
                        kind = %outcome.kind,
                        transaction_pk = outcome.transaction_pk,
                        "Event applied"
                    );
                }
                Ok(Disposition::Ignored(_)) => {
                    stats.ignored += 1;
                }
                Err(e) => {
                    error!(
                        log_name = %position.log_name,
                        offset = position.offset,
                        error = %e,
                        "Event processing failed, stopping replication"
                    );
                    return Err(e);
                }
            }
        }

        info!(
            received = stats.received,
            applied = stats.applied,
            ignored = stats.ignored,
            "Relay consumer stopped"
        );
        Ok(stats)
    }
    .instrument(span)
    .await
}
