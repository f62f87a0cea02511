// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Event delivery contract between the replication log reader and the relay.
//!
//! The binlog reader (connecting, authenticating, decoding row events,
//! reconnecting) lives outside this crate. It hands decoded events to the
//! relay through [`ReplicationEventSource`], in log order, with positions
//! strictly increasing within a log file.
//!
//! [`ChannelEventSource`] is the in-process implementation: a decoder task
//! pushes events through an [`EventSender`] and the relay consumer pulls them.
//!
//! ```text
//! binlog decoder ──EventSender──► mpsc ──► ChannelEventSource ──► consumer ──► router
//! ```

use crate::error::{RelayError, Result};
use crate::event::RowChangeEvent;
use crate::position::LogPosition;
use crate::router::Disposition;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

/// Something the replication log reader delivers.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// A row-level change.
    Row(RowChangeEvent),
    /// A DDL statement; only its position matters to the relay.
    SchemaChange { position: LogPosition },
}

impl SourceEvent {
    pub fn position(&self) -> &LogPosition {
        match self {
            SourceEvent::Row(event) => &event.position,
            SourceEvent::SchemaChange { position } => position,
        }
    }
}

/// Boxed future returned by event sources.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Boxed future returned by event handlers.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<Disposition>> + Send + 'a>>;

/// An ordered stream of replication events.
pub trait ReplicationEventSource: Send + 'static {
    /// Wait for the next event.
    ///
    /// Returns `Ok(None)` once the source has ended. Must be cancel-safe: the
    /// consumer drops this future when shutdown is signalled, and no event may
    /// be lost when that happens.
    fn next_event(&mut self) -> SourceFuture<'_, Option<SourceEvent>>;
}

/// Receives events from a [`ReplicationEventSource`], one at a time.
///
/// The source does not deliver the next event until the returned future
/// completes.
pub trait RowEventHandler: Send + Sync {
    fn on_row<'a>(&'a self, event: &'a RowChangeEvent) -> HandlerFuture<'a>;

    fn on_schema_change<'a>(&'a self, position: &'a LogPosition) -> HandlerFuture<'a>;

    /// Dispatch any [`SourceEvent`] to the matching callback.
    fn on_event<'a>(&'a self, event: &'a SourceEvent) -> HandlerFuture<'a> {
        match event {
            SourceEvent::Row(row) => self.on_row(row),
            SourceEvent::SchemaChange { position } => self.on_schema_change(position),
        }
    }
}

/// Producer half of a [`ChannelEventSource`], held by the binlog decoder.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Result<SourceEvent>>,
}

impl EventSender {
    /// Send an event, waiting for channel capacity.
    ///
    /// Fails with [`RelayError::Shutdown`] once the consumer is gone.
    pub async fn send(&self, event: SourceEvent) -> Result<()> {
        self.tx.send(Ok(event)).await.map_err(|_| RelayError::Shutdown)
    }

    pub async fn send_row(&self, event: RowChangeEvent) -> Result<()> {
        self.send(SourceEvent::Row(event)).await
    }

    pub async fn send_schema_change(&self, position: LogPosition) -> Result<()> {
        self.send(SourceEvent::SchemaChange { position }).await
    }

    /// Report a reader failure; the consumer stops when it receives it.
    pub async fn send_error(&self, message: impl Into<String>) -> Result<()> {
        self.tx
            .send(Err(RelayError::EventSource(message.into())))
            .await
            .map_err(|_| RelayError::Shutdown)
    }

    /// Check if the consumer side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Free slots in the channel; equals the capacity once the consumer has
    /// taken every queued event.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Channel-backed event source.
///
/// Ends when every [`EventSender`] has been dropped.
pub struct ChannelEventSource {
    rx: mpsc::Receiver<Result<SourceEvent>>,
}

impl ChannelEventSource {
    /// Create a bounded source. A full channel applies backpressure to the
    /// decoder while the relay is busy writing.
    pub fn new(capacity: usize) -> (EventSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (EventSender { tx }, Self { rx })
    }
}

impl ReplicationEventSource for ChannelEventSource {
    fn next_event(&mut self) -> SourceFuture<'_, Option<SourceEvent>> {
        Box::pin(async move {
            match self.rx.recv().await {
                Some(Ok(event)) => Ok(Some(event)),
                Some(Err(e)) => Err(e),
                None => Ok(None),
            }
        })
    }
}
