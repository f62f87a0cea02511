// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Relay engine coordinator.
//!
//! Ties together:
//! - Replay baseline capture via [`crate::position::PositionTracker`]
//! - Event routing via [`crate::router::TransactionEventRouter`]
//! - Destination writes via a [`crate::store::TransactionStore`]
//! - The consumer task and its cancellation
//!
//! # Lifecycle
//!
//! 1. `RelayEngine::new()` with an owned destination store
//! 2. `start()` captures the baseline, then spawns the consumer task
//! 3. `run_until_signal()` (or `wait()`) blocks the caller
//! 4. `shutdown()` signals cancellation and waits for the current event
//!
//! # Resume Semantics
//!
//! No resume position is persisted. Every start re-captures the baseline from
//! the source's *current* position, so events written to the log while the
//! relay was down are never mirrored.

mod consumer;
mod types;

pub use consumer::run_consumer;
pub use types::{ConsumerStats, EngineState};

use crate::config::{FailurePolicy, RelayConfig};
use crate::error::{RelayError, Result};
use crate::metrics;
use crate::position::{BaselineSource, LogPosition, MySqlBaselineSource, PositionTracker};
use crate::resilience::RetryingStore;
use crate::router::TransactionEventRouter;
use crate::source::ReplicationEventSource;
use crate::store::{PgTransactionStore, TransactionStore};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// The transaction relay.
///
/// Generic over the destination store so tests can run against an in-memory
/// store; production uses [`PgTransactionStore`].
pub struct RelayEngine<S: TransactionStore = PgTransactionStore> {
    config: RelayConfig,

    /// Destination store, shared with the router for the engine's lifetime.
    store: Arc<S>,

    state_tx: Arc<watch::Sender<EngineState>>,
    state_rx: watch::Receiver<EngineState>,

    /// Cancellation signal for the consumer task.
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,

    /// Baseline captured by `start()`.
    baseline: Option<LogPosition>,

    consumer: Option<JoinHandle<Result<ConsumerStats>>>,
}

impl RelayEngine<PgTransactionStore> {
    /// Connect the destination pool described by `config`.
    ///
    /// Fails if the destination is unreachable; nothing is retried.
    pub async fn connect(config: RelayConfig) -> Result<Self> {
        config.validate()?;
        let store = PgTransactionStore::connect(&config.destination).await?;
        Ok(Self::new(config, Arc::new(store)))
    }
}

impl<S: TransactionStore> RelayEngine<S> {
    /// Create an engine around an existing destination store.
    ///
    /// The engine starts in `Created` state.
    pub fn new(config: RelayConfig, store: Arc<S>) -> Self {
        let (state_tx, state_rx) = watch::channel(EngineState::Created);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            store,
            state_tx: Arc::new(state_tx),
            state_rx,
            shutdown_tx,
            shutdown_rx,
            baseline: None,
            consumer: None,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get current engine state.
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), EngineState::Running)
    }

    /// Replay baseline, once `start()` has captured it.
    pub fn baseline(&self) -> Option<&LogPosition> {
        self.baseline.as_ref()
    }

    fn set_state(&self, state: EngineState) {
        let _ = self.state_tx.send(state);
        metrics::set_engine_state(&state.to_string());
    }

    /// Destination store as seen by the router, with the failure policy applied.
    fn routed_store(&self) -> Arc<dyn TransactionStore> {
        let store: Arc<dyn TransactionStore> = self.store.clone();
        match self.config.settings.failure_policy {
            FailurePolicy::Strict => store,
            FailurePolicy::Retry => {
                let retry = self.config.settings.retry.to_retry_config();
                info!(
                    max_attempts = retry.max_attempts,
                    "Destination writes will retry transient failures"
                );
                Arc::new(RetryingStore::new(store, retry))
            }
        }
    }

    /// Capture the baseline from the configured MySQL source, then start.
    pub async fn start_from_source<E: ReplicationEventSource>(&mut self, source: E) -> Result<()> {
        let pool = match self.config.source.connect().await {
            Ok(pool) => pool,
            Err(e) => {
                error!(addr = %self.config.source.addr(), error = %e, "Failed to connect to source store");
                self.set_state(EngineState::Failed);
                return Err(e);
            }
        };
        let baseline = MySqlBaselineSource::new(pool);
        self.start(&baseline, source).await
    }

    /// Start the relay.
    ///
    /// 1. Captures the replay baseline from `baseline_source`
    /// 2. Builds the router for the tracked tables
    /// 3. Spawns the consumer task on `source`
    pub async fn start<B, E>(&mut self, baseline_source: &B, source: E) -> Result<()>
    where
        B: BaselineSource + ?Sized,
        E: ReplicationEventSource,
    {
        if self.state() != EngineState::Created {
            return Err(RelayError::InvalidState {
                expected: "Created".to_string(),
                actual: self.state().to_string(),
            });
        }

        info!(
            source = %self.config.source.addr(),
            start_table = %self.config.tables.start,
            stop_table = %self.config.tables.stop_normal,
            stop_failed_table = %self.config.tables.stop_failed,
            "Starting transaction relay"
        );
        self.set_state(EngineState::Starting);

        let tracker = match PositionTracker::capture(baseline_source).await {
            Ok(tracker) => tracker,
            Err(e) => {
                error!(error = %e, "Failed to capture replay baseline");
                self.set_state(EngineState::Failed);
                return Err(e);
            }
        };
        metrics::set_baseline_offset(tracker.baseline().offset);
        self.baseline = Some(tracker.baseline().clone());

        let router = Arc::new(TransactionEventRouter::new(
            tracker,
            &self.config.tables,
            self.routed_store(),
        ));

        let shutdown_rx = self.shutdown_rx.clone();
        let state_tx = Arc::clone(&self.state_tx);

        // Running must be published before the task can overwrite it.
        self.set_state(EngineState::Running);
        let handle = tokio::spawn(async move {
            let result = run_consumer(source, router, shutdown_rx).await;
            let next = if result.is_ok() {
                EngineState::Stopped
            } else {
                EngineState::Failed
            };
            let _ = state_tx.send(next);
            metrics::set_engine_state(&next.to_string());
            result
        });

        self.consumer = Some(handle);
        info!("Transaction relay running");
        Ok(())
    }

    /// Wait for the consumer to finish on its own (source ended or failed).
    pub async fn wait(&mut self) -> Result<ConsumerStats> {
        let handle = self.consumer.take().ok_or_else(|| RelayError::InvalidState {
            expected: "Running".to_string(),
            actual: self.state().to_string(),
        })?;
        join_consumer(handle).await
    }

    /// Run until SIGINT/SIGTERM, then shut down.
    ///
    /// Returns early with the consumer's error if replication fails first.
    pub async fn run_until_signal(&mut self) -> Result<ConsumerStats> {
        let mut handle = self.consumer.take().ok_or_else(|| RelayError::InvalidState {
            expected: "Running".to_string(),
            actual: self.state().to_string(),
        })?;

        tokio::select! {
            joined = &mut handle => {
                flatten_join(joined)
            }
            signal = wait_for_termination_signal() => {
                self.consumer = Some(handle);
                match signal {
                    Ok(()) => {
                        info!("Termination signal received");
                        self.shutdown().await
                    }
                    Err(e) => {
                        error!(error = %e, "Signal handling failed, stopping relay");
                        let _ = self.shutdown().await;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Signal cancellation and wait for the consumer to finish its current event.
    ///
    /// If the consumer is still busy after the drain timeout it is aborted,
    /// the engine moves to `Failed` and an `Internal` error is returned, since
    /// the event it was writing may not have reached the destination.
    pub async fn shutdown(&mut self) -> Result<ConsumerStats> {
        info!("Shutting down transaction relay");
        let Some(handle) = self.consumer.take() else {
            if !self.state().is_terminal() {
                self.set_state(EngineState::Stopped);
            }
            return Ok(ConsumerStats::default());
        };

        self.set_state(EngineState::ShuttingDown);
        let _ = self.shutdown_tx.send(true);

        let drain_timeout = self.config.settings.drain_timeout_duration();
        let abort = handle.abort_handle();
        match tokio::time::timeout(drain_timeout, join_consumer(handle)).await {
            Ok(Ok(stats)) => {
                self.set_state(EngineState::Stopped);
                info!("Transaction relay stopped");
                Ok(stats)
            }
            Ok(Err(e)) => {
                self.set_state(EngineState::Failed);
                Err(e)
            }
            Err(_) => {
                warn!(
                    timeout_ms = drain_timeout.as_millis() as u64,
                    "Consumer did not finish in time, aborting in-flight event"
                );
                abort.abort();
                self.set_state(EngineState::Failed);
                Err(RelayError::Internal(format!(
                    "drain timeout after {:?}: in-flight event aborted",
                    drain_timeout
                )))
            }
        }
    }
}

async fn join_consumer(handle: JoinHandle<Result<ConsumerStats>>) -> Result<ConsumerStats> {
    flatten_join(handle.await)
}

fn flatten_join(
    joined: std::result::Result<Result<ConsumerStats>, tokio::task::JoinError>,
) -> Result<ConsumerStats> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(RelayError::Internal(format!("Consumer task failed: {}", e))),
    }
}

/// Block until SIGINT or SIGTERM.
pub async fn wait_for_termination_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate())
            .map_err(|e| RelayError::Internal(format!("Failed to install SIGTERM handler: {}", e)))?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.map_err(|e| RelayError::Internal(format!("Failed to listen for SIGINT: {}", e)))
            }
            _ = term.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| RelayError::Internal(format!("Failed to listen for ctrl-c: {}", e)))
    }
}
