// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Resilience utilities: retry with exponential backoff for destination writes.
//!
//! The router never retries. When the relay runs with
//! [`FailurePolicy::Retry`](crate::config::FailurePolicy::Retry), the
//! destination store is wrapped in a [`RetryingStore`], which retries only
//! errors that [`crate::error::RelayError::is_retryable()`] classifies as transient. Once
//! attempts are exhausted the last error is returned and replication stops
//! exactly as it would under the strict policy.
//!
//! # Example
//!
//! ```rust,no_run
//! use txn_relay::resilience::{RetryConfig, RetryingStore};
//! use txn_relay::store::NoOpTransactionStore;
//!
//! let store = RetryingStore::new(NoOpTransactionStore, RetryConfig::default());
//! ```

use crate::error::Result;
use crate::metrics;
use crate::record::{FailedStopRecord, StartRecord, StopRecord};
use crate::store::{StoreFuture, TransactionStore};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for write retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: usize,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries (ceiling for exponential backoff).
    pub max_delay: Duration,

    /// Backoff multiplier (e.g., 2.0 = double delay each retry).
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Fast-fail retry for tests.
    pub fn testing() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_factor: 2.0,
        }
    }

    /// Calculate delay for a given attempt number (1-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        let multiplier = self.backoff_factor.powi((attempt - 1) as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        let delay = Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()));

        std::cmp::min(delay, self.max_delay)
    }
}

/// Run `f` until it succeeds, fails with a non-retryable error, or runs out
/// of attempts.
pub async fn retry_with_backoff<F, Fut, T>(
    operation: &str,
    config: &RetryConfig,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Destination write succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Destination write failed, retrying"
                );
                metrics::record_write_retry(operation);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// A [`TransactionStore`] that retries transient failures of the wrapped store.
pub struct RetryingStore<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: TransactionStore> RetryingStore<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: TransactionStore> TransactionStore for RetryingStore<S> {
    fn insert_start(&self, record: &StartRecord) -> StoreFuture<'_, u64> {
        let record = record.clone();
        Box::pin(async move {
            retry_with_backoff("insert_start", &self.config, || self.inner.insert_start(&record)).await
        })
    }

    fn record_stop(&self, record: &StopRecord) -> StoreFuture<'_, u64> {
        let record = record.clone();
        Box::pin(async move {
            retry_with_backoff("record_stop", &self.config, || self.inner.record_stop(&record)).await
        })
    }

    fn record_failed_stop(&self, record: &FailedStopRecord) -> StoreFuture<'_, u64> {
        let record = record.clone();
        Box::pin(async move {
            retry_with_backoff("record_failed_stop", &self.config, || {
                self.inner.record_failed_stop(&record)
            })
            .await
        })
    }
}
