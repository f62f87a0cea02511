// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Destination store integration.
//!
//! Defines what the lifecycle writers need from the destination: one insert
//! and two keyed updates against the `transaction` table. The relay owns a
//! long-lived pool; each call acquires a connection, runs exactly one
//! parameterized statement, and releases it.
//!
//! # Example
//!
//! ```rust,no_run
//! use txn_relay::store::{TransactionStore, StoreFuture};
//! use txn_relay::record::{StartRecord, StopRecord, FailedStopRecord};
//!
//! struct MyStore;
//!
//! impl TransactionStore for MyStore {
//!     fn insert_start(&self, _record: &StartRecord) -> StoreFuture<'_, u64> {
//!         Box::pin(async move { Ok(1) })
//!     }
//!
//!     fn record_stop(&self, _record: &StopRecord) -> StoreFuture<'_, u64> {
//!         Box::pin(async move { Ok(1) })
//!     }
//!
//!     fn record_failed_stop(&self, _record: &FailedStopRecord) -> StoreFuture<'_, u64> {
//!         Box::pin(async move { Ok(1) })
//!     }
//! }
//! ```

use crate::config::DestinationConfig;
use crate::error::{RelayError, Result};
use crate::record::{FailedStopRecord, StartRecord, StopRecord};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Type alias for boxed async store results.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Trait defining what we need from the destination store.
///
/// Each method returns the number of rows affected. Stop updates for an
/// unknown transaction affect zero rows, which is not an error.
pub trait TransactionStore: Send + Sync + 'static {
    /// Create a transaction row.
    fn insert_start(&self, record: &StartRecord) -> StoreFuture<'_, u64>;

    /// Set the stop fields on an existing transaction.
    fn record_stop(&self, record: &StopRecord) -> StoreFuture<'_, u64>;

    /// Set the stop fields and the fail reason on an existing transaction.
    fn record_failed_stop(&self, record: &FailedStopRecord) -> StoreFuture<'_, u64>;
}

impl<S: TransactionStore + ?Sized> TransactionStore for Arc<S> {
    fn insert_start(&self, record: &StartRecord) -> StoreFuture<'_, u64> {
        (**self).insert_start(record)
    }

    fn record_stop(&self, record: &StopRecord) -> StoreFuture<'_, u64> {
        (**self).record_stop(record)
    }

    fn record_failed_stop(&self, record: &FailedStopRecord) -> StoreFuture<'_, u64> {
        (**self).record_failed_stop(record)
    }
}

/// PostgreSQL destination backed by a shared [`PgPool`].
pub struct PgTransactionStore {
    pool: PgPool,
    insert_sql: String,
    stop_sql: String,
    failed_stop_sql: String,
}

impl PgTransactionStore {
    /// Wrap an existing pool. `table` is the destination table name.
    pub fn new(pool: PgPool, table: &str) -> Self {
        Self {
            pool,
            insert_sql: format!(
                "INSERT INTO {table} (transaction_pk, event_timestamp, connector_pk, id_tag, start_timestamp, start_value) \
                 VALUES ($1, $2, $3, $4, $5, $6)"
            ),
            stop_sql: format!(
                "UPDATE {table} SET stop_timestamp = $1, stop_value = $2, stop_reason = $3 \
                 WHERE transaction_pk = $4"
            ),
            failed_stop_sql: format!(
                "UPDATE {table} SET stop_timestamp = $1, stop_value = $2, stop_reason = $3, fail_reason = $4 \
                 WHERE transaction_pk = $5"
            ),
        }
    }

    /// Connect a pool from config and verify it with a ping.
    pub async fn connect(config: &DestinationConfig) -> Result<Self> {
        let ssl_mode = PgSslMode::from_str(&config.ssl_mode)
            .map_err(|e| RelayError::Config(format!("Invalid SSL_MODE '{}': {}", config.ssl_mode, e)))?;

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .ssl_mode(ssl_mode);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout_duration())
            .connect_with(options)
            .await
            .map_err(|e| RelayError::destination("connect", e))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| RelayError::destination("ping", e))?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            max_connections = config.max_connections,
            "Destination pool connected"
        );

        Ok(Self::new(pool, &config.table))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl TransactionStore for PgTransactionStore {
    fn insert_start(&self, record: &StartRecord) -> StoreFuture<'_, u64> {
        let record = record.clone();
        Box::pin(async move {
            let result = sqlx::query(&self.insert_sql)
                .bind(record.transaction_pk)
                .bind(record.event_timestamp)
                .bind(record.connector_pk)
                .bind(record.id_tag)
                .bind(record.start_timestamp)
                .bind(record.start_value)
                .execute(&self.pool)
                .await
                .map_err(|e| RelayError::destination("insert_start", e))?;
            Ok(result.rows_affected())
        })
    }

    fn record_stop(&self, record: &StopRecord) -> StoreFuture<'_, u64> {
        let record = record.clone();
        Box::pin(async move {
            let result = sqlx::query(&self.stop_sql)
                .bind(record.stop_timestamp)
                .bind(record.stop_value)
                .bind(record.stop_reason)
                .bind(record.transaction_pk)
                .execute(&self.pool)
                .await
                .map_err(|e| RelayError::destination("record_stop", e))?;
            Ok(result.rows_affected())
        })
    }

    fn record_failed_stop(&self, record: &FailedStopRecord) -> StoreFuture<'_, u64> {
        let record = record.clone();
        Box::pin(async move {
            let result = sqlx::query(&self.failed_stop_sql)
                .bind(record.stop.stop_timestamp)
                .bind(record.stop.stop_value)
                .bind(record.stop.stop_reason)
                .bind(record.fail_reason)
                .bind(record.stop.transaction_pk)
                .execute(&self.pool)
                .await
                .map_err(|e| RelayError::destination("record_failed_stop", e))?;
            Ok(result.rows_affected())
        })
    }
}

/// A no-op store for dry runs.
///
/// Logs what would be written and reports one affected row.
#[derive(Clone, Default)]
pub struct NoOpTransactionStore;

impl TransactionStore for NoOpTransactionStore {
    fn insert_start(&self, record: &StartRecord) -> StoreFuture<'_, u64> {
        let pk = record.transaction_pk;
        Box::pin(async move {
            tracing::debug!(transaction_pk = pk, "NoOp: would insert transaction");
            Ok(1)
        })
    }

    fn record_stop(&self, record: &StopRecord) -> StoreFuture<'_, u64> {
        let pk = record.transaction_pk;
        Box::pin(async move {
            tracing::debug!(transaction_pk = pk, "NoOp: would record stop");
            Ok(1)
        })
    }

    fn record_failed_stop(&self, record: &FailedStopRecord) -> StoreFuture<'_, u64> {
        let pk = record.stop.transaction_pk;
        Box::pin(async move {
            tracing::debug!(transaction_pk = pk, "NoOp: would record failed stop");
            Ok(1)
        })
    }
}
