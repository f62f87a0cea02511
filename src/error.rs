// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the transaction relay.
//!
//! Errors are categorized by where they occur (source store, destination
//! store, event shape) and carry enough context to locate the failing row.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Source` | No | Baseline query or source pool failure (fatal at startup) |
//! | `Destination` | Depends | Destination write failed; IO/pool errors are transient |
//! | `EventSource` | Yes | Replication log reader failed to deliver an event |
//! | `RowShape` | No | Column count does not match the table's layout |
//! | `ColumnType` | No | Column value has the wrong type |
//! | `Config` | No | Configuration invalid or missing |
//! | `InvalidState` | No | Engine state machine violation |
//! | `Shutdown` | No | Engine is shutting down |
//! | `Internal` | No | Unexpected internal error |
//!
//! # Retry Behavior
//!
//! The router never retries. [`RelayError::is_retryable()`] is consulted only
//! by [`crate::resilience::RetryingStore`] when the retry failure policy is
//! enabled.

use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors that can occur while relaying transaction events.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Source store error (baseline position query, source pool).
    ///
    /// Only raised during startup, where it is fatal.
    #[error("Source store error: {0}")]
    Source(#[source] sqlx::Error),

    /// Destination write failure.
    ///
    /// `transient` is set for IO and pool errors that may succeed on retry.
    #[error("Destination error ({operation}): {message}")]
    Destination {
        operation: String,
        message: String,
        transient: bool,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// The replication log reader failed to deliver the next event.
    #[error("Event source error: {0}")]
    EventSource(String),

    /// Column count does not match what the lifecycle writer expects.
    #[error("Row shape mismatch for {table}: expected {expected} columns, got {actual}")]
    RowShape {
        table: String,
        expected: usize,
        actual: usize,
    },

    /// A column holds a value of the wrong type.
    #[error("Column type mismatch for {table}[{index}]: expected {expected}, got {actual}")]
    ColumnType {
        table: String,
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine state machine violation.
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Shutdown in progress.
    #[error("Shutdown in progress")]
    Shutdown,

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Create a destination error from a sqlx error.
    pub fn destination(operation: impl Into<String>, source: sqlx::Error) -> Self {
        let transient = is_transient_sqlx_error(&source);
        Self::Destination {
            operation: operation.into(),
            message: source.to_string(),
            transient,
            source: Some(source),
        }
    }

    /// Create a destination error without a source.
    pub fn destination_msg(
        operation: impl Into<String>,
        message: impl Into<String>,
        transient: bool,
    ) -> Self {
        Self::Destination {
            operation: operation.into(),
            message: message.into(),
            transient,
            source: None,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Destination { transient, .. } => *transient,
            Self::EventSource(_) => true,
            Self::Source(_) => false,
            Self::RowShape { .. } => false, // Schema drift, retrying won't help
            Self::ColumnType { .. } => false,
            Self::Config(_) => false,
            Self::InvalidState { .. } => false,
            Self::Shutdown => false,
            Self::Internal(_) => false,
        }
    }
}

/// Connection-level sqlx errors that may clear up on their own.
fn is_transient_sqlx_error(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
    )
}
