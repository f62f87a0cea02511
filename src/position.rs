// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication log positions and the replay baseline.
//!
//! At startup we ask the source store for its current binlog position and
//! keep it as the *baseline*. Every event older than the baseline is assumed
//! to be reflected in the destination already and is dropped.
//!
//! # Fail-closed baseline
//!
//! If the source reports an empty log name (binary logging disabled, or the
//! status query returned no row), **every** event is treated as replay. The
//! relay then mirrors nothing until it is restarted against a source with a
//! determinable position.
//!
//! ```text
//! baseline = (mysql-bin.000007, 1200)
//!
//!   offset 900   → replay, dropped
//!   offset 1200  → applied
//!   offset 1500  → applied
//! ```

use crate::error::{RelayError, Result};
use sqlx::mysql::MySqlPool;
use sqlx::Row;
use std::cmp::Ordering;
use std::future::Future;
use std::pin::Pin;
use tracing::{info, warn};

/// A position in the source replication log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LogPosition {
    /// Binlog file name (e.g. "mysql-bin.000007"). Empty means unknown.
    pub log_name: String,
    /// Byte offset within the log file.
    pub offset: u64,
}

impl LogPosition {
    pub fn new(log_name: impl Into<String>, offset: u64) -> Self {
        Self {
            log_name: log_name.into(),
            offset,
        }
    }

    /// Check if the log name is unknown.
    pub fn is_unknown(&self) -> bool {
        self.log_name.is_empty()
    }
}

impl PartialOrd for LogPosition {
    /// Positions only order within the same log file.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.log_name != other.log_name {
            return None;
        }
        Some(self.offset.cmp(&other.offset))
    }
}

impl std::fmt::Display for LogPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.log_name.is_empty() {
            write!(f, "<unknown>:{}", self.offset)
        } else {
            write!(f, "{}:{}", self.log_name, self.offset)
        }
    }
}

/// Boxed future returned by [`BaselineSource`].
pub type BaselineFuture<'a> = Pin<Box<dyn Future<Output = Result<LogPosition>> + Send + 'a>>;

/// Where the startup baseline comes from.
pub trait BaselineSource: Send + Sync {
    /// Read the source's current replication log position.
    fn current_position(&self) -> BaselineFuture<'_>;
}

/// Reads the baseline with `SHOW MASTER STATUS`.
pub struct MySqlBaselineSource {
    pool: MySqlPool,
}

impl MySqlBaselineSource {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

impl BaselineSource for MySqlBaselineSource {
    fn current_position(&self) -> BaselineFuture<'_> {
        Box::pin(async move {
            let row = sqlx::query("SHOW MASTER STATUS")
                .fetch_optional(&self.pool)
                .await
                .map_err(RelayError::Source)?;

            // No row: binary logging is off. Report an unknown position and let
            // the tracker fail closed.
            let Some(row) = row else {
                return Ok(LogPosition::default());
            };

            let log_name: String = row.try_get("File").map_err(RelayError::Source)?;
            let offset: u64 = row.try_get("Position").map_err(RelayError::Source)?;
            Ok(LogPosition::new(log_name, offset))
        })
    }
}

/// A fixed baseline, for tests and for callers that already know the position.
#[derive(Debug, Clone)]
pub struct StaticBaseline(pub LogPosition);

impl BaselineSource for StaticBaseline {
    fn current_position(&self) -> BaselineFuture<'_> {
        let position = self.0.clone();
        Box::pin(async move { Ok(position) })
    }
}

/// Replay filter built from the startup baseline.
///
/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    baseline: LogPosition,
}

impl PositionTracker {
    pub fn new(baseline: LogPosition) -> Self {
        Self { baseline }
    }

    /// Read the baseline once from `source`.
    ///
    /// Errors are fatal to startup; there is no fallback position.
    pub async fn capture<B: BaselineSource + ?Sized>(source: &B) -> Result<Self> {
        let baseline = source.current_position().await?;
        if baseline.is_unknown() {
            warn!(
                offset = baseline.offset,
                "Source reported no binlog name - every event will be treated as replay"
            );
        } else {
            info!(
                log_name = %baseline.log_name,
                offset = baseline.offset,
                "Captured replay baseline"
            );
        }
        Ok(Self::new(baseline))
    }

    pub fn baseline(&self) -> &LogPosition {
        &self.baseline
    }

    /// Check if an event at `position` predates the baseline.
    ///
    /// Only offsets are compared; the log name of `position` is not consulted.
    /// An unknown baseline log name suppresses everything.
    pub fn is_replay(&self, position: &LogPosition) -> bool {
        position.offset < self.baseline.offset || self.baseline.log_name.is_empty()
    }
}
