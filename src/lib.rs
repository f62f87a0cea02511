//! # Transaction Relay
//!
//! Mirrors charging-transaction lifecycle rows from a MySQL source into a
//! single consolidated PostgreSQL `transaction` table, driven by the source's
//! replication log.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                              txn-relay                                   │
//! │                                                                          │
//! │  ┌──────────────┐   ┌──────────────────┐   ┌──────────────────────────┐  │
//! │  │ binlog reader│──►│ ReplicationEvent │──►│ TransactionEventRouter   │  │
//! │  │ (external)   │   │ Source (channel) │   │ replay / table / action  │  │
//! │  └──────────────┘   └──────────────────┘   └────────────┬─────────────┘  │
//! │                                                         │                │
//! │  ┌──────────────────┐                       ┌───────────▼─────────────┐  │
//! │  │ PositionTracker  │  baseline at startup  │ LifecycleWriter × 3     │  │
//! │  │ SHOW MASTER      │─────────────────────► │ start / stop / failed   │  │
//! │  │ STATUS           │                       └───────────┬─────────────┘  │
//! │  └──────────────────┘                                   │                │
//! │                                             ┌───────────▼─────────────┐  │
//! │                                             │ TransactionStore        │  │
//! │                                             │ (PostgreSQL)            │  │
//! │                                             └─────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Delivery
//!
//! Events older than the position captured at startup are treated as replay
//! and dropped, and no resume position is persisted. The writes themselves are
//! not idempotent (a second start for the same transaction violates the
//! destination's primary key), so it is replay suppression that keeps
//! redelivered history out of the destination.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use txn_relay::{ChannelEventSource, RelayConfig, RelayEngine};
//!
//! #[tokio::main]
//! async fn main() -> txn_relay::Result<()> {
//!     let config = RelayConfig::from_env()?;
//!     let mut engine = RelayEngine::connect(config).await?;
//!
//!     // The binlog decoder pushes events through `sender`.
//!     let (sender, source) = ChannelEventSource::new(256);
//!     # drop(sender);
//!     engine.start_from_source(source).await?;
//!
//!     engine.run_until_signal().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod metrics;
pub mod position;
pub mod record;
pub mod resilience;
pub mod router;
pub mod source;
pub mod store;
pub mod writer;

// Re-exports for convenience
pub use config::{DestinationConfig, FailurePolicy, RelayConfig, RelaySettings, SourceConfig, TrackedTables};
pub use coordinator::{ConsumerStats, EngineState, RelayEngine};
pub use error::{RelayError, Result};
pub use event::{ColumnValue, RowAction, RowChangeEvent};
pub use position::{BaselineSource, LogPosition, MySqlBaselineSource, PositionTracker, StaticBaseline};
pub use record::{FailedStopRecord, LifecycleKind, StartRecord, StopRecord, TransactionRecord};
pub use router::{Disposition, IgnoreReason, TransactionEventRouter};
pub use source::{ChannelEventSource, EventSender, ReplicationEventSource, RowEventHandler, SourceEvent};
pub use store::{NoOpTransactionStore, PgTransactionStore, TransactionStore};
pub use writer::{LifecycleWriter, WriteOutcome};
