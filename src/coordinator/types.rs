// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine state types.
//!
//! # State Transitions
//!
//! ```text
//!              start()
//! Created ───────────────→ Starting ──(baseline query failed)──→ Failed
//!                              │                                   ↑
//!                              │ (consumer spawned)                │
//!                              ↓                  (write failed)   │
//!                           Running ───────────────────────────────┘
//!                              │  │
//!                   shutdown() │  │ (event source ended)
//!                              ↓  ↓
//!                    ShuttingDown → Stopped
//! ```
//!
//! - **Created**: `RelayEngine::new()` done. Nothing connected to the log yet.
//! - **Starting**: capturing the replay baseline.
//! - **Running**: consumer task is pulling and routing events.
//! - **ShuttingDown**: cancellation signalled; the current event finishes.
//! - **Stopped**: consumer exited cleanly.
//! - **Failed**: startup failed or an event could not be mirrored.

/// State of the relay engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
    Failed,
}

impl EngineState {
    /// Check if the engine has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Stopped | EngineState::Failed)
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Created => write!(f, "Created"),
            EngineState::Starting => write!(f, "Starting"),
            EngineState::Running => write!(f, "Running"),
            EngineState::ShuttingDown => write!(f, "ShuttingDown"),
            EngineState::Stopped => write!(f, "Stopped"),
            EngineState::Failed => write!(f, "Failed"),
        }
    }
}

/// Counters from one run of the consumer loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Events pulled from the source (rows and schema changes).
    pub received: u64,
    /// Events that produced a destination write.
    pub applied: u64,
    /// Events dropped without a write.
    pub ignored: u64,
}
