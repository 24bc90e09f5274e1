// src/network/mod.rs
//! Pool communication module
//!
//! Everything that talks HTTP lives here:
//! - chain-state polling ([`UpdateClient`])
//! - solution submission with bounded retry ([`Submitter`])
//! - best-effort stats publishing ([`TelemetryPublisher`])

/// Pool info polling and chain-state snapshots
pub mod sync;

/// Solution submission pipeline
pub mod submit;

/// Fire-and-forget stats reporting
pub mod telemetry;

// Re-export main components
pub use submit::{SubmitOutcome, Submitter, ARGON_FRAGMENT_OFFSET, MAX_SUBMIT_FAILURES};
pub use sync::{PoolInfo, StateChange, SyncOutcome, UpdateClient};
pub use telemetry::TelemetryPublisher;
