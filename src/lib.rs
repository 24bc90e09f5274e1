//! Arionum pool miner in Rust
//!
//! This crate provides the coordination core of an Arionum pool miner:
//! - a worker pool of session-based hasher threads
//! - chain-state polling, share submission and stats reporting
//! - proportional tuning of session quotas against a wall-time target

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Miner core: control loop, worker pool, sessions and proof of work
pub mod miner;

/// Network communication with the pool and the stats collector
pub mod network;

/// Statistics collection and reporting functionality
pub mod stats;

/// Utility functions and error handling
pub mod utils;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Shared type definitions
pub mod types;

// Core exports
pub use cli::Commands;
pub use config::Config;
pub use miner::{Argon2Pow, HostCallbacks, Miner, NoopCallbacks, ProofOfWork};
pub use network::{Submitter, TelemetryPublisher, UpdateClient};
pub use stats::{Aggregator, MinerMetrics, SessionStats};
pub use types::{ChainState, HasherMode, Solution, TuningState};
pub use utils::{init_logging, MinerError};
