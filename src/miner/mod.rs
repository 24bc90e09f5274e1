// src/miner/mod.rs
//! Mining coordination module
//!
//! Home of the control loop and everything it steers:
//! - the top-level [`Miner`] control loop
//! - the worker pool ([`WorkerPool`]) and session workers ([`Hasher`])
//! - session tuning ([`Rebalancer`])
//! - the proof-of-work backend ([`ProofOfWork`])

/// Top-level control loop
pub mod controller;

/// Session worker threads
pub mod hasher;

/// Worker pool lifecycle
pub mod pool_manager;

/// Proof-of-work backend
pub mod pow;

/// Proportional session tuning
pub mod rebalancer;

// Re-export main components
pub use controller::{Miner, UPDATE_DELAY};
pub use hasher::{create_hasher, Hasher, SolutionSink};
pub use pool_manager::WorkerPool;
pub use pow::{Argon2Pow, ProofOfWork, ProofOutcome};
pub use rebalancer::{Rebalancer, MIN_HASHES_PER_SESSION};

/// Host integration points.
///
/// Embedding hosts (a UI, a wrapper daemon) implement this to observe
/// mining milestones; every method defaults to a no-op so plain CLI runs
/// use [`NoopCallbacks`]. Calls arrive from worker threads and from
/// detached submit tasks, so implementations must be cheap and must not
/// block.
pub trait HostCallbacks: Send + Sync {
    /// A new process-wide best distance was recorded.
    fn on_dur_change(&self, _dl: u64) {}

    /// A worker found a block-winning solution.
    fn on_find(&self, _worker: &str) {}

    /// A worker found a share below the pool limit.
    fn on_share(&self, _worker: &str) {}

    /// A submission was rejected or abandoned.
    fn on_reject(&self, _worker: &str) {}

    /// Periodic aggregate rate, with the current best distance.
    fn on_hash_rate(&self, _rate: f64, _best_dl: u64) {}
}

/// Callbacks that observe nothing
pub struct NoopCallbacks;

impl HostCallbacks for NoopCallbacks {}
