// src/stats/session.rs
//! Per-session statistics record.

use crate::types::NO_DL;
use std::time::Duration;

/// Everything one completed hash-search session reports back
///
/// Produced exactly once per session by a worker and consumed exactly once
/// by the aggregation step (aggregator + rebalancer share the same drain).
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Identity of the worker that ran the session
    pub id: String,
    /// Worker type tag ("standard", "persistent", ...)
    pub kind: &'static str,
    /// Hashes completed
    pub hashes: u64,
    /// Best difficulty-distance found; `NO_DL` when none
    pub best_dl: u64,
    /// Shares found (below pool limit, above block threshold)
    pub shares: u64,
    /// Block finds (below block threshold)
    pub finds: u64,
    /// Time spent in the proof function
    pub proof_time: Duration,
    /// Time spent in the auxiliary hash chain
    pub aux_time: Duration,
    /// Non-proof overhead inside the hash loop
    pub overhead_time: Duration,
    /// Total session wall time as measured by the worker
    pub hash_time: Duration,
    /// Spawn-to-report wall time, filled in by the pool manager
    pub scheduled_time: Duration,
}

impl SessionStats {
    /// Empty record for a session about to start.
    pub fn new(id: String, kind: &'static str) -> Self {
        SessionStats {
            id,
            kind,
            hashes: 0,
            best_dl: NO_DL,
            shares: 0,
            finds: 0,
            proof_time: Duration::ZERO,
            aux_time: Duration::ZERO,
            overhead_time: Duration::ZERO,
            hash_time: Duration::ZERO,
            scheduled_time: Duration::ZERO,
        }
    }

    /// Hash-busy time: proof plus non-proof overhead.
    pub fn busy_time(&self) -> Duration {
        self.proof_time + self.overhead_time
    }
}
