// src/types.rs
use clap::ValueEnum;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Difficulty-distance at or below which a solution wins the block outright.
pub const BLOCK_FOUND_DL: u64 = 240;

/// Submission floor assumed until the pool reports its own.
pub const DEFAULT_LIMIT: u64 = 240;

/// Sentinel distance meaning "nothing found yet".
pub const NO_DL: u64 = u64::MAX;

/// Hashing strategies the worker factory can produce
///
/// Each variant maps to one concrete [`crate::miner::Hasher`] implementation
/// with a different session lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HasherMode {
    /// One session per worker life; the pool manager replaces the worker
    /// after every session. This is the default strategy.
    #[clap(name = "standard")]
    Standard,

    /// Long-lived worker that keeps running sessions, reporting intermediate
    /// stats and picking up refreshed tuning between sessions.
    #[clap(name = "persistent")]
    Persistent,
}

impl fmt::Display for HasherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HasherMode::Standard => write!(f, "standard"),
            HasherMode::Persistent => write!(f, "persistent"),
        }
    }
}

impl FromStr for HasherMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(HasherMode::Standard),
            "persistent" => Ok(HasherMode::Persistent),
            _ => Err(format!("Unknown hasher mode: {}", s)),
        }
    }
}

/// Authoritative mining target, replaced as a whole on every pool change
///
/// Snapshots are immutable and shared behind `Arc`; a worker mid-session
/// keeps the snapshot it was handed and only picks up a newer one at its
/// next session boundary. Readers therefore never observe fields from two
/// different pool updates.
#[derive(Debug, Clone)]
pub struct ChainState {
    /// Opaque block descriptor from the pool
    pub block: String,
    /// Current difficulty, arbitrary precision
    pub difficulty: BigUint,
    /// Submission floor: distances at or below this are worth submitting
    pub limit: u64,
    /// Public key the pool wants proofs bound to
    pub public_key: String,
    /// Block height the target belongs to
    pub height: u64,
    /// When this snapshot was built
    pub updated_at: Instant,
}

/// Work-quantum tuning handed to every new session
///
/// Mutated only by the control loop (via the rebalancer); everyone else
/// receives copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuningState {
    /// Hashes a session should attempt; never below 1
    pub hashes_per_session: u64,
    /// Target wall-clock duration of one session
    pub session_length: Duration,
}

impl TuningState {
    /// Soft time budget handed to sessions: double the nominal target,
    /// so a slow session can overrun without being torn mid-flight.
    pub fn session_budget(&self) -> Duration {
        self.session_length * 2
    }
}

impl Default for TuningState {
    fn default() -> Self {
        TuningState {
            hashes_per_session: 10,
            session_length: Duration::from_millis(5000),
        }
    }
}

/// A candidate solution on its way to the pool
///
/// Carries everything the submission pipeline and discovery telemetry need,
/// including the height it was computed against. Submitted even if stale,
/// the pool is authoritative.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Nonce that produced the proof
    pub nonce: String,
    /// Full encoded proof; only the fragment past a fixed offset is posted
    pub argon: String,
    /// Achieved difficulty-distance (lower is better)
    pub dl: u64,
    /// Difficulty the distance was computed against
    pub difficulty: u64,
    /// Type tag of the worker that found it
    pub kind: &'static str,
    /// Public key the proof is bound to
    pub public_key: String,
    /// Height of the block the solution targets
    pub height: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_budget_doubles_target() {
        let tuning = TuningState {
            hashes_per_session: 10,
            session_length: Duration::from_millis(5000),
        };
        assert_eq!(tuning.session_budget(), Duration::from_millis(10000));
    }

    #[test]
    fn hasher_mode_parses_both_ways() {
        assert_eq!("standard".parse::<HasherMode>(), Ok(HasherMode::Standard));
        assert_eq!(
            "PERSISTENT".parse::<HasherMode>(),
            Ok(HasherMode::Persistent)
        );
        assert!("auto".parse::<HasherMode>().is_err());
        assert_eq!(HasherMode::Standard.to_string(), "standard");
    }
}
