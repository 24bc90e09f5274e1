// src/miner/rebalancer.rs
//! Proportional session tuning.
//!
//! Sessions should take roughly the target length regardless of how fast
//! the host hashes. After each drain the rebalancer compares every
//! session's actual wall time against the target and nudges the per-session
//! hash quota by half the proportional gap, averaged over the drained
//! samples. The quota never drops below one.

use crate::stats::SessionStats;
use crate::types::TuningState;

/// Quota floor; a session always attempts at least one hash.
pub const MIN_HASHES_PER_SESSION: u64 = 1;

/// Gain applied to the proportional gap.
const GAIN: f64 = 0.5;

/// Nudges the session quota toward the target session length
#[derive(Debug, Default)]
pub struct Rebalancer;

impl Rebalancer {
    /// Retunes against one drain's worth of completed sessions.
    ///
    /// Returns the new tuning when at least one usable sample was seen,
    /// `None` otherwise (tuning is left as it was).
    pub fn retune(&self, tuning: &TuningState, sessions: &[SessionStats]) -> Option<TuningState> {
        let target = tuning.session_length.as_secs_f64();
        if target <= 0.0 {
            return None;
        }

        let mut adjust = 0.0_f64;
        let mut samples = 0u64;
        for s in sessions {
            if s.hash_time.is_zero() {
                continue;
            }
            let actual = s.hash_time.as_secs_f64();
            if actual < target {
                adjust += GAIN * s.hashes as f64 * (target - actual) / target;
            } else if actual > target {
                adjust -= GAIN * s.hashes as f64 * (actual - target) / actual;
            }
            samples += 1;
        }
        if samples == 0 {
            return None;
        }

        let delta = (adjust / samples as f64).round() as i64;
        let hashes = tuning
            .hashes_per_session
            .saturating_add_signed(delta)
            .max(MIN_HASHES_PER_SESSION);
        Some(TuningState {
            hashes_per_session: hashes,
            session_length: tuning.session_length,
        })
    }
}
