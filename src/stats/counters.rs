// src/stats/counters.rs
//! Process-wide lock-free mining counters.
//!
//! One explicit [`MinerMetrics`] struct instead of scattered globals:
//! workers increment concurrently from hot paths, the control loop reads
//! periodically and resets the per-block marker at block boundaries.

use crate::types::NO_DL;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative mining totals shared across all workers
#[derive(Debug)]
pub struct MinerMetrics {
    /// Count of all hashes produced by workers
    pub hashes: AtomicU64,
    /// Best difficulty-distance so far this block; `NO_DL` when none
    best_dl: AtomicU64,
    /// Count of all submit attempts
    pub submits: AtomicU64,
    /// Count of submits rejected (orphan, stale data, or abandoned)
    pub rejects: AtomicU64,
    /// Shares found this run
    pub shares: AtomicU64,
    /// Block finds this run
    pub finds: AtomicU64,
}

/// Point-in-time copy of [`MinerMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total hashes
    pub hashes: u64,
    /// Best distance this block
    pub best_dl: u64,
    /// Submit attempts
    pub submits: u64,
    /// Rejected submits
    pub rejects: u64,
    /// Shares found
    pub shares: u64,
    /// Blocks found
    pub finds: u64,
}

impl MinerMetrics {
    /// Fresh counters, all zero, no best distance yet.
    pub fn new() -> Self {
        MinerMetrics {
            hashes: AtomicU64::new(0),
            best_dl: AtomicU64::new(NO_DL),
            submits: AtomicU64::new(0),
            rejects: AtomicU64::new(0),
            shares: AtomicU64::new(0),
            finds: AtomicU64::new(0),
        }
    }

    /// Records a candidate distance, keeping the block-wide minimum.
    ///
    /// Returns `true` when `dl` improved on the previous best, so callers
    /// can fire change notifications exactly once per improvement.
    pub fn record_best_dl(&self, dl: u64) -> bool {
        let mut current = self.best_dl.load(Ordering::Relaxed);
        while dl < current {
            match self.best_dl.compare_exchange_weak(
                current,
                dl,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(seen) => current = seen,
            }
        }
        false
    }

    /// Current best distance for this block; `NO_DL` when none recorded.
    pub fn best_dl(&self) -> u64 {
        self.best_dl.load(Ordering::Relaxed)
    }

    /// Clears the best-distance marker at a block boundary, returning the
    /// value it held. Distances are meaningless across blocks.
    pub fn reset_best_dl(&self) -> u64 {
        self.best_dl.swap(NO_DL, Ordering::Relaxed)
    }

    /// Takes a coherent-enough copy for reporting. Individual cells are
    /// read independently; this is telemetry, not accounting.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hashes: self.hashes.load(Ordering::Relaxed),
            best_dl: self.best_dl.load(Ordering::Relaxed),
            submits: self.submits.load(Ordering::Relaxed),
            rejects: self.rejects.load(Ordering::Relaxed),
            shares: self.shares.load(Ordering::Relaxed),
            finds: self.finds.load(Ordering::Relaxed),
        }
    }
}

impl Default for MinerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_dl_keeps_minimum() {
        let m = MinerMetrics::new();
        assert_eq!(m.best_dl(), NO_DL);
        assert!(m.record_best_dl(500));
        assert!(!m.record_best_dl(900));
        assert!(m.record_best_dl(120));
        assert_eq!(m.best_dl(), 120);
    }

    #[test]
    fn reset_returns_previous_and_clears() {
        let m = MinerMetrics::new();
        m.record_best_dl(77);
        assert_eq!(m.reset_best_dl(), 77);
        assert_eq!(m.best_dl(), NO_DL);
    }

    #[test]
    fn snapshot_reflects_counters() {
        let m = MinerMetrics::new();
        m.hashes.fetch_add(42, Ordering::Relaxed);
        m.shares.fetch_add(2, Ordering::Relaxed);
        let snap = m.snapshot();
        assert_eq!(snap.hashes, 42);
        assert_eq!(snap.shares, 2);
        assert_eq!(snap.rejects, 0);
    }
}
