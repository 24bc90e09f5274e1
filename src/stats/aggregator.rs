// src/stats/aggregator.rs
//! Windowed aggregation of completed-session statistics.
//!
//! The control loop drains finished sessions on every other tick and folds
//! them in here; every reporting interval the open [`Report`] is emitted
//! (log line + telemetry) and the window resets. Exactly one window is open
//! at any time.

use crate::network::telemetry::TelemetryPublisher;
use crate::stats::counters::MinerMetrics;
use crate::stats::session::SessionStats;
use crate::types::NO_DL;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often the open window is emitted and reset.
pub const REPORT_INTERVAL: Duration = Duration::from_millis(45_000);

/// Interval aggregate over completed sessions
///
/// Ratio fields are per-session sums; divide by `runs` for averages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    /// Sessions folded into this window
    pub runs: u64,
    /// Summed hashes
    pub hashes: u64,
    /// Summed shares
    pub shares: u64,
    /// Summed finds
    pub finds: u64,
    /// Summed proof-time share of busy time
    pub proof_eff: f64,
    /// Summed auxiliary-hash share of busy time
    pub aux_eff: f64,
    /// Summed per-session hash rates (hashes per second)
    pub hash_per_second: f64,
    /// Summed core utilization (busy time over scheduled wall time)
    pub time_in_core: f64,
    /// Summed scheduling/wait loss ((scheduled - actual) / scheduled)
    pub wait_loss: f64,
    /// Summed proof time
    pub proof_time: Duration,
    /// Summed auxiliary hash time
    pub aux_time: Duration,
    /// Summed non-proof overhead
    pub overhead_time: Duration,
    /// Summed session wall time
    pub total_time: Duration,
}

impl Report {
    /// Average per-session hash rate for the window, 0 when empty.
    pub fn avg_rate(&self) -> f64 {
        if self.runs == 0 {
            0.0
        } else {
            self.hash_per_second / self.runs as f64
        }
    }
}

/// Drains completed-session records into cumulative and windowed metrics
pub struct Aggregator {
    /// Identity attached to emitted telemetry
    worker: String,
    metrics: Arc<MinerMetrics>,
    telemetry: TelemetryPublisher,
    window: Report,
    window_started: Instant,
    report_every: Duration,
    /// Aggregate hash-rate accrual across drain intervals
    rate_sum: f64,
    rate_samples: u64,
}

impl Aggregator {
    /// Opens the first window; `worker` tags emitted telemetry.
    pub fn new(
        worker: String,
        metrics: Arc<MinerMetrics>,
        telemetry: TelemetryPublisher,
    ) -> Self {
        Aggregator {
            worker,
            metrics,
            telemetry,
            window: Report::default(),
            window_started: Instant::now(),
            report_every: REPORT_INTERVAL,
            rate_sum: 0.0,
            rate_samples: 0,
        }
    }

    #[cfg(test)]
    fn with_interval(mut self, every: Duration) -> Self {
        self.report_every = every;
        self
    }

    /// Folds one completed session into the cumulative counters and the
    /// open window.
    pub fn fold(&mut self, stats: &SessionStats) {
        use std::sync::atomic::Ordering;

        self.metrics.shares.fetch_add(stats.shares, Ordering::Relaxed);
        self.metrics.finds.fetch_add(stats.finds, Ordering::Relaxed);
        if stats.best_dl != NO_DL {
            self.metrics.record_best_dl(stats.best_dl);
        }

        self.window.runs += 1;
        self.window.hashes += stats.hashes;
        self.window.shares += stats.shares;
        self.window.finds += stats.finds;

        let busy = stats.busy_time();
        if !busy.is_zero() {
            self.window.proof_eff += stats.proof_time.as_secs_f64() / busy.as_secs_f64();
            self.window.aux_eff += stats.aux_time.as_secs_f64() / busy.as_secs_f64();
        }
        if !stats.hash_time.is_zero() {
            self.window.hash_per_second +=
                stats.hashes as f64 / stats.hash_time.as_secs_f64();
        }
        if !stats.scheduled_time.is_zero() {
            self.window.time_in_core +=
                busy.as_secs_f64() / stats.scheduled_time.as_secs_f64();
            self.window.wait_loss += (stats.scheduled_time.as_secs_f64()
                - stats.hash_time.as_secs_f64())
                / stats.scheduled_time.as_secs_f64();
        }

        self.window.proof_time += stats.proof_time;
        self.window.aux_time += stats.aux_time;
        self.window.overhead_time += stats.overhead_time;
        self.window.total_time += stats.hash_time;
    }

    /// Records one drain interval's worth of fresh hashes for the rolling
    /// aggregate rate handed to the pool and host callbacks.
    pub fn record_drain(&mut self, fresh_hashes: u64, wall: Duration) {
        if wall.is_zero() {
            return;
        }
        self.rate_sum += fresh_hashes as f64 / wall.as_secs_f64();
        self.rate_samples += 1;
    }

    /// Rolling aggregate hash rate, averaged over drain intervals since the
    /// window opened.
    pub fn rate(&self) -> f64 {
        if self.rate_samples == 0 {
            0.0
        } else {
            self.rate_sum / self.rate_samples as f64
        }
    }

    /// Emits and resets the window once the reporting interval has elapsed.
    ///
    /// Returns the emitted report so the control loop can reset its own
    /// interval counters alongside.
    pub fn maybe_report(&mut self) -> Option<Report> {
        let elapsed = self.window_started.elapsed();
        if elapsed < self.report_every {
            return None;
        }

        let report = std::mem::take(&mut self.window);
        let snap = self.metrics.snapshot();
        let mut wait_loss = report.wait_loss;
        if wait_loss < 0.0 {
            wait_loss = 0.0;
        }
        log::info!(
            "Report: {:.2} H/s over {} sessions | shares {} finds {} rejects {} | \
             proof {:.1}% aux {:.1}% core {:.1}% wait-loss {:.1}%",
            self.rate(),
            report.runs,
            snap.shares,
            snap.finds,
            snap.rejects,
            per_run_pct(report.proof_eff, report.runs),
            per_run_pct(report.aux_eff, report.runs),
            per_run_pct(report.time_in_core, report.runs),
            per_run_pct(wait_loss, report.runs),
        );
        self.telemetry.report(
            &self.worker,
            "aggregate",
            report.hashes,
            elapsed.as_millis() as u64,
        );

        self.window_started = Instant::now();
        self.rate_sum = 0.0;
        self.rate_samples = 0;
        Some(report)
    }
}

fn per_run_pct(sum: f64, runs: u64) -> f64 {
    if runs == 0 {
        0.0
    } else {
        sum * 100.0 / runs as f64
    }
}
