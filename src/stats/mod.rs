// src/stats/mod.rs
//! Statistics collection and reporting module
//!
//! This module provides the shared stats model consumed by everything above
//! it:
//! - lock-free cumulative counters ([`MinerMetrics`])
//! - per-session records ([`SessionStats`])
//! - windowed aggregation and periodic reporting ([`Aggregator`])

/// Process-wide lock-free counters
pub mod counters;

/// Windowed aggregation of completed sessions
pub mod aggregator;

/// Per-session statistics record
pub mod session;

// Re-export main components
pub use aggregator::{Aggregator, Report, REPORT_INTERVAL};
pub use counters::{MetricsSnapshot, MinerMetrics};
pub use session::SessionStats;
