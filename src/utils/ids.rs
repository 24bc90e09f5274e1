// src/utils/ids.rs
//! Quasi-unique identifier generation for workers and telemetry tokens.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns a quasi-unique identifier derived from the current clock.
///
/// Same shape as PHP's `uniqid()`: hex seconds followed by a hex
/// sub-second component. Uniqueness is "good enough" for worker names and
/// stats tokens, not for anything security-sensitive.
pub fn uniqid() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let micros = now.subsec_micros();
    format!("{:8x}{:05x}", now.as_secs(), micros)
        .trim()
        .to_string()
}
