// src/utils/mod.rs
//! Utilities module for common functionality
//!
//! This module contains shared utilities used throughout the mining
//! application, including error handling, logging infrastructure and
//! identifier generation.

/// Error types and handling utilities
///
/// Contains the [`MinerError`] enum which defines all possible error
/// conditions for the mining application.
pub mod error;

/// Logging configuration and utilities
pub mod logging;

/// Quasi-unique identifier helpers
pub mod ids;

// Re-export for easier access
pub use error::MinerError;
pub use ids::uniqid;
pub use logging::init_logging;
