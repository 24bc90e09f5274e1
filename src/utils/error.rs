// src/utils/error.rs
use std::io;
use thiserror::Error;

/// Main error type for the mining application
///
/// Transport and protocol failures are retried (bounded) and never fatal
/// outside startup; startup and worker faults deactivate the whole process.
#[derive(Error, Debug)]
pub enum MinerError {
    /// Connect/read/timeout or non-2xx response from the pool
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Non-"ok" status or malformed payload from the pool
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// No successful pool sync within the bounded startup attempt cap
    #[error("Startup failure: {0}")]
    Startup(String),

    /// Unrecovered fault inside a worker's execution; fatal for the process
    #[error("Worker fault: {0}")]
    WorkerFault(String),

    /// Proof-of-work computation errors
    #[error("Hashing error: {0}")]
    Hashing(String),

    /// Configuration file or parameter errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Standard I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Thread communication channel errors
    #[error("Thread communication error: {0}")]
    Channel(String),
}

/// Converts Argon2 errors into MinerError
///
/// Raised when the proof hash cannot be computed, e.g. bad parameters.
impl From<argon2::Error> for MinerError {
    fn from(e: argon2::Error) -> Self {
        MinerError::Hashing(format!("Argon2 failed: {}", e))
    }
}
