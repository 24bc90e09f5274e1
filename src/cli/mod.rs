// src/cli/mod.rs
//! Command-line interface definitions

/// Argument and subcommand declarations
pub mod commands;

// Re-export key items for easy access
pub use commands::{Action, Commands, ConfigOptions, StartOptions};
