// src/cli/commands.rs
use crate::types::HasherMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Arionum pool miner
#[derive(Parser, Debug)]
#[command(name = "aro-miner-rs")]
#[command(version, about, long_about = None)]
pub struct Commands {
    /// The action to perform (start mining or generate config)
    #[command(subcommand)]
    pub action: Action,
}

/// Top-level commands for the miner application
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Start mining with the specified options
    Start(StartOptions),

    /// Generate a configuration file template
    Config(ConfigOptions),
}

/// Options for starting the mining operation
#[derive(Parser, Debug)]
pub struct StartOptions {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Base URL of the mining pool (overrides config)
    #[arg(short, long)]
    pub pool: Option<String>,

    /// Wallet address rewards are credited to (overrides config)
    #[arg(short, long)]
    pub address: Option<String>,

    /// Number of hasher threads (overrides config)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Session strategy for hasher threads (overrides config)
    #[arg(short, long)]
    pub mode: Option<HasherMode>,
}

/// Options for generating configuration files
#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Output file path
    #[arg(short, long, default_value = "config.toml")]
    pub output: PathBuf,

    /// Include the stats collector section
    #[arg(short, long)]
    pub telemetry: bool,
}
