// src/main.rs
use aro_miner_rs::{self, *};
use clap::Parser;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Main entry point for the miner
///
/// # Returns
/// - `Ok(())` on successful execution
/// - `Err(MinerError)` if any operation fails
///
/// # Flow
/// 1. Parses command line arguments
/// 2. Delegates to appropriate subcommand handler
/// 3. Propagates any errors upward
fn main() -> Result<(), MinerError> {
    let cli = cli::Commands::parse();

    match cli.action {
        cli::Action::Start(opts) => start_mining(opts),
        cli::Action::Config(opts) => generate_config(opts),
    }
}

/// Starts the mining operation with given configuration options
///
/// # Arguments
/// * `opts` - Command line options for mining operation
///
/// # Operations
/// 1. Initializes logging
/// 2. Loads and validates configuration, applying CLI overrides
/// 3. Builds the runtime and the miner stack inside it
/// 4. Runs the control loop until it stops
fn start_mining(opts: cli::StartOptions) -> Result<(), MinerError> {
    utils::init_logging();

    let mut config = config::load(&opts.config)?;
    // Apply CLI overrides
    if let Some(pool) = opts.pool {
        config.pool = pool;
    }
    if let Some(address) = opts.address {
        config.address = address;
    }
    if let Some(workers) = opts.workers {
        config.workers = workers;
    }
    if let Some(mode) = opts.mode {
        config.mode = mode;
    }
    config.validate()?;

    log::info!(
        "Starting miner: pool {} workers {} mode {}",
        config.pool,
        config.effective_hashers(),
        config.mode
    );

    // Runtime setup; the miner must be built inside it so detached
    // submit and telemetry tasks can be spawned from worker threads
    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut miner = Miner::new(config, Arc::new(Argon2Pow::new()), Arc::new(NoopCallbacks))?;
        miner.run().await
    })
}

/// Generates configuration template file
///
/// # Arguments
/// * `opts` - Configuration generation options
///
/// # Operations
/// 1. Generates template content based on options
/// 2. Writes template to specified output file
fn generate_config(opts: cli::ConfigOptions) -> Result<(), MinerError> {
    let template = config::generate_template(opts.telemetry);
    std::fs::write(opts.output, template)?;
    Ok(())
}
