// src/config/config.rs
use crate::types::HasherMode;
use crate::utils::error::MinerError;
use crate::utils::ids::uniqid;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for the mining application
///
/// Contains all settings needed to configure mining operations,
/// including the pool endpoint, wallet address, worker sizing and
/// the optional stats collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the mining pool
    #[serde(default = "default_pool")]
    pub pool: String,

    /// Wallet address rewards are credited to
    pub address: String,

    /// Worker name reported to the pool (default: generated)
    #[serde(default)]
    pub worker: Option<String>,

    /// Number of hasher threads (0 = one per CPU core)
    #[serde(default)]
    pub workers: usize,

    /// Session strategy for hasher threads
    #[serde(default = "default_mode")]
    pub mode: HasherMode,

    /// Optional external stats collector
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}

/// Stats collector endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Base URL of the collector
    pub host: String,

    /// Endpoint invoked under the host (default: "report.php")
    #[serde(default = "default_invoke")]
    pub invoke: String,

    /// Access token attached to every request
    pub token: String,
}

fn default_pool() -> String {
    "http://aropool.com".into()
}

fn default_mode() -> HasherMode {
    HasherMode::Standard
}

fn default_invoke() -> String {
    "report.php".into()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pool: default_pool(),
            address: String::new(),
            worker: None,
            workers: 0,
            mode: default_mode(),
            telemetry: None,
        }
    }
}

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded configuration
    /// * `Err(MinerError)` - If file couldn't be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            MinerError::Config(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&config_str)
            .map_err(|e| MinerError::Config(format!("Invalid config format: {}", e)))
    }

    /// Checks the settings a run cannot proceed without.
    pub fn validate(&self) -> Result<(), MinerError> {
        if self.address.trim().is_empty() {
            return Err(MinerError::Config("wallet address is required".into()));
        }
        if self.pool.trim().is_empty() {
            return Err(MinerError::Config("pool URL is required".into()));
        }
        Ok(())
    }

    /// Hasher thread count after resolving the auto-detect sentinel.
    pub fn effective_hashers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }

    /// Worker name reported to the pool; generated when not configured.
    pub fn worker_name(&self) -> String {
        self.worker
            .clone()
            .unwrap_or_else(|| format!("worker-{}", uniqid()))
    }

    /// Generates a configuration template string
    ///
    /// # Arguments
    /// * `telemetry` - Include the stats collector section
    ///
    /// # Returns
    /// String containing a commented TOML configuration template
    pub fn generate_template(telemetry: bool) -> String {
        let mut template = String::new();
        template.push_str("# Miner Configuration\n\n");
        template.push_str("# Base URL of the mining pool\n");
        template.push_str("pool = \"http://aropool.com\"\n");
        template.push_str("# Wallet address rewards are credited to\n");
        template.push_str("address = \"your_wallet_address\"\n");
        template.push_str("# Worker name reported to the pool (omit to auto-generate)\n");
        template.push_str("worker = \"worker01\"\n");
        template.push_str("# Number of hasher threads (0 = one per CPU core)\n");
        template.push_str("workers = 0\n");
        template.push_str("# Session strategy: standard or persistent\n");
        template.push_str("mode = \"standard\"\n");

        if telemetry {
            template.push_str("\n# External stats collector\n");
            template.push_str("[telemetry]\n");
            template.push_str("host = \"http://stats.example.com\"\n");
            template.push_str("invoke = \"report.php\"\n");
            template.push_str("token = \"your_access_token\"\n");
        }

        template
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = toml::from_str(r#"address = "wallet""#).unwrap();
        assert_eq!(config.pool, "http://aropool.com");
        assert_eq!(config.workers, 0);
        assert_eq!(config.mode, HasherMode::Standard);
        assert!(config.telemetry.is_none());
        assert!(config.effective_hashers() >= 1);
    }

    #[test]
    fn full_config_parses() {
        let config: Config = toml::from_str(
            r#"
            pool = "http://pool.example"
            address = "wallet"
            worker = "rig1"
            workers = 4
            mode = "persistent"

            [telemetry]
            host = "http://stats.example"
            token = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.effective_hashers(), 4);
        assert_eq!(config.mode, HasherMode::Persistent);
        assert_eq!(config.worker_name(), "rig1");
        let telemetry = config.telemetry.unwrap();
        assert_eq!(telemetry.invoke, "report.php");
        assert_eq!(telemetry.token, "secret");
    }

    #[test]
    fn validation_requires_an_address() {
        let config = Config::default();
        assert!(config.validate().is_err());
        let config = Config {
            address: "wallet".into(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn template_is_valid_toml() {
        let config: Config = toml::from_str(&Config::generate_template(true)).unwrap();
        assert_eq!(config.worker_name(), "worker01");
        assert!(config.telemetry.is_some());
    }

    #[test]
    fn generated_worker_names_are_tagged() {
        let config = Config {
            address: "wallet".into(),
            ..Config::default()
        };
        assert!(config.worker_name().starts_with("worker-"));
    }
}
