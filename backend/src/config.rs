//! Configuration management for the Stock & Batch Management Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with SBM_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

use shared::NEAR_EXPIRY_WINDOW_DAYS;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Status/alert sweep configuration
    pub sweep: SweepConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SweepConfig {
    /// Seconds between sweep runs
    pub interval_secs: u64,

    /// Days before expiration at which a batch becomes near-expiry
    pub near_expiry_days: i64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("SBM_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("sweep.interval_secs", 3600)?
            .set_default("sweep.near_expiry_days", NEAR_EXPIRY_WINDOW_DAYS)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (SBM_ prefix)
            .add_source(
                Environment::with_prefix("SBM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            near_expiry_days: NEAR_EXPIRY_WINDOW_DAYS,
        }
    }
}
