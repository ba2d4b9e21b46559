//! Application configuration loaded from environment variables.

use std::path::PathBuf;

use serde::Deserialize;

use crate::auth::ApiKey;
use crate::error::{RelayError, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Credentials ===
    /// Shared secret every device must send as `apiKey`.
    pub api_key: ApiKey,

    // === Server Configuration ===
    /// HTTP listening port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served for any path the API does not handle.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    // === Persistence ===
    /// SQLite database file (`:memory:` for a throwaway store).
    #[serde(default = "default_database_path")]
    pub database_path: String,

    // === Ingestion ===
    /// Reject readings with missing, negative or non-finite values.
    #[serde(default)]
    pub strict_readings: bool,
}

/// Logging settings, read before anything else so they never depend on
/// the rest of the configuration being valid.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log filter (trace, debug, info, warn, error, or full directives).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_port() -> u16 {
    3300
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_database_path() -> String {
    "sensor.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> std::result::Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Load configuration and reject it if [`Config::validate`] fails.
    pub fn load_validated() -> Result<Self> {
        let config = Self::load()?;
        config.validate().map_err(RelayError::InvalidConfig)?;
        Ok(config)
    }

    /// Build a configuration with defaults for everything but the key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: ApiKey::new(api_key),
            port: default_port(),
            static_dir: default_static_dir(),
            database_path: default_database_path(),
            strict_readings: false,
        }
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.api_key.is_empty() {
            return Err("API_KEY is required".to_string());
        }

        if self.port == 0 {
            return Err("PORT must be non-zero".to_string());
        }

        if self.database_path.trim().is_empty() {
            return Err("DATABASE_PATH must not be empty".to_string());
        }

        Ok(())
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            rust_log: default_log_level(),
            verbose: false,
        }
    }
}

impl LogConfig {
    /// Load `RUST_LOG` and `VERBOSE`, reading .env file first.
    pub fn load() -> std::result::Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Filter directive for the subscriber; verbose from either source wins.
    pub fn filter_directive(&self, cli_verbose: bool) -> String {
        if cli_verbose || self.verbose {
            "pulse_relay=debug,info".to_string()
        } else {
            self.rust_log.clone()
        }
    }
}
