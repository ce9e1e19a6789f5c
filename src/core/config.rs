//! # Configuration
//!
//! Environment-driven settings for the debate server.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::{anyhow, Result};
use std::time::Duration;

/// Default socket path for observer connections
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/agora.sock";

/// Default pause between generated turns
pub const DEFAULT_TURN_DELAY_MS: u64 = 2000;

/// Default HTTP timeout for provider calls
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub log_level: String,
    pub socket_path: String,
    pub turn_delay: Duration,
    pub provider_timeout: Duration,
    pub roster_path: String,
}

impl Config {
    /// Build the configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let turn_delay_ms = parse_u64(&lookup, "TURN_DELAY_MS", DEFAULT_TURN_DELAY_MS)?;
        let provider_timeout_secs =
            parse_u64(&lookup, "PROVIDER_TIMEOUT_SECS", DEFAULT_PROVIDER_TIMEOUT_SECS)?;

        if provider_timeout_secs == 0 {
            return Err(anyhow!("PROVIDER_TIMEOUT_SECS must be greater than zero"));
        }

        Ok(Config {
            database_path: lookup("DATABASE_PATH").unwrap_or_else(|| "debates.db".to_string()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            socket_path: lookup("AGORA_IPC_SOCKET")
                .unwrap_or_else(|| DEFAULT_SOCKET_PATH.to_string()),
            turn_delay: Duration::from_millis(turn_delay_ms),
            provider_timeout: Duration::from_secs(provider_timeout_secs),
            roster_path: lookup("ROSTER_PATH").unwrap_or_else(|| "roster.yaml".to_string()),
        })
    }
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| anyhow!("Invalid value for {}: '{}' ({})", key, raw, e)),
        None => Ok(default),
    }
}
