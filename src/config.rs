//! Server configuration from environment variables

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_DB_PATH: &str = "./mesas.db";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_ADVANCE_DELAY_MS: u64 = 400;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `MESAS_DB_PATH`
    pub db_path: PathBuf,
    /// `MESAS_PORT`
    pub port: u16,
    /// `MESAS_ADVANCE_DELAY_MS`: how long a result stays on screen before
    /// the export prompt
    pub advance_delay: Duration,
    /// `MESAS_SEED`: load reference data into an empty database
    pub seed: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            port: DEFAULT_PORT,
            advance_delay: Duration::from_millis(DEFAULT_ADVANCE_DELAY_MS),
            seed: true,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset variables keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = lookup("MESAS_DB_PATH").filter(|p| !p.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(value) = lookup("MESAS_PORT") {
            config.port = value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "MESAS_PORT",
                expected: "a port number",
                value,
            })?;
        }
        if let Some(value) = lookup("MESAS_ADVANCE_DELAY_MS") {
            let millis: u64 = value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "MESAS_ADVANCE_DELAY_MS",
                expected: "a whole number of milliseconds",
                value,
            })?;
            config.advance_delay = Duration::from_millis(millis);
        }
        if let Some(value) = lookup("MESAS_SEED") {
            config.seed = parse_flag(&value).ok_or(ConfigError::Invalid {
                var: "MESAS_SEED",
                expected: "true or false",
                value,
            })?;
        }

        Ok(config)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
