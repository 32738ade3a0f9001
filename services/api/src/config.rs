//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which store adapter backs the services.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    Memory,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub store: StoreBackend,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub log_level: Level,
    pub cors_allowed_origin: String,
    pub bubble_scheduler_enabled: bool,
    pub bubble_decay_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Server and Database Settings ---
        let bind_address = parse_or::<SocketAddr>(&lookup, "BIND_ADDRESS", "0.0.0.0:5000")?;

        let backend = lookup("STORE_BACKEND").unwrap_or_else(|| "postgres".to_string());
        let store = match backend.to_lowercase().as_str() {
            "postgres" => StoreBackend::Postgres {
                database_url: lookup("DATABASE_URL")
                    .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?,
            },
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORE_BACKEND".to_string(),
                    format!("'{}' is not one of postgres, memory", other),
                ))
            }
        };

        let db_max_connections = parse_or::<u32>(&lookup, "DB_MAX_CONNECTIONS", "5")?;
        let db_acquire_timeout =
            Duration::from_secs(parse_or::<u64>(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", "5")?);

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_allowed_origin = lookup("CORS_ALLOWED_ORIGIN")
            .unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Time Bubble Scheduler ---
        let bubble_scheduler_enabled = parse_or::<bool>(&lookup, "BUBBLE_SCHEDULER_ENABLED", "true")?;
        let interval_secs = parse_or::<u64>(&lookup, "BUBBLE_DECAY_INTERVAL_SECS", "86400")?;
        if interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "BUBBLE_DECAY_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            store,
            db_max_connections,
            db_acquire_timeout,
            log_level,
            cors_allowed_origin,
            bubble_scheduler_enabled,
            bubble_decay_interval: Duration::from_secs(interval_secs),
        })
    }
}

/// Parses `key` when set, otherwise parses `default`.
fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_with_postgres_url() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/tsundoku")]).unwrap();
        assert_eq!(config.bind_address.port(), 5000);
        assert_eq!(
            config.store,
            StoreBackend::Postgres {
                database_url: "postgres://localhost/tsundoku".to_string()
            }
        );
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.bubble_scheduler_enabled);
        assert_eq!(config.bubble_decay_interval, Duration::from_secs(86_400));
    }

    #[test]
    fn postgres_requires_database_url() {
        let err = config_from(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(var) if var == "DATABASE_URL"));
    }

    #[test]
    fn memory_backend_needs_no_database() {
        let config = config_from(&[
            ("STORE_BACKEND", "memory"),
            ("BUBBLE_SCHEDULER_ENABLED", "false"),
            ("BUBBLE_DECAY_INTERVAL_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
        assert!(!config.bubble_scheduler_enabled);
        assert_eq!(config.bubble_decay_interval, Duration::from_secs(60));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config_from(&[("STORE_BACKEND", "mysql")]).is_err());
        assert!(config_from(&[("STORE_BACKEND", "memory"), ("BIND_ADDRESS", "nowhere")]).is_err());
        assert!(config_from(&[("STORE_BACKEND", "memory"), ("BUBBLE_DECAY_INTERVAL_SECS", "0")]).is_err());
        assert!(config_from(&[("STORE_BACKEND", "memory"), ("RUST_LOG", "chatty")]).is_err());
    }
}
