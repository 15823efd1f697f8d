//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::net::SocketAddr;
use std::time::Duration;
use tourney::db::{DatabaseConfig, RetryPolicy};

/// Default HTTP bind address
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Default prefix all API routes are mounted under
pub const DEFAULT_API_PATH: &str = "/tournament/v0";

/// Which store backs the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Route prefix, e.g. `/tournament/v0`
    pub api_path: String,
    /// Store backend
    pub backend: StoreBackend,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Startup connection retries
    pub retry: RetryPolicy,
    /// Upper bound for one unit of work
    pub transaction_timeout: Duration,
    /// Prometheus scrape address, if metrics are enabled
    pub metrics_bind: Option<SocketAddr>,
}

/// Values given on the command line, taking precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bind: Option<SocketAddr>,
    pub database_url: Option<String>,
    pub api_path: Option<String>,
    pub memory: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `overrides` - Values from CLI args
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but cannot be parsed
    pub fn from_env(overrides: Overrides) -> Result<Self, ConfigError> {
        let bind = match overrides.bind {
            Some(bind) => bind,
            None => parse_env_required("SERVER_BIND", DEFAULT_BIND)?,
        };

        let api_path = overrides
            .api_path
            .or_else(|| std::env::var("API_PATH").ok())
            .unwrap_or_else(|| DEFAULT_API_PATH.to_string());

        let mut database = DatabaseConfig::from_env();
        if let Some(database_url) = overrides.database_url {
            database.database_url = database_url;
        }

        let backend = if overrides.memory || parse_env_or("MEMORY_STORE", false) {
            StoreBackend::Memory
        } else {
            StoreBackend::Postgres
        };

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            attempts: parse_env_or("CONNECT_ATTEMPTS", defaults.attempts),
            interval: Duration::from_secs(parse_env_or(
                "CONNECT_INTERVAL_SECS",
                defaults.interval.as_secs(),
            )),
        };

        let transaction_timeout = Duration::from_secs(parse_env_or(
            "TRANSACTION_TIMEOUT_SECS",
            tourney::db::timeouts::DEFAULT_TRANSACTION_TIMEOUT.as_secs(),
        ));

        let metrics_bind = match std::env::var("METRICS_BIND") {
            Ok(value) => Some(value.parse().map_err(|_| ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("'{}' is not a socket address", value),
            })?),
            Err(_) => None,
        };

        Ok(ServerConfig {
            bind,
            api_path,
            backend,
            database,
            retry,
            transaction_timeout,
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.api_path.starts_with('/') || self.api_path.len() < 2 || self.api_path.ends_with('/')
        {
            return Err(ConfigError::Invalid {
                var: "API_PATH".to_string(),
                reason: "Must start with '/' and must not end with '/'".to_string(),
            });
        }

        if self.backend == StoreBackend::Postgres && self.database.database_url.is_empty() {
            return Err(ConfigError::MissingRequired {
                var: "DATABASE_URL".to_string(),
                hint: "Pass --db-url or run with --memory".to_string(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        if self.retry.attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "CONNECT_ATTEMPTS".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if self.transaction_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "TRANSACTION_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse an environment variable, failing loudly if it is set but malformed
fn parse_env_required<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|_| ConfigError::Invalid {
        var: key.to_string(),
        reason: format!("Cannot parse '{}'", value),
    })
}
