//! Identity core configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MAILCOVE_DATABASE_URL` - `PostgreSQL` connection string
//! - `MAILCOVE_REDIS_URL` - Redis connection string for rate-limit counters
//!
//! ## Optional
//! - `MAILCOVE_RATE_LIMIT_ENABLED` - enable rate limiting (default: true)
//! - `MAILCOVE_RATE_LIMIT_IP` - per-IP attempt threshold (default: 100)
//! - `MAILCOVE_RATE_LIMIT_IP_WINDOW` - per-IP window in seconds (default: 60)
//! - `MAILCOVE_RATE_LIMIT_IDENTITY` - per-identity threshold (default: 10)
//! - `MAILCOVE_RATE_LIMIT_IDENTITY_WINDOW` - per-identity window in seconds (default: 60)
//! - `MAILCOVE_AUDIT_RETENTION_DAYS` - audit record retention; unset keeps
//!   records indefinitely

use std::env;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Rate limiter construction parameters.
///
/// Injected explicitly at construction; the limiter never consults ambient
/// process state, so tests and embedders get deterministic behavior.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Master switch; `false` short-circuits every probe to success.
    pub enabled: bool,
    /// Attempts allowed per source IP inside `ip_window`.
    pub ip_limit: i64,
    /// Sliding window for the per-IP counter.
    pub ip_window: Duration,
    /// Attempts allowed per claimed identity inside `identity_window`.
    pub identity_limit: i64,
    /// Sliding window for the per-identity counter.
    pub identity_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ip_limit: 100,
            ip_window: Duration::from_secs(60),
            identity_limit: 10,
            identity_window: Duration::from_secs(60),
        }
    }
}

/// Identity core configuration.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// `PostgreSQL` connection URL (contains password).
    pub database_url: SecretString,
    /// Redis connection URL for the counter store.
    pub redis_url: SecretString,
    /// Rate limiter parameters.
    pub rate_limit: RateLimitConfig,
    /// Audit record retention; `None` keeps records indefinitely.
    pub audit_retention: Option<Duration>,
}

impl IdentityConfig {
    /// Load configuration from the environment.
    ///
    /// Reads a `.env` file first when one is present (development
    /// convenience; real deployments set variables directly).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a
    /// value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = SecretString::from(require_env("MAILCOVE_DATABASE_URL")?);
        let redis_url = SecretString::from(require_env("MAILCOVE_REDIS_URL")?);

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            enabled: optional_parsed("MAILCOVE_RATE_LIMIT_ENABLED")?.unwrap_or(defaults.enabled),
            ip_limit: optional_parsed("MAILCOVE_RATE_LIMIT_IP")?.unwrap_or(defaults.ip_limit),
            ip_window: optional_parsed("MAILCOVE_RATE_LIMIT_IP_WINDOW")?
                .map_or(defaults.ip_window, Duration::from_secs),
            identity_limit: optional_parsed("MAILCOVE_RATE_LIMIT_IDENTITY")?
                .unwrap_or(defaults.identity_limit),
            identity_window: optional_parsed("MAILCOVE_RATE_LIMIT_IDENTITY_WINDOW")?
                .map_or(defaults.identity_window, Duration::from_secs),
        };

        let audit_retention = optional_parsed::<u64>("MAILCOVE_AUDIT_RETENTION_DAYS")?
            .map(|days| Duration::from_secs(days * 24 * 60 * 60));

        Ok(Self {
            database_url,
            redis_url,
            rate_limit,
            audit_retention,
        })
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_owned()))
}

fn optional_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar(name.to_owned(), e.to_string())),
        Err(_) => Ok(None),
    }
}
