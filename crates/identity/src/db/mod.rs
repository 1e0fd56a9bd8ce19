//! Database operations for the identity `PostgreSQL` store and the Redis
//! counter store.
//!
//! ## Tables
//!
//! - `users` - accounts, chain auth state, status flags
//! - `addresses` - routable addresses keyed by normalized `addrview`
//! - `domain_aliases` - alias domain to canonical domain mapping
//! - `audit_log` - append-only authentication attempt records
//!
//! Uniqueness invariants (normalized username, addrview, alias domain) are
//! enforced by unique indexes; repositories surface violations as
//! [`RepositoryError::Conflict`].
//!
//! Every query runs under a bounded execution timeout so a degraded store
//! turns into a typed error instead of a hung connection.

pub mod addresses;
pub mod audit;
pub mod counters;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::PgAddressStore;
pub use audit::PgAuditSink;
pub use counters::RedisCounterStore;
pub use users::PgUserStore;

/// Upper bound on a single store call.
pub(crate) const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique addrview).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The bounded execution timeout elapsed.
    #[error("query timed out")]
    Timeout,
}

impl RepositoryError {
    /// Map a sqlx error, turning unique-index violations into `Conflict`.
    pub(crate) fn from_query(err: sqlx::Error, what: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(format!("{what} already exists"))
            }
            _ => Self::Database(err),
        }
    }
}

/// Run a store future under [`QUERY_TIMEOUT`].
pub(crate) async fn with_timeout<T, F>(fut: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>> + Send,
{
    tokio::time::timeout(QUERY_TIMEOUT, fut)
        .await
        .map_err(|_elapsed| RepositoryError::Timeout)?
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply any pending schema migrations.
///
/// # Errors
///
/// Returns `sqlx::migrate::MigrateError` when a migration fails or the
/// recorded history diverges from the embedded set.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
