//! Async traits over the two backing stores.
//!
//! Production implementations live in [`crate::db`] (`PostgreSQL` for
//! accounts and audit, Redis for counters). [`memory`] holds in-process
//! implementations used by tests and by embedders that want the core without
//! external infrastructure.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use mailcove_core::UserId;

use crate::db::RepositoryError;
use crate::models::{Address, AuditRecord, DomainAlias, NewAddress, NewUser, User};

/// How much of a user record a lookup needs to materialize.
///
/// `Identity` skips quota and limit fields; it is what the resolver asks for
/// when routing mail, where only ownership and status matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    /// The full record.
    #[default]
    Full,
    /// Identity, status flags, and chain auth only.
    Identity,
}

/// Account lookups and uniqueness-enforcing inserts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Point lookup by user id.
    async fn get_by_id(
        &self,
        id: UserId,
        projection: Projection,
    ) -> Result<Option<User>, RepositoryError>;

    /// Point lookup by normalized username.
    async fn get_by_identity(
        &self,
        normalized: &str,
        projection: Projection,
    ) -> Result<Option<User>, RepositoryError>;

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Conflict`] when the normalized username is
    /// already taken; the caller maps this to its own duplicate-account
    /// failure class.
    async fn insert(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Persist a successful authentication: the consumed nonce and the time.
    async fn record_auth(
        &self,
        id: UserId,
        nonce: &str,
        when: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

/// Address and domain-alias lookups.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Exact addrview lookup.
    async fn get_by_addrview(&self, addrview: &str) -> Result<Option<Address>, RepositoryError>;

    /// Look up a domain alias by its alias domain.
    async fn get_domain_alias(&self, alias: &str)
    -> Result<Option<DomainAlias>, RepositoryError>;

    /// Fetch every address whose addrview is in `patterns`.
    async fn find_by_addrviews(&self, patterns: &[String])
    -> Result<Vec<Address>, RepositoryError>;

    /// Insert a new address record.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Conflict`] when the addrview is taken.
    async fn insert(&self, address: NewAddress) -> Result<Address, RepositoryError>;
}

/// Errors from the counter store.
///
/// There is only one failure class: the store could not be reached or
/// answered garbage. Rate limiting fails open on it.
#[derive(Debug, Error)]
pub enum CounterError {
    /// The counter store is unreachable or misbehaving.
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

/// One observation of a counter after an increment.
#[derive(Debug, Clone, Copy)]
pub struct CounterSample {
    /// Counter value after the increment.
    pub count: i64,
    /// Remaining lifetime in seconds. Zero or negative means the key's TTL
    /// lapsed concurrently (clock or replication skew).
    pub ttl_secs: i64,
}

/// Atomic increment-with-expiry counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key`, starting its expiry window when the key is new, and
    /// report the resulting count and remaining TTL. Increment and expiry
    /// are one atomic unit so concurrent callers never under-count.
    async fn incr_with_expiry(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<CounterSample, CounterError>;

    /// Remaining lifetime of `key` in seconds.
    async fn ttl(&self, key: &str) -> Result<i64, CounterError>;

    /// Remove `key` outright.
    async fn delete(&self, key: &str) -> Result<(), CounterError>;
}

/// Append-only audit sink.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one record. Callers treat failures as best-effort.
    async fn append(&self, record: AuditRecord) -> Result<(), RepositoryError>;
}
