//! In-memory store implementations.
//!
//! Used by the test suites and by embedders that want the routing and
//! authentication core without external infrastructure. Semantics follow the
//! production implementations closely enough for the orchestration logic to
//! be exercised faithfully: uniqueness conflicts, counter TTLs, and
//! simulated outages are all represented.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use mailcove_core::{AddressId, UserId};

use crate::db::RepositoryError;
use crate::models::{Address, AuditRecord, DomainAlias, NewAddress, NewUser, User};

use super::{
    AddressStore, AuditSink, CounterError, CounterSample, CounterStore, Projection, UserStore,
};

// =============================================================================
// Users
// =============================================================================

#[derive(Default)]
struct UserState {
    users: Vec<User>,
    next_id: i64,
}

/// In-memory [`UserStore`].
#[derive(Default)]
pub struct MemoryUserStore {
    state: Mutex<UserState>,
}

impl MemoryUserStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a fully-formed user, bypassing uniqueness checks.
    pub fn seed(&self, user: User) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.next_id = state.next_id.max(user.id.as_i64());
        state.users.push(user);
    }

    /// Flip the disabled/suspended flags on a seeded user.
    pub fn set_status(&self, id: UserId, disabled: bool, suspended: bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(user) = state.users.iter_mut().find(|u| u.id == id) {
            user.disabled = disabled;
            user.suspended = suspended;
        }
    }

    /// Replace the disabled-scope list on a seeded user.
    pub fn set_disabled_scopes(&self, id: UserId, scopes: Vec<mailcove_core::AuthScope>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(user) = state.users.iter_mut().find(|u| u.id == id) {
            user.disabled_scopes = scopes;
        }
    }

    /// Number of stored users.
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.users.len()
    }

    /// Whether the store holds no users.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_by_id(
        &self,
        id: UserId,
        _projection: Projection,
    ) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_by_identity(
        &self,
        normalized: &str,
        _projection: Projection,
    ) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .users
            .iter()
            .find(|u| u.username_normalized == normalized)
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state
            .users
            .iter()
            .any(|u| u.username_normalized == user.username_normalized)
        {
            return Err(RepositoryError::Conflict(format!(
                "username already exists: {}",
                user.username_normalized
            )));
        }

        state.next_id += 1;
        let created = User {
            id: UserId::new(state.next_id),
            username: user.username,
            username_normalized: user.username_normalized,
            name: user.name,
            language: user.language,
            quota_bytes: 0,
            max_connections: 0,
            disabled: false,
            suspended: false,
            disabled_scopes: Vec::new(),
            chain_auth: user.chain_auth,
            created_at: Utc::now(),
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn record_auth(
        &self,
        id: UserId,
        nonce: &str,
        when: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepositoryError::NotFound)?;
        let auth = user
            .chain_auth
            .as_mut()
            .ok_or_else(|| RepositoryError::DataCorruption("user has no chain auth".into()))?;
        auth.last_nonce = Some(nonce.to_owned());
        auth.last_auth = Some(when);
        Ok(())
    }
}

// =============================================================================
// Addresses
// =============================================================================

#[derive(Default)]
struct AddressState {
    addresses: Vec<Address>,
    aliases: Vec<DomainAlias>,
    next_id: i64,
}

/// In-memory [`AddressStore`].
#[derive(Default)]
pub struct MemoryAddressStore {
    state: Mutex<AddressState>,
}

impl MemoryAddressStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a fully-formed address record.
    pub fn seed(&self, address: Address) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.next_id = state.next_id.max(address.id.as_i64());
        state.addresses.push(address);
    }

    /// Seed a domain alias.
    pub fn seed_alias(&self, alias: DomainAlias) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.aliases.push(alias);
    }
}

#[async_trait]
impl AddressStore for MemoryAddressStore {
    async fn get_by_addrview(&self, addrview: &str) -> Result<Option<Address>, RepositoryError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .addresses
            .iter()
            .find(|a| a.addrview == addrview)
            .cloned())
    }

    async fn get_domain_alias(
        &self,
        alias: &str,
    ) -> Result<Option<DomainAlias>, RepositoryError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.aliases.iter().find(|a| a.alias == alias).cloned())
    }

    async fn find_by_addrviews(
        &self,
        patterns: &[String],
    ) -> Result<Vec<Address>, RepositoryError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state
            .addresses
            .iter()
            .filter(|a| patterns.iter().any(|p| *p == a.addrview))
            .cloned()
            .collect())
    }

    async fn insert(&self, address: NewAddress) -> Result<Address, RepositoryError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.addresses.iter().any(|a| a.addrview == address.addrview) {
            return Err(RepositoryError::Conflict(format!(
                "addrview already exists: {}",
                address.addrview
            )));
        }

        state.next_id += 1;
        let created = Address {
            id: AddressId::new(state.next_id),
            address: address.address,
            addrview: address.addrview,
            user_id: address.user_id,
            main: address.main,
            tags: address.tags,
            created_at: Utc::now(),
        };
        state.addresses.push(created.clone());
        Ok(created)
    }
}

// =============================================================================
// Counters
// =============================================================================

struct CounterEntry {
    count: i64,
    expires_at: Instant,
}

/// In-memory [`CounterStore`].
///
/// Keys are created with the window applied once and are reaped only on
/// [`CounterStore::delete`]; an entry whose TTL lapsed reports a
/// non-positive `ttl_secs`, which is exactly the skew condition the rate
/// limiter's enforce mode self-heals.
#[derive(Default)]
pub struct MemoryCounterStore {
    entries: Mutex<HashMap<String, CounterEntry>>,
    unavailable: AtomicBool,
}

impl MemoryCounterStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the counter store becoming unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Force a key's TTL into the past without touching its count.
    pub fn force_expire(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Instant::now() - Duration::from_secs(1);
        }
    }

    /// Current count for a key, if present.
    #[must_use]
    pub fn count(&self, key: &str) -> Option<i64> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).map(|e| e.count)
    }

    fn check_available(&self) -> Result<(), CounterError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CounterError::Unavailable("simulated outage".into()));
        }
        Ok(())
    }

    fn remaining_secs(entry: &CounterEntry) -> i64 {
        let now = Instant::now();
        if entry.expires_at > now {
            i64::try_from((entry.expires_at - now).as_secs()).unwrap_or(i64::MAX)
        } else {
            -i64::try_from((now - entry.expires_at).as_secs()).unwrap_or(i64::MAX)
        }
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr_with_expiry(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<CounterSample, CounterError> {
        self.check_available()?;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(key.to_owned()).or_insert(CounterEntry {
            count: 0,
            expires_at: Instant::now() + window,
        });
        entry.count += 1;
        Ok(CounterSample {
            count: entry.count,
            ttl_secs: Self::remaining_secs(entry),
        })
    }

    async fn ttl(&self, key: &str) -> Result<i64, CounterError> {
        self.check_available()?;
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).map_or(-2, Self::remaining_secs))
    }

    async fn delete(&self, key: &str) -> Result<(), CounterError> {
        self.check_available()?;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// Audit
// =============================================================================

/// In-memory [`AuditSink`] collecting records for inspection.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
    unavailable: AtomicBool,
}

impl MemoryAuditSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the audit store failing.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, record: AuditRecord) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Timeout);
        }
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.push(record);
        Ok(())
    }
}
