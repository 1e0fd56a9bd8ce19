//! Sliding-window rate limiting over the atomic counter store.
//!
//! Every authentication attempt is counted against two independent keys: the
//! source IP and the claimed identity. Rate limiting is advisory protection,
//! not a correctness guarantee, so every counter-store failure fails open -
//! an unreachable Redis must never lock every user out.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::store::CounterStore;

/// The two counter families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitKey {
    /// Keyed by the connecting client's source address.
    Ip(IpAddr),
    /// Keyed by the claimed (or resolved account) identity.
    Identity(String),
}

impl RateLimitKey {
    /// Storage key in the counter store.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::Ip(addr) => format!("ip:{addr}"),
            Self::Identity(id) => format!("identity:{id}"),
        }
    }
}

/// Result of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Under the threshold; proceed.
    Allowed,
    /// Over the threshold.
    Limited {
        /// How long until the window opens again.
        retry_after: Duration,
    },
}

/// Two-counter sliding rate limiter.
///
/// Construction takes an explicit [`RateLimitConfig`]; the limiter holds no
/// ambient or process-global state.
#[derive(Clone)]
pub struct RateLimiter {
    counters: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a rate limiter over a counter store.
    pub fn new(counters: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { counters, config }
    }

    const fn limit_for(&self, key: &RateLimitKey) -> i64 {
        match key {
            RateLimitKey::Ip(_) => self.config.ip_limit,
            RateLimitKey::Identity(_) => self.config.identity_limit,
        }
    }

    const fn window_for(&self, key: &RateLimitKey) -> Duration {
        match key {
            RateLimitKey::Ip(_) => self.config.ip_window,
            RateLimitKey::Identity(_) => self.config.identity_window,
        }
    }

    /// Probe mode: count this attempt and check the threshold.
    ///
    /// Called before any account lookup. One increment per call; the counter
    /// store's atomic increment-with-expiry keeps concurrent attempts from
    /// under-counting.
    pub async fn probe(&self, key: &RateLimitKey) -> Probe {
        if !self.config.enabled {
            return Probe::Allowed;
        }

        let storage_key = key.storage_key();
        match self
            .counters
            .incr_with_expiry(&storage_key, self.window_for(key))
            .await
        {
            Ok(sample) if sample.count <= self.limit_for(key) => Probe::Allowed,
            Ok(sample) => {
                debug!(key = %storage_key, count = sample.count, "rate limit exceeded");
                Probe::Limited {
                    retry_after: Duration::from_secs(sample.ttl_secs.max(0).unsigned_abs()),
                }
            }
            Err(err) => {
                warn!(key = %storage_key, error = %err, "counter store failed, rate limiting fails open");
                Probe::Allowed
            }
        }
    }

    /// Enforce mode: charge one unit after a confirmed failure.
    ///
    /// A non-positive TTL means the key's expiry lapsed concurrently (clock
    /// or replication skew); the stale key is deleted so the window restarts
    /// cleanly on the next attempt.
    pub async fn enforce(&self, key: &RateLimitKey) {
        if !self.config.enabled {
            return;
        }

        let storage_key = key.storage_key();
        match self
            .counters
            .incr_with_expiry(&storage_key, self.window_for(key))
            .await
        {
            Ok(sample) if sample.ttl_secs <= 0 => {
                if let Err(err) = self.counters.delete(&storage_key).await {
                    warn!(key = %storage_key, error = %err, "failed to reap stale counter");
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(key = %storage_key, error = %err, "counter store failed, rate limiting fails open");
            }
        }
    }

    /// Release: restore the full budget after a successful authentication.
    ///
    /// Only identity counters are released; IP counters expire naturally so
    /// many successes from one IP do not erase the evidence that many
    /// identities were tried there.
    pub async fn release(&self, key: &RateLimitKey) {
        if !self.config.enabled {
            return;
        }
        if matches!(key, RateLimitKey::Ip(_)) {
            return;
        }

        let storage_key = key.storage_key();
        if let Err(err) = self.counters.delete(&storage_key).await {
            warn!(key = %storage_key, error = %err, "failed to release counter");
        }
    }
}
