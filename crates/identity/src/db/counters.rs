//! Redis-backed counter store.

use std::time::Duration;

use async_trait::async_trait;
use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use crate::store::{CounterError, CounterSample, CounterStore};

/// Redis-backed [`CounterStore`].
///
/// Uses an atomic `INCR` + `EXPIRE NX` + `TTL` pipeline so the count and the
/// window start as one unit; concurrent attempts against the same key never
/// under-count.
#[derive(Clone)]
pub struct RedisCounterStore {
    manager: ConnectionManager,
}

impl RedisCounterStore {
    /// Connect to Redis and build the counter store.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::Unavailable`] if the connection cannot be
    /// established.
    pub async fn connect(url: &str) -> Result<Self, CounterError> {
        info!("connecting to redis counter store");

        let client =
            Client::open(url).map_err(|e| CounterError::Unavailable(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| CounterError::Unavailable(e.to_string()))?;

        info!("redis counter store connected");

        Ok(Self { manager })
    }

    /// Build a store over an already-established connection manager.
    #[must_use]
    pub const fn from_manager(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr_with_expiry(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<CounterSample, CounterError> {
        let mut conn = self.manager.clone();

        // EXPIRE NX only arms the window on a fresh key, so the window is
        // anchored to the first hit rather than sliding on every increment.
        let (count, _, ttl_secs): (i64, i64, i64) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("EXPIRE")
            .arg(key)
            .arg(window.as_secs())
            .arg("NX")
            .cmd("TTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CounterError::Unavailable(e.to_string()))?;

        Ok(CounterSample { count, ttl_secs })
    }

    async fn ttl(&self, key: &str) -> Result<i64, CounterError> {
        let mut conn = self.manager.clone();
        redis::cmd("TTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CounterError::Unavailable(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), CounterError> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CounterError::Unavailable(e.to_string()))
    }
}
