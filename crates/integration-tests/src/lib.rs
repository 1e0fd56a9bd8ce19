//! Integration tests for Mailcove.
//!
//! These suites exercise the identity stack in-process: the authentication
//! orchestrator and the address resolver wired over the in-memory stores,
//! with a deterministic signature verifier and a table-backed name resolver.
//! No external services are required.
//!
//! Run with: `cargo test -p mailcove-integration-tests`
//!
//! # Test Categories
//!
//! - `authentication` - full authenticate/pre-auth lifecycle
//! - `address_resolution` - routing precedence and provisioning

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use mailcove_core::{AuthScope, ChainAddress, NameKind};
use mailcove_identity::chain::{
    IdentityResolver, IdentityVerifier, NameResolverError, VerifierError,
};
use mailcove_identity::services::{AuditLogger, RateLimiter};
use mailcove_identity::store::memory::{
    MemoryAddressStore, MemoryAuditSink, MemoryCounterStore, MemoryUserStore,
};
use mailcove_identity::store::{AuditSink, CounterStore};
use mailcove_identity::{AddressResolver, AuthRequest, AuthService, RateLimitConfig};

/// The signature a test wallet for `address` produces over `nonce`.
#[must_use]
pub fn sign(address: &ChainAddress, nonce: &str) -> String {
    format!("{address}/{nonce}")
}

/// A well-formed EVM address derived from a small seed, for fixtures.
#[must_use]
pub fn evm_address(seed: u8) -> ChainAddress {
    ChainAddress::parse(&format!("0x{:040x}", u64::from(seed)))
        .expect("literal is a valid EVM address")
}

/// Verifier accepting exactly the signatures produced by [`sign`].
///
/// With a nonce it demands the full `address/nonce` form; without one it
/// only checks the signature came from the right wallet, mirroring how a
/// real verifier recovers the signer but cannot see the client's challenge.
pub struct StaticVerifier;

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(
        &self,
        address: &ChainAddress,
        signature: &str,
        nonce: Option<&str>,
    ) -> Result<bool, VerifierError> {
        let prefix = format!("{address}/");
        Ok(match nonce {
            Some(nonce) => signature == format!("{prefix}{nonce}"),
            None => signature.starts_with(&prefix),
        })
    }
}

/// Name resolver over a fixed ownership table.
#[derive(Default)]
pub struct TableNames {
    owners: Mutex<HashMap<(NameKind, String), ChainAddress>>,
}

impl TableNames {
    /// Bind a name to its owning chain address.
    pub fn bind(&self, kind: NameKind, name: &str, owner: ChainAddress) {
        let mut owners = self.owners.lock().unwrap_or_else(|e| e.into_inner());
        owners.insert((kind, name.to_owned()), owner);
    }
}

#[async_trait]
impl IdentityResolver for TableNames {
    async fn resolve_owner(
        &self,
        kind: NameKind,
        name: &str,
    ) -> Result<Option<ChainAddress>, NameResolverError> {
        let owners = self.owners.lock().unwrap_or_else(|e| e.into_inner());
        Ok(owners.get(&(kind, name.to_owned())).copied())
    }
}

/// The identity stack assembled over in-memory backends.
pub struct TestContext {
    pub users: Arc<MemoryUserStore>,
    pub addresses: Arc<MemoryAddressStore>,
    pub counters: Arc<MemoryCounterStore>,
    pub audit: Arc<MemoryAuditSink>,
    pub names: Arc<TableNames>,
    pub auth: AuthService,
    pub resolver: AddressResolver,
}

impl TestContext {
    /// Context with the default rate-limit policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rate_limit(RateLimitConfig::default())
    }

    /// Context with an explicit rate-limit policy.
    #[must_use]
    pub fn with_rate_limit(config: RateLimitConfig) -> Self {
        init_tracing();
        let users = Arc::new(MemoryUserStore::new());
        let addresses = Arc::new(MemoryAddressStore::new());
        let counters = Arc::new(MemoryCounterStore::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let names = Arc::new(TableNames::default());

        let auth = AuthService::new(
            Arc::clone(&users) as _,
            Arc::clone(&addresses) as _,
            Arc::new(StaticVerifier),
            Arc::clone(&names) as Arc<dyn IdentityResolver>,
            RateLimiter::new(Arc::clone(&counters) as Arc<dyn CounterStore>, config),
            AuditLogger::new(Arc::clone(&audit) as Arc<dyn AuditSink>, None),
        );
        let resolver = AddressResolver::new(
            Arc::clone(&addresses) as _,
            Arc::clone(&users) as _,
            Arc::clone(&names) as Arc<dyn IdentityResolver>,
        );

        Self {
            users,
            addresses,
            counters,
            audit,
            names,
            auth,
            resolver,
        }
    }

    /// An [`AuthRequest`] with the fixture IP and session.
    #[must_use]
    pub fn request<'a>(
        &self,
        identity: &'a str,
        signature: &'a str,
        nonce: &'a str,
    ) -> AuthRequest<'a> {
        AuthRequest {
            identity,
            signature: Some(signature),
            scope: AuthScope::Master,
            nonce: Some(nonce),
            ip: Some(client_ip()),
            session_id: Some("itest-session"),
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture client address shared by the suites.
#[must_use]
pub fn client_ip() -> IpAddr {
    IpAddr::from([198, 51, 100, 7])
}

/// Install a test subscriber once, honoring `RUST_LOG`.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
