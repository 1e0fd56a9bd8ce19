//! Authentication orchestration.
//!
//! [`AuthService::authenticate`] runs the full state machine: rate-limit
//! probe, account lookup, implicit provisioning on first identity proof,
//! status and scope checks, replay-protected signature verification, and the
//! final commit. Credential failures of every kind collapse to `Ok(None)` so
//! callers can never distinguish an unknown identity from a bad signature.
//!
//! Every store call inside one pass is individually bounded by the
//! repository timeout; the pass itself carries no overall deadline, so
//! front-ends should wrap the call in their own connection deadline.

mod error;

pub use error::AuthError;

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use mailcove_core::{AuthScope, ChainAddress, ChainKind, EmailAddress, IdentityKind, UserId};

use crate::chain::{IdentityResolver, IdentityVerifier};
use crate::db::RepositoryError;
use crate::models::{AuditAction, AuditResult, ChainAuth, NewUser, User};
use crate::services::audit::{AuditEvent, AuditLogger};
use crate::services::rate_limit::{Probe, RateLimitKey, RateLimiter};
use crate::services::normalize_identity;
use crate::store::{AddressStore, Projection, UserStore};

/// One authentication attempt as collected by a protocol front-end.
#[derive(Debug, Clone)]
pub struct AuthRequest<'a> {
    /// The claimed identity: account id, literal address, chain address, or
    /// chain name.
    pub identity: &'a str,
    /// Signature proving control of the identity.
    pub signature: Option<&'a str>,
    /// Requested access scope.
    pub scope: AuthScope,
    /// Single-use challenge the signature covers.
    pub nonce: Option<&'a str>,
    /// Source IP of the connecting client.
    pub ip: Option<IpAddr>,
    /// Front-end session identifier, carried into the audit trail.
    pub session_id: Option<&'a str>,
}

/// A granted, scoped session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSuccess {
    /// The authenticated account.
    pub user_id: UserId,
    /// Display username of the account.
    pub username: String,
    /// The scope the session is restricted to.
    pub scope: AuthScope,
}

/// Result of a pre-authentication check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreAuthInfo {
    /// The account.
    pub user_id: UserId,
    /// Display username of the account.
    pub username: String,
    /// The scope that was checked.
    pub scope: AuthScope,
    /// Which chain auth method is configured, for client UX.
    pub chain_auth: Option<ChainKind>,
}

/// The authentication orchestrator.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    addresses: Arc<dyn AddressStore>,
    verifier: Arc<dyn IdentityVerifier>,
    names: Arc<dyn IdentityResolver>,
    rate_limiter: RateLimiter,
    audit: AuditLogger,
}

impl AuthService {
    /// Assemble the orchestrator from its collaborators.
    pub fn new(
        users: Arc<dyn UserStore>,
        addresses: Arc<dyn AddressStore>,
        verifier: Arc<dyn IdentityVerifier>,
        names: Arc<dyn IdentityResolver>,
        rate_limiter: RateLimiter,
        audit: AuditLogger,
    ) -> Self {
        Self {
            users,
            addresses,
            verifier,
            names,
            rate_limiter,
            audit,
        }
    }

    /// Authenticate a claimed identity for a scope.
    ///
    /// Returns `Ok(Some(_))` on success and `Ok(None)` on any credential
    /// failure - unknown identity, bad signature, and nonce replay are
    /// deliberately indistinguishable to the caller.
    ///
    /// # Errors
    ///
    /// [`AuthError::RateLimited`] when over the attempt threshold,
    /// [`AuthError::ScopeDisabled`] when the account may not use the scope,
    /// [`AuthError::AccountExists`] when a concurrent provisioning attempt
    /// won the insert, and [`AuthError::Repository`] on store failure.
    pub async fn authenticate(
        &self,
        request: AuthRequest<'_>,
    ) -> Result<Option<AuthSuccess>, AuthError> {
        // Missing credentials are a normal negative, not an error, and are
        // not worth a rate-limit unit.
        let (Some(signature), Some(nonce)) = (request.signature, request.nonce) else {
            self.audit_attempt(&request, None, AuditResult::Fail, "missing signature or nonce")
                .await;
            return Ok(None);
        };

        let normalized = normalize_identity(request.identity);
        let identity_key = RateLimitKey::Identity(normalized.clone());

        // RATE_CHECK: both counters are charged by the probe itself.
        if let Some(ip) = request.ip
            && let Probe::Limited { retry_after } =
                self.rate_limiter.probe(&RateLimitKey::Ip(ip)).await
        {
            return Err(AuthError::RateLimited { retry_after });
        }
        if let Probe::Limited { retry_after } = self.rate_limiter.probe(&identity_key).await {
            return Err(AuthError::RateLimited { retry_after });
        }

        // LOOKUP, then PROVISION for first-seen chain identities.
        let mut provisioned = false;
        let user = match self.lookup_user(request.identity, &normalized).await? {
            Some(user) => user,
            None => match self.provision(&request, signature, nonce).await? {
                Some(user) => {
                    provisioned = true;
                    user
                }
                None => {
                    self.reject(&request, &identity_key, None, "unknown user")
                        .await;
                    return Ok(None);
                }
            },
        };

        let account_key = RateLimitKey::Identity(user.username_normalized.clone());

        // STATUS_CHECK: charged against the confirmed account.
        if user.disabled || user.suspended {
            let detail = if user.disabled {
                "account disabled"
            } else {
                "account suspended"
            };
            self.reject(&request, &account_key, Some(user.id), detail)
                .await;
            return Ok(None);
        }

        // SCOPE_CHECK: a policy violation, surfaced as a typed error.
        if user.scope_disabled(request.scope) {
            self.reject(&request, &account_key, Some(user.id), "scope disabled")
                .await;
            return Err(AuthError::ScopeDisabled {
                scope: request.scope,
            });
        }

        // VERIFY.
        let Some(auth) = user.chain_auth.as_ref() else {
            self.reject(
                &request,
                &account_key,
                Some(user.id),
                "no chain auth configured",
            )
            .await;
            return Ok(None);
        };

        // An account provisioned in this very call already proved control of
        // this nonce; a second verifier round would prove nothing more.
        let already_proven = provisioned && auth.last_nonce.as_deref() == Some(nonce);

        if !already_proven {
            if auth.last_nonce.as_deref() == Some(nonce) {
                // Single-use nonces must never re-validate.
                self.reject(&request, &account_key, Some(user.id), "nonce replay")
                    .await;
                return Ok(None);
            }

            let Some(chain_address) = ChainAddress::parse(&auth.address) else {
                return Err(AuthError::Repository(RepositoryError::DataCorruption(
                    format!("unparseable chain address for user {}", user.id),
                )));
            };

            match self.verifier.verify(&chain_address, signature, None).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(user_id = %user.id, "signature mismatch");
                    self.reject(&request, &account_key, Some(user.id), "signature mismatch")
                        .await;
                    return Ok(None);
                }
                Err(err) => {
                    // Same caller-visible outcome as a mismatch; the cause
                    // is kept for diagnostics only.
                    warn!(user_id = %user.id, error = %err, "identity verifier failed");
                    self.reject(&request, &account_key, Some(user.id), "verifier error")
                        .await;
                    return Ok(None);
                }
            }
        }

        // COMMIT.
        if !already_proven {
            self.users.record_auth(user.id, nonce, Utc::now()).await?;
        }
        self.rate_limiter.release(&account_key).await;
        if identity_key != account_key {
            self.rate_limiter.release(&identity_key).await;
        }
        self.audit_attempt(&request, Some(user.id), AuditResult::Success, "authenticated")
            .await;
        info!(user_id = %user.id, scope = %request.scope, "authentication succeeded");

        Ok(Some(AuthSuccess {
            user_id: user.id,
            username: user.username,
            scope: request.scope,
        }))
    }

    /// Status and scope checks without credential verification.
    ///
    /// Used when proof was already established upstream (e.g. a prior
    /// session token). No rate limiting is applied. The result reports which
    /// chain auth method the account has configured.
    ///
    /// # Errors
    ///
    /// [`AuthError::ScopeDisabled`] when the account may not use the scope;
    /// [`AuthError::Repository`] on store failure.
    pub async fn pre_auth(
        &self,
        identity: &str,
        scope: AuthScope,
    ) -> Result<Option<PreAuthInfo>, AuthError> {
        let normalized = normalize_identity(identity);
        let Some(user) = self.lookup_user(identity, &normalized).await? else {
            self.audit_pre_auth(None, scope, AuditResult::Fail, "unknown user")
                .await;
            return Ok(None);
        };

        if user.disabled || user.suspended {
            self.audit_pre_auth(Some(user.id), scope, AuditResult::Fail, "account unavailable")
                .await;
            return Ok(None);
        }

        if user.scope_disabled(scope) {
            self.audit_pre_auth(Some(user.id), scope, AuditResult::Fail, "scope disabled")
                .await;
            return Err(AuthError::ScopeDisabled { scope });
        }

        self.audit_pre_auth(Some(user.id), scope, AuditResult::Success, "pre-auth ok")
            .await;

        Ok(Some(PreAuthInfo {
            user_id: user.id,
            username: user.username,
            scope,
            chain_auth: user.chain_auth.map(|a| a.kind),
        }))
    }

    /// Direct account lookup: by id, by address equality, by normalized
    /// username. Never the wildcard resolution algorithm.
    async fn lookup_user(
        &self,
        identity: &str,
        normalized: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let identity = identity.trim();

        if !identity.is_empty()
            && identity.chars().all(|c| c.is_ascii_digit())
            && let Ok(id) = identity.parse::<i64>()
            && let Some(user) = self
                .users
                .get_by_id(UserId::new(id), Projection::Full)
                .await?
        {
            return Ok(Some(user));
        }

        if identity.contains('@')
            && let Ok(addr) = EmailAddress::parse(identity)
            && let Some(record) = self.addresses.get_by_addrview(&addr.addrview()).await?
            && let Some(user_id) = record.user_id
        {
            return self.users.get_by_id(user_id, Projection::Full).await;
        }

        self.users
            .get_by_identity(normalized, Projection::Full)
            .await
    }

    /// Provision an account from a first-seen chain identity.
    ///
    /// Returns `Ok(None)` when the identity is not provisionable or the
    /// proof fails; the caller folds that into the generic rejection.
    async fn provision(
        &self,
        request: &AuthRequest<'_>,
        signature: &str,
        nonce: &str,
    ) -> Result<Option<User>, AuthError> {
        let Some(kind) = IdentityKind::classify(request.identity) else {
            return Ok(None);
        };

        let canonical = match &kind {
            IdentityKind::Direct(addr) => *addr,
            IdentityKind::Name { kind: name_kind, name } => {
                match self.names.resolve_owner(*name_kind, name).await {
                    Ok(Some(addr)) => addr,
                    Ok(None) => {
                        debug!(identity = %kind, "chain name has no owner");
                        return Ok(None);
                    }
                    Err(err) => {
                        warn!(identity = %kind, error = %err, "name resolver failed");
                        return Ok(None);
                    }
                }
            }
        };

        // First contact: there is no pre-shared message, so any signature
        // validly produced by the claimed address over the supplied nonce
        // proves control.
        match self.verifier.verify(&canonical, signature, Some(nonce)).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(identity = %kind, "provisioning proof rejected");
                return Ok(None);
            }
            Err(err) => {
                warn!(identity = %kind, error = %err, "identity verifier failed");
                return Ok(None);
            }
        }

        let username = request.identity.trim().to_owned();
        let user = self
            .users
            .insert(NewUser {
                username: username.clone(),
                username_normalized: kind.to_string(),
                name: username,
                language: None,
                chain_auth: Some(ChainAuth {
                    kind: canonical.kind(),
                    address: canonical.to_string(),
                    last_nonce: Some(nonce.to_owned()),
                    last_auth: Some(Utc::now()),
                }),
            })
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict(_) => AuthError::AccountExists,
                other => AuthError::Repository(other),
            })?;

        info!(user_id = %user.id, identity = %kind, "provisioned account on first proof");
        self.audit
            .log(AuditEvent {
                user_id: Some(user.id),
                action: AuditAction::Provision,
                result: AuditResult::Success,
                scope: Some(request.scope),
                source_ip: request.ip,
                session_id: request.session_id,
                detail: Some(format!("bound to {canonical}")),
            })
            .await;

        Ok(Some(user))
    }

    /// Charge one rate-limit unit and record the failed attempt.
    async fn reject(
        &self,
        request: &AuthRequest<'_>,
        key: &RateLimitKey,
        user_id: Option<UserId>,
        detail: &str,
    ) {
        self.rate_limiter.enforce(key).await;
        self.audit_attempt(request, user_id, AuditResult::Fail, detail)
            .await;
    }

    async fn audit_attempt(
        &self,
        request: &AuthRequest<'_>,
        user_id: Option<UserId>,
        result: AuditResult,
        detail: &str,
    ) {
        self.audit
            .log(AuditEvent {
                user_id,
                action: AuditAction::Authenticate,
                result,
                scope: Some(request.scope),
                source_ip: request.ip,
                session_id: request.session_id,
                detail: Some(detail.to_owned()),
            })
            .await;
    }

    async fn audit_pre_auth(
        &self,
        user_id: Option<UserId>,
        scope: AuthScope,
        result: AuditResult,
        detail: &str,
    ) {
        self.audit
            .log(AuditEvent {
                user_id,
                action: AuditAction::PreAuth,
                result,
                scope: Some(scope),
                source_ip: None,
                session_id: None,
                detail: Some(detail.to_owned()),
            })
            .await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use mailcove_core::NameKind;

    use super::*;
    use crate::chain::{NameResolverError, VerifierError};
    use crate::config::RateLimitConfig;
    use crate::models::NewAddress;
    use crate::store::memory::{
        MemoryAddressStore, MemoryAuditSink, MemoryCounterStore, MemoryUserStore,
    };

    const EVM: &str = "0x52908400098527886e0f7030069857d2e4169ee7";

    #[derive(Clone, Copy)]
    enum VerifierBehavior {
        AcceptAll,
        RejectAll,
        Unreachable,
    }

    struct MockVerifier {
        behavior: Mutex<VerifierBehavior>,
        calls: AtomicUsize,
    }

    impl MockVerifier {
        fn new(behavior: VerifierBehavior) -> Self {
            Self {
                behavior: Mutex::new(behavior),
                calls: AtomicUsize::new(0),
            }
        }

        fn set_behavior(&self, behavior: VerifierBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityVerifier for MockVerifier {
        async fn verify(
            &self,
            _address: &ChainAddress,
            _signature: &str,
            _nonce: Option<&str>,
        ) -> Result<bool, VerifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match *self.behavior.lock().unwrap() {
                VerifierBehavior::AcceptAll => Ok(true),
                VerifierBehavior::RejectAll => Ok(false),
                VerifierBehavior::Unreachable => {
                    Err(VerifierError::Unreachable("connection refused".into()))
                }
            }
        }
    }

    struct NoNames;

    #[async_trait]
    impl IdentityResolver for NoNames {
        async fn resolve_owner(
            &self,
            _kind: NameKind,
            _name: &str,
        ) -> Result<Option<ChainAddress>, NameResolverError> {
            Ok(None)
        }
    }

    struct Harness {
        users: Arc<MemoryUserStore>,
        addresses: Arc<MemoryAddressStore>,
        counters: Arc<MemoryCounterStore>,
        audit: Arc<MemoryAuditSink>,
        verifier: Arc<MockVerifier>,
        service: AuthService,
    }

    fn harness(identity_limit: i64) -> Harness {
        let users = Arc::new(MemoryUserStore::new());
        let addresses = Arc::new(MemoryAddressStore::new());
        let counters = Arc::new(MemoryCounterStore::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let verifier = Arc::new(MockVerifier::new(VerifierBehavior::AcceptAll));

        let service = AuthService::new(
            Arc::clone(&users) as Arc<dyn UserStore>,
            Arc::clone(&addresses) as Arc<dyn AddressStore>,
            Arc::clone(&verifier) as Arc<dyn IdentityVerifier>,
            Arc::new(NoNames),
            RateLimiter::new(
                Arc::clone(&counters) as Arc<dyn crate::store::CounterStore>,
                RateLimitConfig {
                    enabled: true,
                    ip_limit: 100,
                    ip_window: Duration::from_secs(60),
                    identity_limit,
                    identity_window: Duration::from_secs(60),
                },
            ),
            AuditLogger::new(Arc::clone(&audit) as Arc<dyn crate::store::AuditSink>, None),
        );

        Harness {
            users,
            addresses,
            counters,
            audit,
            verifier,
            service,
        }
    }

    fn request<'a>(identity: &'a str, signature: &'a str, nonce: &'a str) -> AuthRequest<'a> {
        AuthRequest {
            identity,
            signature: Some(signature),
            scope: AuthScope::Master,
            nonce: Some(nonce),
            ip: Some("192.0.2.1".parse().unwrap()),
            session_id: Some("session-1"),
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_is_plain_negative() {
        let h = harness(10);

        let result = h
            .service
            .authenticate(AuthRequest {
                identity: EVM,
                signature: None,
                scope: AuthScope::Master,
                nonce: None,
                ip: None,
                session_id: None,
            })
            .await
            .unwrap();

        assert!(result.is_none());
        // No rate-limit unit consumed before RATE_CHECK.
        assert_eq!(h.counters.count(&format!("identity:{EVM}")), None);
        let records = h.audit.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records.first().unwrap().result, AuditResult::Fail);
    }

    #[tokio::test]
    async fn test_first_proof_provisions_exactly_one_account() {
        let h = harness(10);

        let success = h
            .service
            .authenticate(request(EVM, "valid-sig", "n1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(success.scope, AuthScope::Master);
        assert_eq!(success.username, EVM);
        assert_eq!(h.users.len(), 1);
        // Provisioning proof is the only verifier round.
        assert_eq!(h.verifier.calls(), 1);

        let user = h
            .users
            .get_by_identity(EVM, Projection::Full)
            .await
            .unwrap()
            .unwrap();
        let auth = user.chain_auth.unwrap();
        assert_eq!(auth.last_nonce.as_deref(), Some("n1"));
        assert!(auth.last_auth.is_some());
    }

    #[tokio::test]
    async fn test_identical_triple_fails_on_second_attempt() {
        let h = harness(10);

        let first = h
            .service
            .authenticate(request(EVM, "valid-sig", "n1"))
            .await
            .unwrap();
        assert!(first.is_some());

        let second = h
            .service
            .authenticate(request(EVM, "valid-sig", "n1"))
            .await
            .unwrap();
        assert!(second.is_none(), "nonce replay must not re-validate");
    }

    #[tokio::test]
    async fn test_fresh_nonce_verifies_against_chain() {
        let h = harness(10);
        h.service
            .authenticate(request(EVM, "valid-sig", "n1"))
            .await
            .unwrap()
            .unwrap();

        let success = h
            .service
            .authenticate(request(EVM, "valid-sig-2", "n2"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(success.username, EVM);
        // One provisioning round plus one re-verification round.
        assert_eq!(h.verifier.calls(), 2);
        let user = h
            .users
            .get_by_identity(EVM, Projection::Full)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.chain_auth.unwrap().last_nonce.as_deref(), Some("n2"));
    }

    #[tokio::test]
    async fn test_bad_signature_and_unknown_user_look_identical() {
        let h = harness(10);
        h.service
            .authenticate(request(EVM, "valid-sig", "n1"))
            .await
            .unwrap()
            .unwrap();
        h.verifier.set_behavior(VerifierBehavior::RejectAll);

        let bad_signature = h
            .service
            .authenticate(request(EVM, "forged", "n2"))
            .await
            .unwrap();
        let unknown_user = h
            .service
            .authenticate(request("ghost.eth", "sig", "n3"))
            .await
            .unwrap();

        assert!(bad_signature.is_none());
        assert!(unknown_user.is_none());
    }

    #[tokio::test]
    async fn test_verifier_outage_is_a_plain_rejection() {
        let h = harness(10);
        h.service
            .authenticate(request(EVM, "valid-sig", "n1"))
            .await
            .unwrap()
            .unwrap();
        h.verifier.set_behavior(VerifierBehavior::Unreachable);

        let result = h
            .service
            .authenticate(request(EVM, "valid-sig", "n2"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_disabled_account_rejected_and_charged() {
        let h = harness(10);
        h.service
            .authenticate(request(EVM, "valid-sig", "n1"))
            .await
            .unwrap()
            .unwrap();
        let user = h
            .users
            .get_by_identity(EVM, Projection::Full)
            .await
            .unwrap()
            .unwrap();
        h.users.set_status(user.id, true, false);

        let result = h
            .service
            .authenticate(request(EVM, "valid-sig", "n2"))
            .await
            .unwrap();

        assert!(result.is_none());
        // Probe unit plus the enforce charge against the account.
        assert_eq!(h.counters.count(&format!("identity:{EVM}")), Some(2));
    }

    #[tokio::test]
    async fn test_disabled_scope_is_a_policy_error() {
        let h = harness(10);
        h.service
            .authenticate(request(EVM, "valid-sig", "n1"))
            .await
            .unwrap()
            .unwrap();
        let user = h
            .users
            .get_by_identity(EVM, Projection::Full)
            .await
            .unwrap()
            .unwrap();
        h.users.set_disabled_scopes(user.id, vec![AuthScope::Imap]);

        let err = h
            .service
            .authenticate(AuthRequest {
                scope: AuthScope::Imap,
                ..request(EVM, "valid-sig", "n2")
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AuthError::ScopeDisabled {
                scope: AuthScope::Imap
            }
        ));
        assert_eq!(err.code(), "scope_disabled");
    }

    #[tokio::test]
    async fn test_rate_limit_trips_and_reports_retry_after() {
        let h = harness(2);
        h.verifier.set_behavior(VerifierBehavior::RejectAll);

        // Each failed attempt consumes a probe unit and an enforce unit.
        let first = h
            .service
            .authenticate(request(EVM, "forged", "n1"))
            .await
            .unwrap();
        assert!(first.is_none());

        let err = h
            .service
            .authenticate(request(EVM, "forged", "n2"))
            .await
            .unwrap_err();
        match err {
            AuthError::RateLimited { retry_after } => {
                assert!(retry_after <= Duration::from_secs(60));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_releases_identity_counter() {
        let h = harness(5);
        h.verifier.set_behavior(VerifierBehavior::RejectAll);
        h.service
            .authenticate(request(EVM, "forged", "n0"))
            .await
            .unwrap();
        assert!(h.counters.count(&format!("identity:{EVM}")).is_some());

        h.verifier.set_behavior(VerifierBehavior::AcceptAll);
        h.service
            .authenticate(request(EVM, "valid-sig", "n1"))
            .await
            .unwrap()
            .unwrap();

        // Full budget restored; the IP counter is left to expire naturally.
        assert_eq!(h.counters.count(&format!("identity:{EVM}")), None);
        assert!(h.counters.count("ip:192.0.2.1").is_some());
    }

    #[tokio::test]
    async fn test_counter_outage_does_not_block_authentication() {
        let h = harness(1);
        h.counters.set_unavailable(true);

        let success = h
            .service
            .authenticate(request(EVM, "valid-sig", "n1"))
            .await
            .unwrap();
        assert!(success.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_provision_maps_to_account_exists() {
        struct ConflictingUsers;

        #[async_trait]
        impl UserStore for ConflictingUsers {
            async fn get_by_id(
                &self,
                _id: UserId,
                _projection: Projection,
            ) -> Result<Option<User>, RepositoryError> {
                Ok(None)
            }

            async fn get_by_identity(
                &self,
                _normalized: &str,
                _projection: Projection,
            ) -> Result<Option<User>, RepositoryError> {
                // The concurrent winner is not yet visible to this reader.
                Ok(None)
            }

            async fn insert(&self, _user: NewUser) -> Result<User, RepositoryError> {
                Err(RepositoryError::Conflict("username already exists".into()))
            }

            async fn record_auth(
                &self,
                _id: UserId,
                _nonce: &str,
                _when: chrono::DateTime<Utc>,
            ) -> Result<(), RepositoryError> {
                Ok(())
            }
        }

        let h = harness(10);
        let service = AuthService::new(
            Arc::new(ConflictingUsers),
            Arc::clone(&h.addresses) as Arc<dyn AddressStore>,
            Arc::clone(&h.verifier) as Arc<dyn IdentityVerifier>,
            Arc::new(NoNames),
            RateLimiter::new(
                Arc::clone(&h.counters) as Arc<dyn crate::store::CounterStore>,
                RateLimitConfig::default(),
            ),
            AuditLogger::new(Arc::clone(&h.audit) as Arc<dyn crate::store::AuditSink>, None),
        );

        let err = service
            .authenticate(request(EVM, "valid-sig", "n1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountExists));
    }

    #[tokio::test]
    async fn test_lookup_by_account_address() {
        let h = harness(10);
        h.service
            .authenticate(request(EVM, "valid-sig", "n1"))
            .await
            .unwrap()
            .unwrap();
        let user = h
            .users
            .get_by_identity(EVM, Projection::Full)
            .await
            .unwrap()
            .unwrap();
        h.addresses
            .insert(NewAddress {
                address: "vanity@example.com".to_owned(),
                addrview: "vanity@example.com".to_owned(),
                user_id: Some(user.id),
                main: false,
                tags: Vec::new(),
            })
            .await
            .unwrap();

        let success = h
            .service
            .authenticate(request("Vanity@example.com", "valid-sig", "n2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(success.user_id, user.id);
    }

    #[tokio::test]
    async fn test_pre_auth_reports_chain_method_without_verification() {
        let h = harness(10);
        h.service
            .authenticate(request(EVM, "valid-sig", "n1"))
            .await
            .unwrap()
            .unwrap();
        let calls_before = h.verifier.calls();

        let info = h
            .service
            .pre_auth(EVM, AuthScope::Imap)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(info.chain_auth, Some(ChainKind::Evm));
        assert_eq!(info.scope, AuthScope::Imap);
        // No verifier round and no rate-limit traffic.
        assert_eq!(h.verifier.calls(), calls_before);

        let unknown = h.service.pre_auth("ghost.eth", AuthScope::Imap).await.unwrap();
        assert!(unknown.is_none());
    }
}
