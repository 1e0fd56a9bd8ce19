//! Authentication lifecycle tests over the assembled identity stack.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use mailcove_core::{AuthScope, ChainKind, NameKind};
use mailcove_identity::store::Projection;
use mailcove_identity::store::UserStore;
use mailcove_identity::{AuthError, AuthRequest, RateLimitConfig};

use mailcove_integration_tests::{TestContext, client_ip, evm_address, sign};

#[tokio::test]
async fn test_name_identity_lifecycle() {
    let ctx = TestContext::new();
    let wallet = evm_address(7);
    ctx.names.bind(NameKind::Ens, "alice.eth", wallet);

    // First contact provisions the account from the proof itself.
    let sig = sign(&wallet, "n1");
    let success = ctx
        .auth
        .authenticate(ctx.request("alice.eth", &sig, "n1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(success.username, "alice.eth");
    assert_eq!(ctx.users.len(), 1);

    // The identical triple must not validate a second time.
    let replay = ctx
        .auth
        .authenticate(ctx.request("alice.eth", &sig, "n1"))
        .await
        .unwrap();
    assert!(replay.is_none());

    // A fresh nonce goes through the verifier and succeeds.
    let sig2 = sign(&wallet, "n2");
    let again = ctx
        .auth
        .authenticate(ctx.request("alice.eth", &sig2, "n2"))
        .await
        .unwrap();
    assert!(again.is_some());
    assert_eq!(ctx.users.len(), 1, "re-authentication must not provision");
}

#[tokio::test]
async fn test_unbound_name_is_rejected() {
    let ctx = TestContext::new();
    let wallet = evm_address(9);
    let sig = sign(&wallet, "n1");

    let result = ctx
        .auth
        .authenticate(ctx.request("nobody.eth", &sig, "n1"))
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(ctx.users.is_empty());
}

#[tokio::test]
async fn test_wrong_wallet_cannot_claim_name() {
    let ctx = TestContext::new();
    ctx.names.bind(NameKind::Ens, "alice.eth", evm_address(7));

    // Signature from a different wallet than the name's owner.
    let sig = sign(&evm_address(8), "n1");
    let result = ctx
        .auth
        .authenticate(ctx.request("alice.eth", &sig, "n1"))
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(ctx.users.is_empty());
}

#[tokio::test]
async fn test_scope_policy_is_a_typed_error() {
    let ctx = TestContext::new();
    let wallet = evm_address(7);
    let identity = wallet.to_string();
    let sig = sign(&wallet, "n1");
    let success = ctx
        .auth
        .authenticate(ctx.request(&identity, &sig, "n1"))
        .await
        .unwrap()
        .unwrap();
    ctx.users
        .set_disabled_scopes(success.user_id, vec![AuthScope::Imap]);

    let sig2 = sign(&wallet, "n2");
    let err = ctx
        .auth
        .authenticate(AuthRequest {
            scope: AuthScope::Imap,
            ..ctx.request(&identity, &sig2, "n2")
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::ScopeDisabled {
            scope: AuthScope::Imap
        }
    ));

    // Other scopes stay usable.
    let sig3 = sign(&wallet, "n3");
    let smtp = ctx
        .auth
        .authenticate(AuthRequest {
            scope: AuthScope::Smtp,
            ..ctx.request(&identity, &sig3, "n3")
        })
        .await
        .unwrap();
    assert!(smtp.is_some());
}

#[tokio::test]
async fn test_success_restores_the_attempt_budget() {
    let ctx = TestContext::with_rate_limit(RateLimitConfig {
        identity_limit: 3,
        ..RateLimitConfig::default()
    });
    let wallet = evm_address(7);
    let identity = wallet.to_string();

    // One failure burns two units (probe + enforce).
    let bad = sign(&evm_address(8), "n1");
    assert!(
        ctx.auth
            .authenticate(ctx.request(&identity, &bad, "n1"))
            .await
            .unwrap()
            .is_none()
    );

    // A success within the budget clears the identity counter entirely.
    let good = sign(&wallet, "n2");
    assert!(
        ctx.auth
            .authenticate(ctx.request(&identity, &good, "n2"))
            .await
            .unwrap()
            .is_some()
    );
    assert_eq!(ctx.counters.count(&format!("identity:{identity}")), None);
}

#[tokio::test]
async fn test_identity_limit_trips_with_retry_hint() {
    let ctx = TestContext::with_rate_limit(RateLimitConfig {
        identity_limit: 2,
        identity_window: Duration::from_secs(60),
        ..RateLimitConfig::default()
    });
    let identity = evm_address(7).to_string();
    let bad = sign(&evm_address(8), "n1");

    assert!(
        ctx.auth
            .authenticate(ctx.request(&identity, &bad, "n1"))
            .await
            .unwrap()
            .is_none()
    );

    let err = ctx
        .auth
        .authenticate(ctx.request(&identity, &bad, "n2"))
        .await
        .unwrap_err();
    match err {
        AuthError::RateLimited { retry_after } => {
            assert!(retry_after > Duration::ZERO);
            assert!(retry_after <= Duration::from_secs(60));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ip_limit_covers_identity_scans() {
    let ctx = TestContext::with_rate_limit(RateLimitConfig {
        ip_limit: 2,
        identity_limit: 100,
        ..RateLimitConfig::default()
    });
    let sig = sign(&evm_address(1), "n1");

    // Scanning distinct unknown identities from one address trips the IP
    // counter even though each identity counter stays near zero.
    for (i, name) in ["ghost1.eth", "ghost2.eth"].iter().enumerate() {
        let result = ctx.auth.authenticate(ctx.request(name, &sig, "n1")).await;
        assert!(result.unwrap().is_none(), "attempt {i} should be a plain fail");
    }
    let err = ctx
        .auth
        .authenticate(ctx.request("ghost3.eth", &sig, "n1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::RateLimited { .. }));
    assert!(ctx.counters.count(&format!("ip:{}", client_ip())).is_some());
}

#[tokio::test]
async fn test_pre_auth_reports_method_and_status() {
    let ctx = TestContext::new();
    let wallet = evm_address(7);
    let identity = wallet.to_string();
    let sig = sign(&wallet, "n1");
    let success = ctx
        .auth
        .authenticate(ctx.request(&identity, &sig, "n1"))
        .await
        .unwrap()
        .unwrap();

    let info = ctx
        .auth
        .pre_auth(&identity, AuthScope::Pop3)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(info.user_id, success.user_id);
    assert_eq!(info.chain_auth, Some(ChainKind::Evm));

    // Suspension makes pre-auth a plain negative.
    ctx.users.set_status(success.user_id, false, true);
    let suspended = ctx.auth.pre_auth(&identity, AuthScope::Pop3).await.unwrap();
    assert!(suspended.is_none());
}

#[tokio::test]
async fn test_lookup_by_numeric_account_id() {
    let ctx = TestContext::new();
    let wallet = evm_address(7);
    let identity = wallet.to_string();
    let sig = sign(&wallet, "n1");
    let success = ctx
        .auth
        .authenticate(ctx.request(&identity, &sig, "n1"))
        .await
        .unwrap()
        .unwrap();

    // The account id works as a claimed identity with the same wallet proof.
    let id_form = success.user_id.to_string();
    let sig2 = sign(&wallet, "n2");
    let by_id = ctx
        .auth
        .authenticate(ctx.request(&id_form, &sig2, "n2"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_id.user_id, success.user_id);

    let stored = ctx
        .users
        .get_by_id(success.user_id, Projection::Full)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.chain_auth.unwrap().last_nonce.as_deref(),
        Some("n2")
    );
}
