//! Pluggable chain collaborators.
//!
//! The cryptographic internals of signature verification and on-chain name
//! resolution are deliberately outside this crate. The orchestrator and the
//! resolver consume these traits; deployments plug in per-chain
//! implementations (JSON-RPC clients, light clients, test doubles).

use async_trait::async_trait;
use thiserror::Error;

use mailcove_core::{ChainAddress, NameKind};

/// Errors from a signature verifier.
///
/// The orchestrator distinguishes a mismatch from an unreachable verifier
/// only for diagnostics; both collapse to the same caller-visible rejection.
#[derive(Debug, Error)]
pub enum VerifierError {
    /// The verifier backend could not be reached.
    #[error("verifier unreachable: {0}")]
    Unreachable(String),
    /// The signature or identity was malformed beyond verification.
    #[error("malformed verification input: {0}")]
    Malformed(String),
}

/// Proof-of-control verification for a chain address.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Check that `signature` was validly produced by `address`.
    ///
    /// When `nonce` is `Some`, the signature must cover that nonce. When
    /// `None`, any signature validly produced by the address proves control;
    /// there is no pre-shared message on first contact.
    async fn verify(
        &self,
        address: &ChainAddress,
        signature: &str,
        nonce: Option<&str>,
    ) -> Result<bool, VerifierError>;
}

/// Errors from a name resolver.
#[derive(Debug, Error)]
pub enum NameResolverError {
    /// The resolver backend could not be reached.
    #[error("name resolver unreachable: {0}")]
    Unreachable(String),
}

/// On-chain name ownership resolution.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve a human-readable name to the chain address that owns it.
    ///
    /// Returns `Ok(None)` when the name exists in no registry.
    async fn resolve_owner(
        &self,
        kind: NameKind,
        name: &str,
    ) -> Result<Option<ChainAddress>, NameResolverError>;
}
