//! Authentication error types.

use std::time::Duration;

use thiserror::Error;

use mailcove_core::AuthScope;

use crate::db::RepositoryError;

/// Typed authentication failures.
///
/// Credential failures (unknown identity, bad signature, nonce replay) are
/// deliberately *not* here: they are returned as a plain `None` so callers
/// cannot distinguish them and enumerate identities. This enum carries only
/// the failures a caller is allowed to see the shape of.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Too many attempts from this IP or for this identity.
    #[error("too many authentication attempts, retry in {}s", retry_after.as_secs())]
    RateLimited {
        /// How long until the window opens again.
        retry_after: Duration,
    },

    /// The requested scope is disabled for this account. A policy decision,
    /// not a credential problem.
    #[error("authentication scope {scope} is disabled for this account")]
    ScopeDisabled {
        /// The rejected scope.
        scope: AuthScope,
    },

    /// A concurrent provisioning attempt created the account first.
    #[error("account already exists")]
    AccountExists,

    /// A backing store failed or timed out.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl AuthError {
    /// Machine-readable error code for protocol front-ends.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::ScopeDisabled { .. } => "scope_disabled",
            Self::AccountExists => "account_exists",
            Self::Repository(_) => "internal_error",
        }
    }

    /// Retry hint, where one applies.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
