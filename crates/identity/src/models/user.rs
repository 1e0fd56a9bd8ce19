//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mailcove_core::{AuthScope, ChainKind, UserId};

/// Chain authentication state attached to a user.
///
/// `last_nonce` holds only the most recently consumed nonce. That is enough
/// to reject an exact replay of one observed signature; protection against
/// freshly forged signatures is the verifier's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAuth {
    /// Which chain the account's address lives on.
    pub kind: ChainKind,
    /// Canonical textual form of the controlling chain address.
    pub address: String,
    /// Most recently consumed single-use nonce.
    pub last_nonce: Option<String>,
    /// When the user last authenticated successfully.
    pub last_auth: Option<DateTime<Utc>>,
}

/// A mail account (domain type).
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Opaque identity as registered: a literal address, a chain address, or
    /// a chain name.
    pub username: String,
    /// Normalized comparison form of the username; globally unique.
    pub username_normalized: String,
    /// Display name.
    pub name: String,
    /// Preferred language tag, when set.
    pub language: Option<String>,
    /// Storage quota in bytes.
    pub quota_bytes: i64,
    /// Per-protocol concurrent connection ceiling, enforced by front-ends.
    pub max_connections: i32,
    /// Account is administratively disabled.
    pub disabled: bool,
    /// Account is suspended (e.g. abuse review).
    pub suspended: bool,
    /// Scopes this account may not authenticate for.
    pub disabled_scopes: Vec<AuthScope>,
    /// Chain authentication state, when the account was provisioned from a
    /// chain identity.
    pub chain_auth: Option<ChainAuth>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether the given scope is blocked for this account.
    #[must_use]
    pub fn scope_disabled(&self, scope: AuthScope) -> bool {
        self.disabled_scopes.contains(&scope)
    }
}

/// Fields for creating a new user via provisioning or the admin API.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Opaque identity as claimed.
    pub username: String,
    /// Normalized comparison form; the store enforces global uniqueness.
    pub username_normalized: String,
    /// Display name.
    pub name: String,
    /// Preferred language tag.
    pub language: Option<String>,
    /// Chain authentication state, set on provisioning.
    pub chain_auth: Option<ChainAuth>,
}
