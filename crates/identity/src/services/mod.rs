//! Core services: address resolution, authentication orchestration, rate
//! limiting, and the audit trail.

pub mod audit;
pub mod auth;
pub mod rate_limit;
pub mod resolver;

pub use audit::{AuditEvent, AuditLogger};
pub use auth::AuthService;
pub use rate_limit::{Probe, RateLimitKey, RateLimiter};
pub use resolver::AddressResolver;

use mailcove_core::{EmailAddress, IdentityKind};

/// Normalize a claimed identity to its comparison form.
///
/// Chain identities normalize to their canonical textual form, literal email
/// addresses to their addrview, and anything else to a trimmed lowercase
/// string. This is the form stored in `username_normalized` and used for
/// direct lookups and rate-limit keys.
#[must_use]
pub fn normalize_identity(identity: &str) -> String {
    if let Some(kind) = IdentityKind::classify(identity) {
        return kind.to_string();
    }
    if identity.contains('@')
        && let Ok(addr) = EmailAddress::parse(identity)
    {
        return addr.addrview();
    }
    identity.trim().to_lowercase()
}
