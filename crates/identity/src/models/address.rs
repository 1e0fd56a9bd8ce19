//! Address and domain-alias domain types.

use chrono::{DateTime, Utc};

use mailcove_core::{AddressId, UserId};

/// A routable address record.
///
/// `addrview` is the normalized comparison form and is globally unique. A
/// stored addrview may contain a leading `*` in the local part (wildcard
/// suffix match) or a literal `*` domain (catch-all for that local part on
/// any domain).
#[derive(Debug, Clone)]
pub struct Address {
    /// Unique address ID.
    pub id: AddressId,
    /// Display form of the address.
    pub address: String,
    /// Normalized comparison form; globally unique.
    pub addrview: String,
    /// Owning account; absent for pure forwarding addresses.
    pub user_id: Option<UserId>,
    /// At most one address per user is flagged as the main address.
    pub main: bool,
    /// Free-form routing tags.
    pub tags: Vec<String>,
    /// When the address was created.
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a new address record.
#[derive(Debug, Clone)]
pub struct NewAddress {
    /// Display form of the address.
    pub address: String,
    /// Normalized comparison form; the store enforces uniqueness.
    pub addrview: String,
    /// Owning account, if any.
    pub user_id: Option<UserId>,
    /// Whether this is the user's main address.
    pub main: bool,
    /// Free-form routing tags.
    pub tags: Vec<String>,
}

/// Maps an alias domain to its canonical domain.
#[derive(Debug, Clone)]
pub struct DomainAlias {
    /// The alias domain; unique.
    pub alias: String,
    /// The canonical domain it routes to.
    pub domain: String,
}
