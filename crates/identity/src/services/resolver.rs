//! Address resolution: maps a raw inbound address to its owning account.
//!
//! Matching order, first match wins:
//!
//! 1. exact addrview match
//! 2. exact match through a domain alias
//! 3. wildcard suffix patterns (`*<suffix>@<domain>`), longest pattern first
//! 4. catch-all (`<local>@*`)
//! 5. implicit provisioning from a chain identity, when requested
//!
//! Only provisioning mutates state. All store failures surface as
//! [`ResolveError::Database`]; routing fails closed on a degraded store.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use mailcove_core::{EmailAddress, IdentityKind, UserId};

use crate::chain::{IdentityResolver, NameResolverError};
use crate::db::RepositoryError;
use crate::models::{Address, ChainAuth, NewAddress, NewUser, User};
use crate::store::{AddressStore, Projection, UserStore};

/// Errors from address resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Provisioning was requested but the local part is not a valid chain
    /// identity.
    #[error("invalid chain identifier")]
    InvalidChainIdentifier,

    /// Provisioning was requested but the name resolves to no chain address.
    #[error("chain address not found")]
    ChainAddressNotFound,

    /// The name resolver backend failed.
    #[error("name resolution failed: {0}")]
    NameResolver(#[from] NameResolverError),

    /// A backing store failed or timed out.
    #[error("database error: {0}")]
    Database(#[from] RepositoryError),
}

/// Options controlling one resolution pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Fall through to wildcard and catch-all matching.
    pub wildcard: bool,
    /// Provision an account from a chain identity when nothing matches.
    pub create: bool,
    /// Suppress the address record on provisioning (account only).
    pub suppress_address: bool,
    /// How much of the owning user record lookups materialize.
    pub projection: Projection,
}

/// A successfully resolved (or provisioned) account binding.
#[derive(Debug, Clone)]
pub struct ResolvedAccount {
    /// Owning account; absent for pure forwarding addresses.
    pub user_id: Option<UserId>,
    /// Display form of the matched or created address.
    pub address: String,
    /// Normalized comparison form that matched.
    pub addrview: String,
    /// The owning user record, materialized per the requested projection.
    /// `None` for pure forwarding addresses or a dangling owner reference.
    pub owner: Option<User>,
}

impl From<Address> for ResolvedAccount {
    fn from(address: Address) -> Self {
        Self {
            user_id: address.user_id,
            address: address.address,
            addrview: address.addrview,
            owner: None,
        }
    }
}

/// The address resolution service.
#[derive(Clone)]
pub struct AddressResolver {
    addresses: Arc<dyn AddressStore>,
    users: Arc<dyn UserStore>,
    names: Arc<dyn IdentityResolver>,
}

impl AddressResolver {
    /// Create a resolver over the given stores.
    pub fn new(
        addresses: Arc<dyn AddressStore>,
        users: Arc<dyn UserStore>,
        names: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            addresses,
            users,
            names,
        }
    }

    /// Resolve an address to its owning account.
    ///
    /// Returns `Ok(None)` when nothing matches and provisioning was not
    /// requested or not possible without error.
    ///
    /// # Errors
    ///
    /// [`ResolveError::Database`] on store failure; the provisioning-specific
    /// variants when `create` is set and the local part fails the identity
    /// grammar or resolves to no chain address.
    pub async fn resolve(
        &self,
        address: &EmailAddress,
        options: ResolveOptions,
    ) -> Result<Option<ResolvedAccount>, ResolveError> {
        let (local, domain) = address.normalized_parts();
        let addrview = format!("{local}@{domain}");

        // Exact match.
        if let Some(found) = self.addresses.get_by_addrview(&addrview).await? {
            debug!(addrview, "resolved by exact match");
            return self.materialize(found, options.projection).await;
        }

        // Alias indirection: retry the exact match on the canonical domain.
        let alias = self.addresses.get_domain_alias(&domain).await?;
        if let Some(alias) = &alias {
            let aliased = format!("{local}@{}", alias.domain);
            if let Some(found) = self.addresses.get_by_addrview(&aliased).await? {
                debug!(addrview, canonical = %alias.domain, "resolved through domain alias");
                return self.materialize(found, options.projection).await;
            }
        }

        if !options.wildcard {
            return Ok(None);
        }

        // Wildcard suffix patterns for the input domain and, when an alias
        // resolved, for the canonical domain. Both candidate sets are ranked
        // longest-pattern-first with a stable tie-break.
        let mut patterns = wildcard_patterns(&local, &domain);
        if let Some(alias) = &alias {
            patterns.extend(wildcard_patterns(&local, &alias.domain));
        }

        let mut candidates = self.addresses.find_by_addrviews(&patterns).await?;
        candidates.sort_by(|a, b| {
            b.addrview
                .len()
                .cmp(&a.addrview.len())
                .then_with(|| a.addrview.cmp(&b.addrview))
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(found) = candidates.into_iter().next() {
            debug!(addrview, pattern = %found.addrview, "resolved by wildcard match");
            return self.materialize(found, options.projection).await;
        }

        // Catch-all: this local part on any domain.
        let catch_all = format!("{local}@*");
        if let Some(found) = self.addresses.get_by_addrview(&catch_all).await? {
            debug!(addrview, "resolved by catch-all");
            return self.materialize(found, options.projection).await;
        }

        if !options.create {
            return Ok(None);
        }

        self.provision(address, &local, &domain, options).await
    }

    /// Turn a matched address into a result, fetching the owning user per
    /// the requested projection. A dangling owner reference yields the
    /// binding with no owner record rather than an error; routing callers
    /// decide what a missing owner means.
    async fn materialize(
        &self,
        found: Address,
        projection: Projection,
    ) -> Result<Option<ResolvedAccount>, ResolveError> {
        let mut account = ResolvedAccount::from(found);
        if let Some(user_id) = account.user_id {
            account.owner = self.users.get_by_id(user_id, projection).await?;
        }
        Ok(Some(account))
    }

    /// Create an account for a first-seen chain identity.
    async fn provision(
        &self,
        address: &EmailAddress,
        local: &str,
        domain: &str,
        options: ResolveOptions,
    ) -> Result<Option<ResolvedAccount>, ResolveError> {
        // Classify the display local part: base58 is case-sensitive, so the
        // lowercased routing form must not be used here.
        let kind = IdentityKind::classify(address.local_part())
            .ok_or(ResolveError::InvalidChainIdentifier)?;

        let canonical = match &kind {
            IdentityKind::Direct(addr) => *addr,
            IdentityKind::Name { kind, name } => self
                .names
                .resolve_owner(*kind, name)
                .await?
                .ok_or(ResolveError::ChainAddressNotFound)?,
        };

        let username = address.local_part().to_owned();
        let user = self
            .users
            .insert(NewUser {
                username: username.clone(),
                username_normalized: kind.to_string(),
                name: username.clone(),
                language: None,
                chain_auth: Some(ChainAuth {
                    kind: canonical.kind(),
                    address: canonical.to_string(),
                    last_nonce: None,
                    last_auth: None,
                }),
            })
            .await?;

        debug!(user_id = %user.id, identity = %kind, "provisioned account during resolution");

        let addrview = format!("{local}@{domain}");
        if options.suppress_address {
            return Ok(Some(ResolvedAccount {
                user_id: Some(user.id),
                address: format!("{username}@{domain}"),
                addrview,
                owner: Some(user),
            }));
        }

        let created = self
            .addresses
            .insert(NewAddress {
                address: format!("{username}@{domain}"),
                addrview,
                user_id: Some(user.id),
                main: true,
                tags: Vec::new(),
            })
            .await?;

        Ok(Some(ResolvedAccount {
            owner: Some(user),
            ..created.into()
        }))
    }
}

/// Descending left-truncated wildcard patterns for a local part.
///
/// `sales` on `example.com` yields `*sales@example.com`, `*ales@example.com`,
/// ... `*s@example.com`, `*@example.com`, in that order.
fn wildcard_patterns(local: &str, domain: &str) -> Vec<String> {
    let mut patterns: Vec<String> = local
        .char_indices()
        .map(|(i, _)| format!("*{}@{domain}", local.get(i..).unwrap_or("")))
        .collect();
    patterns.push(format!("*@{domain}"));
    patterns
}
