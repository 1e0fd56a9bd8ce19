//! Address and domain-alias repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use mailcove_core::{AddressId, UserId};

use super::{RepositoryError, with_timeout};
use crate::models::{Address, DomainAlias, NewAddress};
use crate::store::AddressStore;

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` address queries.
#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: i64,
    address: String,
    addrview: String,
    user_id: Option<i64>,
    main: bool,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            address: row.address,
            addrview: row.addrview,
            user_id: row.user_id.map(UserId::new),
            main: row.main,
            tags: row.tags,
            created_at: row.created_at,
        }
    }
}

/// Internal row type for domain alias queries.
#[derive(Debug, sqlx::FromRow)]
struct DomainAliasRow {
    alias: String,
    domain: String,
}

impl From<DomainAliasRow> for DomainAlias {
    fn from(row: DomainAliasRow) -> Self {
        Self {
            alias: row.alias,
            domain: row.domain,
        }
    }
}

const COLUMNS: &str = "id, address, addrview, user_id, main, tags, created_at";

// =============================================================================
// Repository
// =============================================================================

/// `PostgreSQL`-backed [`AddressStore`].
#[derive(Clone)]
pub struct PgAddressStore {
    pool: PgPool,
}

impl PgAddressStore {
    /// Create a new address store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AddressStore for PgAddressStore {
    async fn get_by_addrview(&self, addrview: &str) -> Result<Option<Address>, RepositoryError> {
        let sql = format!("SELECT {COLUMNS} FROM addresses WHERE addrview = $1");
        let row = with_timeout(async {
            sqlx::query_as::<_, AddressRow>(&sql)
                .bind(addrview)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::Database)
        })
        .await?;

        Ok(row.map(Into::into))
    }

    async fn get_domain_alias(
        &self,
        alias: &str,
    ) -> Result<Option<DomainAlias>, RepositoryError> {
        let row = with_timeout(async {
            sqlx::query_as::<_, DomainAliasRow>(
                "SELECT alias, domain FROM domain_aliases WHERE alias = $1",
            )
            .bind(alias)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::Database)
        })
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_by_addrviews(
        &self,
        patterns: &[String],
    ) -> Result<Vec<Address>, RepositoryError> {
        let sql = format!("SELECT {COLUMNS} FROM addresses WHERE addrview = ANY($1)");
        let rows = with_timeout(async {
            sqlx::query_as::<_, AddressRow>(&sql)
                .bind(patterns)
                .fetch_all(&self.pool)
                .await
                .map_err(RepositoryError::Database)
        })
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert(&self, address: NewAddress) -> Result<Address, RepositoryError> {
        let sql = format!(
            "INSERT INTO addresses (address, addrview, user_id, main, tags) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        let row = with_timeout(async {
            sqlx::query_as::<_, AddressRow>(&sql)
                .bind(&address.address)
                .bind(&address.addrview)
                .bind(address.user_id.map(|id| id.as_i64()))
                .bind(address.main)
                .bind(&address.tags)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| RepositoryError::from_query(e, "addrview"))
        })
        .await?;

        Ok(row.into())
    }
}
