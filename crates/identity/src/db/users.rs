//! User repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use mailcove_core::{AuthScope, ChainKind, UserId};

use super::{RepositoryError, with_timeout};
use crate::models::{ChainAuth, NewUser, User};
use crate::store::{Projection, UserStore};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    username_normalized: String,
    name: String,
    language: Option<String>,
    quota_bytes: i64,
    max_connections: i32,
    disabled: bool,
    suspended: bool,
    disabled_scopes: Vec<String>,
    chain_kind: Option<String>,
    chain_address: Option<String>,
    last_nonce: Option<String>,
    last_auth: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let disabled_scopes = row
            .disabled_scopes
            .iter()
            .map(|s| {
                s.parse::<AuthScope>().map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid scope in database: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let chain_auth = match (row.chain_kind, row.chain_address) {
            (Some(kind), Some(address)) => Some(ChainAuth {
                kind: parse_chain_kind(&kind)?,
                address,
                last_nonce: row.last_nonce,
                last_auth: row.last_auth,
            }),
            (None, None) => None,
            _ => {
                return Err(RepositoryError::DataCorruption(
                    "chain_kind and chain_address must be set together".into(),
                ));
            }
        };

        Ok(Self {
            id: UserId::new(row.id),
            username: row.username,
            username_normalized: row.username_normalized,
            name: row.name,
            language: row.language,
            quota_bytes: row.quota_bytes,
            max_connections: row.max_connections,
            disabled: row.disabled,
            suspended: row.suspended,
            disabled_scopes,
            chain_auth,
            created_at: row.created_at,
        })
    }
}

fn parse_chain_kind(kind: &str) -> Result<ChainKind, RepositoryError> {
    match kind {
        "evm" => Ok(ChainKind::Evm),
        "solana" => Ok(ChainKind::Solana),
        other => Err(RepositoryError::DataCorruption(format!(
            "invalid chain kind in database: {other}"
        ))),
    }
}

const fn chain_kind_str(kind: ChainKind) -> &'static str {
    match kind {
        ChainKind::Evm => "evm",
        ChainKind::Solana => "solana",
    }
}

/// Full-record column list.
const FULL_COLUMNS: &str = "id, username, username_normalized, name, language, \
     quota_bytes, max_connections, disabled, suspended, disabled_scopes, \
     chain_kind, chain_address, last_nonce, last_auth, created_at";

/// Identity-projection column list: quota and limit fields are not fetched.
const IDENTITY_COLUMNS: &str = "id, username, username_normalized, name, language, \
     0::BIGINT AS quota_bytes, 0 AS max_connections, disabled, suspended, disabled_scopes, \
     chain_kind, chain_address, last_nonce, last_auth, created_at";

const fn columns_for(projection: Projection) -> &'static str {
    match projection {
        Projection::Full => FULL_COLUMNS,
        Projection::Identity => IDENTITY_COLUMNS,
    }
}

// =============================================================================
// Repository
// =============================================================================

/// `PostgreSQL`-backed [`UserStore`].
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a new user store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_by_id(
        &self,
        id: UserId,
        projection: Projection,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = $1",
            columns_for(projection)
        );
        let row = with_timeout(async {
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(id.as_i64())
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::Database)
        })
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_identity(
        &self,
        normalized: &str,
        projection: Projection,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM users WHERE username_normalized = $1",
            columns_for(projection)
        );
        let row = with_timeout(async {
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(normalized)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::Database)
        })
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert(&self, user: NewUser) -> Result<User, RepositoryError> {
        let (chain_kind, chain_address, last_nonce, last_auth) = match &user.chain_auth {
            Some(auth) => (
                Some(chain_kind_str(auth.kind)),
                Some(auth.address.clone()),
                auth.last_nonce.clone(),
                auth.last_auth,
            ),
            None => (None, None, None, None),
        };

        let sql = format!(
            "INSERT INTO users \
                (username, username_normalized, name, language, \
                 chain_kind, chain_address, last_nonce, last_auth) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {FULL_COLUMNS}"
        );
        let row = with_timeout(async {
            sqlx::query_as::<_, UserRow>(&sql)
                .bind(&user.username)
                .bind(&user.username_normalized)
                .bind(&user.name)
                .bind(&user.language)
                .bind(chain_kind)
                .bind(&chain_address)
                .bind(&last_nonce)
                .bind(last_auth)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| RepositoryError::from_query(e, "username"))
        })
        .await?;

        row.try_into()
    }

    async fn record_auth(
        &self,
        id: UserId,
        nonce: &str,
        when: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = with_timeout(async {
            sqlx::query("UPDATE users SET last_nonce = $2, last_auth = $3 WHERE id = $1")
                .bind(id.as_i64())
                .bind(nonce)
                .bind(when)
                .execute(&self.pool)
                .await
                .map_err(RepositoryError::Database)
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
