//! Append-only audit log repository.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{RepositoryError, with_timeout};
use crate::models::AuditRecord;
use crate::store::AuditSink;

/// `PostgreSQL`-backed [`AuditSink`].
///
/// Records are append-only; purging expired rows is a background maintenance
/// task, not part of this repository.
#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    /// Create a new audit sink over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn append(&self, record: AuditRecord) -> Result<(), RepositoryError> {
        with_timeout(async {
            sqlx::query(
                "INSERT INTO audit_log \
                    (user_id, action, result, scope, source_ip, session_id, \
                     detail, created_at, expires_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(record.user_id.map(|id| id.as_i64()))
            .bind(record.action.as_str())
            .bind(record.result.as_str())
            .bind(record.scope.map(|s| s.as_str()))
            .bind(record.source_ip.map(|ip| ip.to_string()))
            .bind(&record.session_id)
            .bind(&record.detail)
            .bind(record.created_at)
            .bind(record.expires_at)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::Database)
        })
        .await?;

        Ok(())
    }
}
