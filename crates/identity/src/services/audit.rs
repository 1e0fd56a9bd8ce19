//! Best-effort audit trail.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use mailcove_core::{AuthScope, UserId};

use crate::models::{AuditAction, AuditRecord, AuditResult};
use crate::store::AuditSink;

/// One attempt to be recorded.
#[derive(Debug, Clone)]
pub struct AuditEvent<'a> {
    /// Subject account, when one was resolved.
    pub user_id: Option<UserId>,
    /// What was attempted.
    pub action: AuditAction,
    /// How it ended.
    pub result: AuditResult,
    /// Requested scope, when applicable.
    pub scope: Option<AuthScope>,
    /// Source IP of the connecting client.
    pub source_ip: Option<IpAddr>,
    /// Front-end session identifier.
    pub session_id: Option<&'a str>,
    /// Free-form detail (failure class, provisioned address, ...).
    pub detail: Option<String>,
}

/// Appends attempt records to the audit sink.
///
/// Writes are best-effort: a failing sink is logged and ignored, and never
/// alters or blocks the authentication outcome.
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    retention: Option<Duration>,
}

impl AuditLogger {
    /// Create a logger with the configured retention period.
    ///
    /// With no retention configured, records carry no expiry and are kept
    /// indefinitely.
    pub fn new(sink: Arc<dyn AuditSink>, retention: Option<Duration>) -> Self {
        Self { sink, retention }
    }

    /// Record one attempt.
    pub async fn log(&self, event: AuditEvent<'_>) {
        let created_at = Utc::now();
        let expires_at = self
            .retention
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| created_at + d);

        let record = AuditRecord {
            user_id: event.user_id,
            action: event.action,
            result: event.result,
            scope: event.scope,
            source_ip: event.source_ip,
            session_id: event.session_id.map(ToOwned::to_owned),
            detail: event.detail,
            created_at,
            expires_at,
        };

        if let Err(err) = self.sink.append(record).await {
            warn!(error = %err, action = event.action.as_str(), "audit write failed");
        }
    }
}
