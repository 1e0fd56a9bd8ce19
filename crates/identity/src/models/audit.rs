//! Audit trail types.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mailcove_core::{AuthScope, UserId};

/// What kind of attempt an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Full authentication attempt.
    Authenticate,
    /// Status/scope pre-check without credential verification.
    PreAuth,
    /// Implicit account creation on first identity proof.
    Provision,
}

impl AuditAction {
    /// Canonical snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::PreAuth => "pre_auth",
            Self::Provision => "provision",
        }
    }
}

/// Outcome recorded for an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    /// The attempt succeeded.
    Success,
    /// The attempt was rejected.
    Fail,
}

impl AuditResult {
    /// Canonical snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fail => "fail",
        }
    }
}

/// One append-only audit record.
///
/// `expires_at` is derived from the configured retention period; when no
/// retention is configured the field stays unset and the record is kept
/// indefinitely. Audit writes are best-effort and never change an
/// authentication outcome.
#[derive(Debug, Clone)]
pub struct AuditRecord {
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
    pub session_id: Option<String>,
    /// Free-form detail (failure class, provisioned address, ...).
    pub detail: Option<String>,
    /// When the attempt happened.
    pub created_at: DateTime<Utc>,
    /// When the record may be purged; unset means keep indefinitely.
    pub expires_at: Option<DateTime<Utc>>,
}
