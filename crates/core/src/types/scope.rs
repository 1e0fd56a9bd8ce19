//! Authentication scopes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an unknown scope name.
#[derive(thiserror::Error, Debug, Clone)]
#[error("unknown auth scope: {0}")]
pub struct ScopeError(pub String);

/// A named capability class an authenticated session is restricted to.
///
/// `Master` grants full-account access; the protocol scopes restrict a
/// session to one front-end. The set is deliberately small and fixed - this
/// is not a general policy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScope {
    /// Full-account access.
    Master,
    /// IMAP session only.
    Imap,
    /// POP3 session only.
    Pop3,
    /// SMTP submission only.
    Smtp,
}

impl AuthScope {
    /// All defined scopes.
    pub const ALL: [Self; 4] = [Self::Master, Self::Imap, Self::Pop3, Self::Smtp];

    /// Returns the canonical lowercase name of the scope.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Imap => "imap",
            Self::Pop3 => "pop3",
            Self::Smtp => "smtp",
        }
    }
}

impl fmt::Display for AuthScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuthScope {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "master" => Ok(Self::Master),
            "imap" => Ok(Self::Imap),
            "pop3" => Ok(Self::Pop3),
            "smtp" => Ok(Self::Smtp),
            other => Err(ScopeError(other.to_owned())),
        }
    }
}
