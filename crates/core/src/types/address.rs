//! Email address type with routing normalization.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`EmailAddress`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum AddressError {
    /// The input string is empty.
    #[error("address cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("address must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input does not contain an @ symbol.
    #[error("address must contain an @ symbol")]
    MissingAtSymbol,
    /// The local part (before @) is empty.
    #[error("address local part cannot be empty")]
    EmptyLocalPart,
    /// The domain part (after @) is empty.
    #[error("address domain cannot be empty")]
    EmptyDomain,
}

/// An email address, kept in its display form.
///
/// Routing never compares display forms directly. Comparison and storage keys
/// use the *addrview*: the local part lowercased with the sub-address label
/// (`+tag`) and all dots stripped, joined to the lowercased domain. So
/// `Bob.Smith+work@Example.COM` and `bobsmith@example.com` route to the same
/// mailbox.
///
/// ## Constraints
///
/// - Length: 1-254 characters (RFC 5321 limit)
/// - Must contain an @ symbol
/// - Local part (before the last @) must not be empty
/// - Domain part (after the last @) must not be empty
///
/// ## Examples
///
/// ```
/// use mailcove_core::EmailAddress;
///
/// let addr = EmailAddress::parse("Bob+work@Example.com").unwrap();
/// assert_eq!(addr.as_str(), "Bob+work@Example.com");
/// assert_eq!(addr.addrview(), "bob@example.com");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse an `EmailAddress` from a string.
    ///
    /// The display form is preserved as given; normalization happens lazily
    /// through [`Self::addrview`] and [`Self::normalized_parts`].
    ///
    /// # Errors
    ///
    /// Returns an error if the input:
    /// - Is empty
    /// - Is longer than 254 characters
    /// - Does not contain an @ symbol
    /// - Has an empty local part or domain
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let s = s.trim();

        if s.is_empty() {
            return Err(AddressError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(AddressError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        // Last @ splits local and domain; quoted local parts with embedded
        // @ are not supported by the routing layer.
        let at_pos = s.rfind('@').ok_or(AddressError::MissingAtSymbol)?;

        if at_pos == 0 {
            return Err(AddressError::EmptyLocalPart);
        }

        if at_pos == s.len() - 1 {
            return Err(AddressError::EmptyDomain);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `EmailAddress` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the local part of the address (before the last @), as given.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0
            .rfind('@')
            .map_or(self.0.as_str(), |at| self.0.get(..at).unwrap_or(""))
    }

    /// Returns the domain part of the address (after the last @), as given.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0
            .rfind('@')
            .and_then(|at| self.0.get(at + 1..))
            .unwrap_or("")
    }

    /// Returns the normalized `(local, domain)` pair used for routing.
    ///
    /// The local part is lowercased, truncated at the first `+` (sub-address
    /// label), and has all dots removed. The domain is lowercased. A literal
    /// `*` local part or domain is preserved untouched so stored wildcard and
    /// catch-all rows normalize to themselves.
    #[must_use]
    pub fn normalized_parts(&self) -> (String, String) {
        let local = self.local_part();
        let domain = self.domain().to_lowercase();

        let local = if local == "*" {
            local.to_owned()
        } else {
            local
                .split('+')
                .next()
                .unwrap_or("")
                .to_lowercase()
                .replace('.', "")
        };

        (local, domain)
    }

    /// Returns the addrview comparison form: `normalized_local@normalized_domain`.
    #[must_use]
    pub fn addrview(&self) -> String {
        let (local, domain) = self.normalized_parts();
        format!("{local}@{domain}")
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EmailAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for EmailAddress {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for EmailAddress {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed valid
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for EmailAddress {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
