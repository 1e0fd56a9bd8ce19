//! Chain identity classification.
//!
//! A claimed identity string is either a direct chain address or a
//! human-readable chain name. One classification function turns raw strings
//! into a tagged [`IdentityKind`], which the resolver and verifier layers
//! consume uniformly instead of re-sniffing strings.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Which chain a direct address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    /// EVM-compatible chains (20-byte accounts, 0x-prefixed hex).
    Evm,
    /// Solana (32-byte accounts, base58).
    Solana,
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evm => f.write_str("evm"),
            Self::Solana => f.write_str("solana"),
        }
    }
}

/// Which naming system a human-readable chain name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameKind {
    /// ENS names (`*.eth`), resolving to EVM addresses.
    Ens,
    /// SNS names (`*.sol`), resolving to Solana addresses.
    Sns,
}

impl NameKind {
    /// The chain the name resolves into.
    #[must_use]
    pub const fn chain(self) -> ChainKind {
        match self {
            Self::Ens => ChainKind::Evm,
            Self::Sns => ChainKind::Solana,
        }
    }
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ens => f.write_str("ens"),
            Self::Sns => f.write_str("sns"),
        }
    }
}

/// A parsed direct chain address in canonical binary form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainAddress {
    /// 20-byte EVM account.
    Evm([u8; 20]),
    /// 32-byte Solana account.
    Solana([u8; 32]),
}

impl ChainAddress {
    /// The chain this address belongs to.
    #[must_use]
    pub const fn kind(&self) -> ChainKind {
        match self {
            Self::Evm(_) => ChainKind::Evm,
            Self::Solana(_) => ChainKind::Solana,
        }
    }

    /// The raw account bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Evm(b) => b,
            Self::Solana(b) => b,
        }
    }

    /// Parse a direct address from its textual form.
    ///
    /// Accepts the canonical 0x-prefixed hex encoding of an EVM account and
    /// the base58 encoding of a 32-byte Solana account (the one alternate
    /// binary encoding the routing layer understands).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if let Some(hex_part) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            let decoded = hex::decode(hex_part).ok()?;
            let bytes: [u8; 20] = decoded.try_into().ok()?;
            return Some(Self::Evm(bytes));
        }

        // Base58 strings from 32 to 44 characters may be a Solana account.
        if (32..=44).contains(&s.len()) {
            let decoded = bs58::decode(s).into_vec().ok()?;
            let bytes: [u8; 32] = decoded.try_into().ok()?;
            return Some(Self::Solana(bytes));
        }

        None
    }
}

impl fmt::Display for ChainAddress {
    /// Canonical textual form: lowercase 0x-hex for EVM, base58 for Solana.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evm(b) => write!(f, "0x{}", hex::encode(b)),
            Self::Solana(b) => f.write_str(&bs58::encode(b).into_string()),
        }
    }
}

/// A classified claimed identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityKind {
    /// A direct chain address, already in canonical binary form.
    Direct(ChainAddress),
    /// A human-readable chain name that still needs owner resolution.
    Name {
        /// The naming system the name belongs to.
        kind: NameKind,
        /// The name itself, lowercased.
        name: String,
    },
}

impl IdentityKind {
    /// Classify a raw claimed identity string.
    ///
    /// Returns `None` when the string is neither a parseable direct address
    /// nor a name in a known naming system. Literal email addresses are not
    /// chain identities and classify as `None`.
    #[must_use]
    pub fn classify(identity: &str) -> Option<Self> {
        let identity = identity.trim();
        if identity.is_empty() || identity.contains('@') {
            return None;
        }

        let lowered = identity.to_lowercase();
        if let Some(stem) = lowered.strip_suffix(".eth") {
            if is_valid_name_stem(stem) {
                return Some(Self::Name {
                    kind: NameKind::Ens,
                    name: lowered,
                });
            }
            return None;
        }
        if let Some(stem) = lowered.strip_suffix(".sol") {
            if is_valid_name_stem(stem) {
                return Some(Self::Name {
                    kind: NameKind::Sns,
                    name: lowered,
                });
            }
            return None;
        }

        ChainAddress::parse(identity).map(Self::Direct)
    }

    /// The chain the identity lives on.
    #[must_use]
    pub const fn chain(&self) -> ChainKind {
        match self {
            Self::Direct(addr) => addr.kind(),
            Self::Name { kind, .. } => kind.chain(),
        }
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(addr) => addr.fmt(f),
            Self::Name { name, .. } => f.write_str(name),
        }
    }
}

/// Name stems are non-empty label sequences of `[a-z0-9-]`, dot-separated.
fn is_valid_name_stem(stem: &str) -> bool {
    !stem.is_empty()
        && stem.split('.').all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const EVM: &str = "0x52908400098527886e0f7030069857d2e4169ee7";

    #[test]
    fn test_classify_evm_address() {
        let kind = IdentityKind::classify(EVM).unwrap();
        assert!(matches!(kind, IdentityKind::Direct(ChainAddress::Evm(_))));
        assert_eq!(kind.chain(), ChainKind::Evm);
        assert_eq!(kind.to_string(), EVM);
    }

    #[test]
    fn test_classify_evm_mixed_case() {
        let kind = IdentityKind::classify("0x52908400098527886E0F7030069857D2E4169EE7").unwrap();
        // Canonical form is lowercase hex.
        assert_eq!(kind.to_string(), EVM);
    }

    #[test]
    fn test_classify_solana_base58() {
        // 32 bytes of 0x01 in base58.
        let b58 = bs58::encode([1u8; 32]).into_string();
        let kind = IdentityKind::classify(&b58).unwrap();
        assert!(matches!(
            kind,
            IdentityKind::Direct(ChainAddress::Solana(_))
        ));
        assert_eq!(kind.chain(), ChainKind::Solana);
        assert_eq!(kind.to_string(), b58);
    }

    #[test]
    fn test_classify_ens_name() {
        let kind = IdentityKind::classify("Alice.eth").unwrap();
        assert_eq!(
            kind,
            IdentityKind::Name {
                kind: NameKind::Ens,
                name: "alice.eth".to_owned()
            }
        );
        assert_eq!(kind.chain(), ChainKind::Evm);
    }

    #[test]
    fn test_classify_sns_name() {
        let kind = IdentityKind::classify("bob.sol").unwrap();
        assert_eq!(
            kind,
            IdentityKind::Name {
                kind: NameKind::Sns,
                name: "bob.sol".to_owned()
            }
        );
    }

    #[test]
    fn test_classify_rejects_garbage() {
        assert!(IdentityKind::classify("").is_none());
        assert!(IdentityKind::classify("not an identity").is_none());
        assert!(IdentityKind::classify("0x1234").is_none()); // too short
        assert!(IdentityKind::classify(".eth").is_none()); // empty stem
        assert!(IdentityKind::classify("bad name.eth").is_none());
        assert!(IdentityKind::classify("user@example.com").is_none());
    }

    #[test]
    fn test_chain_address_parse_rejects_wrong_lengths() {
        assert!(ChainAddress::parse("0xdeadbeef").is_none());
        let short = bs58::encode([1u8; 16]).into_string();
        assert!(ChainAddress::parse(&short).is_none());
    }
}
