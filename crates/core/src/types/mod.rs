//! Core types for Mailcove.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod id;
pub mod identity;
pub mod scope;

pub use address::{AddressError, EmailAddress};
pub use id::*;
pub use identity::{ChainAddress, ChainKind, IdentityKind, NameKind};
pub use scope::{AuthScope, ScopeError};
