//! Mailcove Core - Shared types library.
//!
//! This crate provides common types used across all Mailcove components:
//! - `identity` - Address routing and authentication core
//! - protocol front-ends (IMAP/POP3/SMTP) built on top of it
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no network clients. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, email addresses, auth
//!   scopes, and chain identities

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
