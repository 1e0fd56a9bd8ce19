//! Mailcove Identity - address routing and authentication core.
//!
//! This library decides which account owns an inbound address and whether a
//! claimed identity may authenticate for a given access scope. Protocol
//! front-ends (IMAP/POP3/SMTP) collect credentials and call into this crate;
//! the administrative API and message storage live elsewhere.
//!
//! # Architecture
//!
//! - [`services::AddressResolver`] - exact / alias / wildcard / catch-all
//!   address matching with deterministic tie-breaking, plus implicit account
//!   provisioning on first contact
//! - [`services::AuthService`] - the authentication orchestrator: rate
//!   limiting, replay-protected signature verification, scope enforcement
//! - [`services::RateLimiter`] - two independent sliding counters (per-IP,
//!   per-identity) over an atomic counter store, failing open on outages
//! - [`store`] - async traits over the two backing stores, with `PostgreSQL`
//!   and Redis implementations in [`db`] and in-memory implementations for
//!   tests and embedders
//! - [`chain`] - pluggable signature verification and on-chain name
//!   resolution; the cryptography itself lives behind these traits

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod chain;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod store;

pub use config::{IdentityConfig, RateLimitConfig};
pub use services::auth::{AuthError, AuthRequest, AuthService, AuthSuccess, PreAuthInfo};
pub use services::resolver::{AddressResolver, ResolveError, ResolveOptions, ResolvedAccount};
