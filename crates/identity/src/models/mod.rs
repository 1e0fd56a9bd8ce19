//! Domain types for the identity core.
//!
//! These are validated in-memory representations; row types for the database
//! live next to the queries in [`crate::db`].

pub mod address;
pub mod audit;
pub mod user;

pub use address::{Address, DomainAlias, NewAddress};
pub use audit::{AuditAction, AuditRecord, AuditResult};
pub use user::{ChainAuth, NewUser, User};
