//! SQLite persistence layer for Sentra.
//!
//! Services share one connection behind a mutex. Consent and audit tables
//! are append-only: the only write paths are INSERTs plus two narrowly
//! scoped exceptions, the audit `verified` flag and retention purges.
//! Restrictions and export jobs are ordinary updatable rows.

mod schema;
mod store;

pub use store::{SharedConnection, Store, StoreError};
