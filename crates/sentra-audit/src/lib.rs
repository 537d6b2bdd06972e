//! Tamper-evident compliance audit trail for Sentra.
//!
//! Entries are append-only rows carrying a content hash computed at write
//! time over a fixed field tuple. Verification recomputes hashes and flags
//! mismatches; it never deletes. Retention arithmetic comes from the
//! catalog's schedule, and a parallel classified activity stream carries
//! its own per-level retention windows.

mod activity;
mod entry;
mod sanitize;
mod trail;

pub use activity::{ActivityCategory, ActivityError, ActivityEvent, ActivityRecorder, PrivacyLevel};
pub use entry::{AuditLogEntry, IntegrityReport};
pub use sanitize::sanitize_details;
pub use trail::{AuditError, AuditTrail, LogRequest};
