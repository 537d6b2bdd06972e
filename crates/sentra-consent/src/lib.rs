//! Consent registry for Sentra.
//!
//! Consent state is an append-only event store: the current value for a
//! (user, type) pair is the most recent record, falling back to the
//! catalog default when no record exists. Every record write produces a
//! 1:1 forensic shadow event capturing the before/after state.

mod cache;
mod record;
mod registry;
mod status;

pub use cache::{ConsentCache, TtlConsentCache};
pub use record::{ConsentChange, ConsentForensicEvent, ConsentRecord};
pub use registry::{ConsentError, ConsentRegistry, ConsentUpdateOutcome};
pub use status::{ConsentStatistics, ConsentSummary, TypeConsentStatus, UserConsentStatus};
