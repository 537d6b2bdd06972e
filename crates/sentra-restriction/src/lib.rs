//! Processing restriction engine for Sentra.
//!
//! Manages the lifecycle of user-initiated processing restrictions and
//! resolves whether a restriction blocks a concrete processing activity
//! through the catalog's type-to-activity mapping.

mod engine;
mod model;

pub use engine::{RestrictionConfig, RestrictionEngine, RestrictionError};
pub use model::{ProcessingRestriction, RestrictionStatus};
