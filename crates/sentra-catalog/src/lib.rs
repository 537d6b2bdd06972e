//! Consent type and retention catalogs for Sentra.
//!
//! The catalog is the single source of truth for consent type definitions,
//! export categories, the restriction-type to processing-activity mapping,
//! and retention schedules. Built-in defaults cover every known case;
//! operator-supplied YAML can republish the catalog under a new version.

mod catalog;
mod consent_types;
mod loader;
mod mapping;
mod retention;

pub use catalog::TypeCatalog;
pub use consent_types::ConsentTypeDefinition;
pub use loader::{CatalogError, CatalogLoader};
pub use mapping::ActivityMap;
pub use retention::RetentionSchedule;
