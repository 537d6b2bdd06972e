//! The aggregate type catalog.

use crate::{ActivityMap, ConsentTypeDefinition, RetentionSchedule};
use sentra_types::DataCategory;

/// Versioned registry of consent type definitions, export categories, the
/// restriction activity mapping, and retention schedules.
///
/// A catalog is immutable once constructed. Republication produces a new
/// catalog under a new version string; consumers key their caches on
/// [`TypeCatalog::version`] and drop them when it changes.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    version: String,
    consent_types: Vec<ConsentTypeDefinition>,
    export_categories: Vec<DataCategory>,
    activity_map: ActivityMap,
    retention: RetentionSchedule,
}

impl TypeCatalog {
    /// The built-in catalog.
    pub fn builtin() -> Self {
        Self {
            version: "builtin-1".to_string(),
            consent_types: ConsentTypeDefinition::builtin(),
            export_categories: DataCategory::all().collect(),
            activity_map: ActivityMap::builtin(),
            retention: RetentionSchedule::builtin(),
        }
    }

    /// Assemble a catalog from parts (used by the loader).
    pub(crate) fn assemble(
        version: String,
        consent_types: Vec<ConsentTypeDefinition>,
        export_categories: Vec<DataCategory>,
        activity_map: ActivityMap,
        retention: RetentionSchedule,
    ) -> Self {
        Self {
            version,
            consent_types,
            export_categories,
            activity_map,
            retention,
        }
    }

    /// Catalog version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Consent type definitions in presentation order.
    pub fn consent_types(&self) -> &[ConsentTypeDefinition] {
        &self.consent_types
    }

    /// Look up a consent type by key.
    pub fn consent_type(&self, key: &str) -> Option<&ConsentTypeDefinition> {
        self.consent_types.iter().find(|t| t.key == key)
    }

    /// Whether a consent type key exists in this catalog.
    pub fn has_consent_type(&self, key: &str) -> bool {
        self.consent_type(key).is_some()
    }

    /// Export categories available in this catalog.
    pub fn export_categories(&self) -> &[DataCategory] {
        &self.export_categories
    }

    /// Whether an export category is available.
    pub fn has_export_category(&self, category: DataCategory) -> bool {
        self.export_categories.contains(&category)
    }

    /// The restriction-type to activity mapping.
    pub fn activity_map(&self) -> &ActivityMap {
        &self.activity_map
    }

    /// The retention schedule.
    pub fn retention(&self) -> &RetentionSchedule {
        &self.retention
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
