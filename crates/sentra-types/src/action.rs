//! Compliance-relevant actions recorded in the audit trail.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Specific actions that the audit trail records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComplianceAction {
    // Consent
    ConsentGranted,
    ConsentWithdrawn,
    ConsentRenewed,
    ConsentBulkUpdated,

    // Processing restrictions
    RestrictionCreated,
    RestrictionRemoved,
    RestrictionExpired,

    // Data exports
    ExportRequested,
    ExportCompleted,
    ExportFailed,
    ExportDownloaded,
    ExportExpired,

    // Subject data access
    DataAccessed,
    DataRectified,
    DataErased,

    // Trail maintenance
    AuditPurged,
    IntegrityChecked,
}

impl ComplianceAction {
    /// Iterate over every action.
    pub fn all() -> impl Iterator<Item = Self> {
        use strum::IntoEnumIterator;
        Self::iter()
    }

    /// Default compliance note attached when the caller supplies none.
    pub fn default_note(&self) -> &'static str {
        match self {
            Self::ConsentGranted => "Consent granted by data subject",
            Self::ConsentWithdrawn => "Consent withdrawn by data subject",
            Self::ConsentRenewed => "Consent renewed by data subject",
            Self::ConsentBulkUpdated => "Consent preferences updated by data subject",
            Self::RestrictionCreated => "Processing restriction requested (Article 18)",
            Self::RestrictionRemoved => "Processing restriction lifted",
            Self::RestrictionExpired => "Processing restriction expired automatically",
            Self::ExportRequested => "Data portability export requested (Article 20)",
            Self::ExportCompleted => "Data portability export generated",
            Self::ExportFailed => "Data portability export failed",
            Self::ExportDownloaded => "Data portability export downloaded",
            Self::ExportExpired => "Data portability export expired",
            Self::DataAccessed => "Subject access performed (Article 15)",
            Self::DataRectified => "Subject data rectified (Article 16)",
            Self::DataErased => "Subject data erased (Article 17)",
            Self::AuditPurged => "Expired audit entries purged per retention schedule",
            Self::IntegrityChecked => "Audit trail integrity verification executed",
        }
    }
}
