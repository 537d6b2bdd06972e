//! Read-side consent status projections.

use chrono::{DateTime, Utc};
use sentra_types::LegalBasis;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Consent status for one catalog type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeConsentStatus {
    /// Catalog consent type key.
    pub key: String,
    /// Human-readable name.
    pub name: String,
    /// Description shown to the subject.
    pub description: String,
    /// Effective granted value (explicit record or catalog default).
    pub granted: bool,
    /// Whether an explicit record exists (false means catalog default).
    pub explicit: bool,
    /// Legal basis of the type.
    pub legal_basis: LegalBasis,
    /// Whether the type is required.
    pub required: bool,
    /// Whether the subject may withdraw.
    pub can_withdraw: bool,
    /// When the effective record was created, if explicit.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Summary across all catalog types for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentSummary {
    /// Types in the catalog.
    pub total_types: usize,
    /// Types currently granted.
    pub granted_count: usize,
    /// Types with an explicit record.
    pub explicit_count: usize,
    /// Catalog version the status was computed against.
    pub catalog_version: String,
}

/// Full consent status for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConsentStatus {
    /// Per-type status in catalog order.
    pub per_type: Vec<TypeConsentStatus>,
    /// Aggregate summary.
    pub summary: ConsentSummary,
}

/// Aggregate consent statistics across all subjects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentStatistics {
    /// Distinct subjects with at least one record.
    pub total_subjects: u64,
    /// Total consent records written.
    pub total_records: u64,
    /// Records granting consent.
    pub grants: u64,
    /// Records withdrawing consent.
    pub withdrawals: u64,
    /// Per-type record counts.
    pub by_type: HashMap<String, u64>,
}
