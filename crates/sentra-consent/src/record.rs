//! Consent records and forensic shadow events.

use chrono::{DateTime, Utc};
use sentra_types::{ConsentRecordId, LegalBasis, UserId};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Direction of a consent change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConsentChange {
    /// Consent was granted (or renewed).
    Granted,
    /// Consent was withdrawn.
    Withdrawn,
}

/// One immutable statement of consent for a (user, type) pair.
///
/// Records are never updated or deleted outside the retention purge; the
/// current value is always the most recent record by timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRecord {
    /// Record identifier.
    pub id: ConsentRecordId,
    /// The data subject.
    pub user_id: UserId,
    /// Catalog consent type key.
    pub type_key: String,
    /// Whether consent is granted by this record.
    pub granted: bool,
    /// Catalog version the type definition was read from.
    pub catalog_version: String,
    /// Legal basis of the consent type at write time.
    pub legal_basis: LegalBasis,
    /// Masked client IP.
    pub ip_masked: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Session identifier.
    pub session_id: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

/// Audit-grade shadow record written alongside every [`ConsentRecord`].
///
/// One forensic event per record write, capturing the prior state and the
/// context of the change. A shadow log, not a replacement for the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentForensicEvent {
    /// Event identifier.
    pub id: ConsentRecordId,
    /// The data subject.
    pub user_id: UserId,
    /// The record this event shadows.
    pub record_id: ConsentRecordId,
    /// Direction of the change.
    pub action: ConsentChange,
    /// Snapshot of the previous state, if any record existed.
    pub previous_state: Option<serde_json::Value>,
    /// Snapshot of the new state.
    pub new_state: serde_json::Value,
    /// Minimal diff between the snapshots.
    pub diff: serde_json::Value,
    /// Code path that produced the change
    /// ("grant", "withdraw", "bulk_update", "required_policy_override").
    pub source: String,
    /// How the subject interacted ("api", "web", "background").
    pub interaction_method: String,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}
