//! Audit log entry and content hashing.

use chrono::{DateTime, Utc};
use sentra_types::{AuditEntryId, ComplianceAction, ComplianceActor, LegalBasis, UserId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single immutable audit trail entry.
///
/// The content hash is computed once at write time; afterwards only the
/// `verified` flag may change, and only from `true` to `false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Entry identifier.
    pub id: AuditEntryId,
    /// Who performed the action, when attributable.
    pub actor: Option<ComplianceActor>,
    /// The data subject the action concerns, if any.
    pub user_id: Option<UserId>,
    /// The audited action.
    pub action: ComplianceAction,
    /// Legal basis under which the action was performed.
    pub legal_basis: LegalBasis,
    /// Sanitized context payload.
    pub details: serde_json::Value,
    /// HTTP method of the triggering request, if any.
    pub method: Option<String>,
    /// Request path of the triggering request, if any.
    pub path: Option<String>,
    /// Masked client IP.
    pub ip_masked: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Session identifier.
    pub session_id: Option<String>,
    /// Instant after which the entry may be purged.
    pub retention_until: DateTime<Utc>,
    /// Compliance note (caller-supplied or the action default).
    pub note: String,
    /// Content hash over the canonical field tuple.
    pub content_hash: String,
    /// False once an integrity check found a hash mismatch.
    pub verified: bool,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Compute the content hash over the canonical field tuple.
    ///
    /// The tuple is (actor identifier, action, legal basis, details JSON,
    /// masked ip, user agent, creation timestamp), in that order, each
    /// field followed by a unit separator so adjacent fields cannot be
    /// confused. Detail objects serialize with sorted keys, which makes
    /// the JSON form canonical.
    pub fn compute_hash(
        actor: Option<&ComplianceActor>,
        action: ComplianceAction,
        legal_basis: LegalBasis,
        details: &serde_json::Value,
        ip_masked: Option<&str>,
        user_agent: Option<&str>,
        created_at_rfc3339: &str,
    ) -> String {
        let actor_part = actor.map(|a| a.identifier()).unwrap_or_default();
        let details_part = details.to_string();

        let mut hasher = Sha256::new();
        for part in [
            actor_part.as_str(),
            &action.to_string(),
            &legal_basis.to_string(),
            &details_part,
            ip_masked.unwrap_or(""),
            user_agent.unwrap_or(""),
            created_at_rfc3339,
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Recompute the hash from this entry's stored fields and compare.
    pub fn verify_hash(&self) -> bool {
        let computed = Self::compute_hash(
            self.actor.as_ref(),
            self.action,
            self.legal_basis,
            &self.details,
            self.ip_masked.as_deref(),
            self.user_agent.as_deref(),
            &self.created_at.to_rfc3339(),
        );
        computed == self.content_hash
    }
}

/// Result of an integrity verification pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Entries examined.
    pub checked: u64,
    /// Entries whose hash matched.
    pub valid: u64,
    /// Entries whose hash did not match.
    pub invalid: u64,
    /// Identifiers of the mismatched entries.
    pub invalid_entries: Vec<AuditEntryId>,
}

impl IntegrityReport {
    /// Whether every checked entry verified.
    pub fn is_clean(&self) -> bool {
        self.invalid == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_entry() -> AuditLogEntry {
        let created_at = Utc::now();
        let details = json!({"field": "value"});
        let hash = AuditLogEntry::compute_hash(
            None,
            ComplianceAction::ConsentGranted,
            LegalBasis::Consent,
            &details,
            Some("203.0.113.0"),
            Some("agent/1.0"),
            &created_at.to_rfc3339(),
        );
        AuditLogEntry {
            id: AuditEntryId::new(),
            actor: None,
            user_id: None,
            action: ComplianceAction::ConsentGranted,
            legal_basis: LegalBasis::Consent,
            details,
            method: None,
            path: None,
            ip_masked: Some("203.0.113.0".to_string()),
            user_agent: Some("agent/1.0".to_string()),
            session_id: None,
            retention_until: created_at,
            note: String::new(),
            content_hash: hash,
            verified: true,
            created_at,
        }
    }

    #[test]
    fn test_untouched_entry_verifies() {
        assert!(sample_entry().verify_hash());
    }

    #[test]
    fn test_mutating_any_hashed_field_breaks_verification() {
        let mut entry = sample_entry();
        entry.details = json!({"field": "tampered"});
        assert!(!entry.verify_hash());

        let mut entry = sample_entry();
        entry.legal_basis = LegalBasis::Contract;
        assert!(!entry.verify_hash());

        let mut entry = sample_entry();
        entry.ip_masked = Some("198.51.100.0".to_string());
        assert!(!entry.verify_hash());
    }

    #[test]
    fn test_unhashed_fields_do_not_affect_verification() {
        let mut entry = sample_entry();
        entry.note = "operator annotation".to_string();
        entry.session_id = Some("s-123".to_string());
        assert!(entry.verify_hash());
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        // "ab" + "c" must not hash like "a" + "bc".
        let ts = Utc::now().to_rfc3339();
        let h1 = AuditLogEntry::compute_hash(
            None,
            ComplianceAction::DataAccessed,
            LegalBasis::Consent,
            &json!(null),
            Some("ab"),
            Some("c"),
            &ts,
        );
        let h2 = AuditLogEntry::compute_hash(
            None,
            ComplianceAction::DataAccessed,
            LegalBasis::Consent,
            &json!(null),
            Some("a"),
            Some("bc"),
            &ts,
        );
        assert_ne!(h1, h2);
    }
}
