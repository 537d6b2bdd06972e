//! The audit trail service.

use crate::entry::{AuditLogEntry, IntegrityReport};
use crate::sanitize::sanitize_details;
use chrono::{DateTime, Duration, Utc};
use sentra_catalog::TypeCatalog;
use sentra_store::SharedConnection;
use sentra_types::{
    AuditEntryId, ComplianceAction, ComplianceActor, LegalBasis, RequestContext, UserId,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Audit trail error. Internal to the crate's fallible operations;
/// [`AuditTrail::log`] itself never surfaces one.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("malformed row: {0}")]
    MalformedRow(String),
}

/// Builder for a single audit entry.
#[derive(Debug, Clone)]
pub struct LogRequest {
    action: ComplianceAction,
    legal_basis: LegalBasis,
    details: serde_json::Value,
    user_id: Option<UserId>,
    actor: Option<ComplianceActor>,
    note: Option<String>,
    context: RequestContext,
}

impl LogRequest {
    /// Start a request for the given action and legal basis.
    pub fn new(action: ComplianceAction, legal_basis: LegalBasis) -> Self {
        Self {
            action,
            legal_basis,
            details: serde_json::Value::Null,
            user_id: None,
            actor: None,
            note: None,
            context: RequestContext::background(),
        }
    }

    /// Attach a detail payload (sanitized before hashing and storage).
    pub fn details(mut self, details: impl serde::Serialize) -> Self {
        if let Ok(value) = serde_json::to_value(details) {
            self.details = value;
        }
        self
    }

    /// Attach the data subject.
    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Attach the initiating actor.
    pub fn actor(mut self, actor: ComplianceActor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Attach a compliance note, overriding the action default.
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Attach request context.
    pub fn context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

/// Append-only, hash-verified log of compliance-relevant actions.
pub struct AuditTrail {
    conn: SharedConnection,
    catalog: Arc<TypeCatalog>,
}

impl AuditTrail {
    /// Create a trail over the shared store connection.
    pub fn new(conn: SharedConnection, catalog: Arc<TypeCatalog>) -> Self {
        Self { conn, catalog }
    }

    /// Append an entry.
    ///
    /// Never propagates failure to the caller: the primary action that
    /// triggered the entry must not be blocked by audit trouble. A failed
    /// write is logged through tracing and reported as `None`.
    pub fn log(&self, request: LogRequest) -> Option<AuditLogEntry> {
        match self.try_log(request) {
            Ok(entry) => Some(entry),
            Err(e) => {
                error!("audit write failed: {}", e);
                None
            }
        }
    }

    fn try_log(&self, request: LogRequest) -> Result<AuditLogEntry, AuditError> {
        let created_at = Utc::now();
        let created_at_s = created_at.to_rfc3339();
        let details = sanitize_details(&request.details);
        let ip_masked = request.context.masked_ip();
        let retention_days = self.catalog.retention().days_for(request.action);
        let retention_until = created_at + Duration::days(i64::from(retention_days));
        let note = request
            .note
            .unwrap_or_else(|| request.action.default_note().to_string());

        let content_hash = AuditLogEntry::compute_hash(
            request.actor.as_ref(),
            request.action,
            request.legal_basis,
            &details,
            ip_masked.as_deref(),
            request.context.user_agent.as_deref(),
            &created_at_s,
        );

        let entry = AuditLogEntry {
            id: AuditEntryId::new(),
            actor: request.actor,
            user_id: request.user_id,
            action: request.action,
            legal_basis: request.legal_basis,
            details,
            method: request.context.method.clone(),
            path: request.context.path.clone(),
            ip_masked,
            user_agent: request.context.user_agent.clone(),
            session_id: request.context.session_id.clone(),
            retention_until,
            note,
            content_hash,
            verified: true,
            created_at,
        };

        let actor_json = entry
            .actor
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO audit_entries
             (id, actor, user_id, action, legal_basis, details, method, path,
              ip_masked, user_agent, session_id, retention_until, note,
              content_hash, verified, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            rusqlite::params![
                entry.id.as_uuid().to_string(),
                actor_json,
                entry.user_id.map(|u| u.as_uuid().to_string()),
                entry.action.to_string(),
                entry.legal_basis.to_string(),
                entry.details.to_string(),
                entry.method,
                entry.path,
                entry.ip_masked,
                entry.user_agent,
                entry.session_id,
                entry.retention_until.to_rfc3339(),
                entry.note,
                entry.content_hash,
                entry.verified,
                created_at_s,
            ],
        )?;

        debug!(action = %entry.action, "audit entry appended");
        Ok(entry)
    }

    /// Recompute hashes for the most recent `limit` entries.
    ///
    /// Mismatched entries are flagged `verified = false` and reported;
    /// nothing is ever deleted here.
    pub fn verify_integrity(&self, limit: u32) -> Result<IntegrityReport, AuditError> {
        let entries = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT id, actor, user_id, action, legal_basis, details, method, path,
                        ip_masked, user_agent, session_id, retention_until, note,
                        content_hash, verified, created_at
                 FROM audit_entries
                 ORDER BY created_at DESC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map([limit], row_to_entry)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut report = IntegrityReport {
            checked: entries.len() as u64,
            valid: 0,
            invalid: 0,
            invalid_entries: Vec::new(),
        };

        for entry in entries {
            if entry.verify_hash() {
                report.valid += 1;
            } else {
                report.invalid += 1;
                report.invalid_entries.push(entry.id);
                warn!(entry = %entry.id, "audit entry failed integrity check");
                let conn = self.conn.lock();
                conn.execute(
                    "UPDATE audit_entries SET verified = FALSE WHERE id = ?1",
                    [entry.id.as_uuid().to_string()],
                )?;
            }
        }

        self.log(
            LogRequest::new(ComplianceAction::IntegrityChecked, LegalBasis::LegalObligation)
                .actor(ComplianceActor::system("integrity_check"))
                .details(serde_json::json!({
                    "checked": report.checked,
                    "invalid": report.invalid,
                })),
        );

        Ok(report)
    }

    /// Delete entries past their retention instant, bounded by `limit`.
    ///
    /// The purge run itself is logged; the purge entry carries its own
    /// independent retention window.
    pub fn purge_expired(&self, limit: u32) -> Result<u64, AuditError> {
        let now = Utc::now().to_rfc3339();
        let ids: Vec<String> = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT id FROM audit_entries WHERE retention_until < ?1
                 ORDER BY retention_until ASC LIMIT ?2",
            )?;
            let rows = stmt.query_map(rusqlite::params![now, limit], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        if ids.is_empty() {
            return Ok(0);
        }

        let mut purged = 0u64;
        {
            let conn = self.conn.lock();
            for id in &ids {
                purged += conn.execute("DELETE FROM audit_entries WHERE id = ?1", [id])? as u64;
            }
        }

        self.log(
            LogRequest::new(ComplianceAction::AuditPurged, LegalBasis::LegalObligation)
                .actor(ComplianceActor::system("retention_sweep"))
                .details(serde_json::json!({ "purged": purged })),
        );

        Ok(purged)
    }

    /// Entries concerning one data subject, most recent first.
    pub fn entries_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, actor, user_id, action, legal_basis, details, method, path,
                    ip_masked, user_agent, session_id, retention_until, note,
                    content_hash, verified, created_at
             FROM audit_entries
             WHERE user_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![user_id.as_uuid().to_string(), limit],
            row_to_entry,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditLogEntry> {
    let id_s: String = row.get(0)?;
    let actor_s: Option<String> = row.get(1)?;
    let user_s: Option<String> = row.get(2)?;
    let action_s: String = row.get(3)?;
    let legal_s: String = row.get(4)?;
    let details_s: String = row.get(5)?;
    let retention_s: String = row.get(11)?;
    let created_s: String = row.get(15)?;

    Ok(AuditLogEntry {
        id: parse_col(0, AuditEntryId::parse(&id_s))?,
        actor: match actor_s {
            Some(s) => Some(parse_col(1, serde_json::from_str(&s).ok())?),
            None => None,
        },
        user_id: match user_s {
            Some(s) => Some(parse_col(2, UserId::parse(&s))?),
            None => None,
        },
        action: parse_col(3, action_s.parse().ok())?,
        legal_basis: parse_col(4, legal_s.parse().ok())?,
        details: parse_col(5, serde_json::from_str(&details_s).ok())?,
        method: row.get(6)?,
        path: row.get(7)?,
        ip_masked: row.get(8)?,
        user_agent: row.get(9)?,
        session_id: row.get(10)?,
        retention_until: parse_col(11, parse_rfc3339(&retention_s))?,
        note: row.get(12)?,
        content_hash: row.get(13)?,
        verified: row.get(14)?,
        created_at: parse_col(15, parse_rfc3339(&created_s))?,
    })
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_col<T>(index: usize, value: Option<T>) -> rusqlite::Result<T> {
    value.ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            "malformed column".into(),
        )
    })
}
