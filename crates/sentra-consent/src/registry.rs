//! The consent registry service.

use crate::cache::ConsentCache;
use crate::record::{ConsentChange, ConsentForensicEvent, ConsentRecord};
use crate::status::{ConsentStatistics, ConsentSummary, TypeConsentStatus, UserConsentStatus};
use chrono::{DateTime, Utc};
use sentra_audit::{AuditTrail, LogRequest};
use sentra_catalog::{ConsentTypeDefinition, TypeCatalog};
use sentra_store::SharedConnection;
use sentra_types::{
    ComplianceAction, ComplianceActor, ConsentRecordId, NotificationEvent, Notifier,
    RequestContext, UserId,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Consent registry error.
#[derive(Debug, Error)]
pub enum ConsentError {
    #[error("unknown consent type: {key}")]
    UnknownType { key: String },
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outcome of a bulk consent update.
#[derive(Debug, Clone)]
pub struct ConsentUpdateOutcome {
    /// Effective values before the update, per type key.
    pub previous: HashMap<String, bool>,
    /// Effective values after the update, per type key.
    pub current: HashMap<String, bool>,
    /// Keys whose value actually changed.
    pub changes: Vec<String>,
}

/// Computes and mutates per-user consent state against the type catalog.
pub struct ConsentRegistry {
    conn: SharedConnection,
    catalog: Arc<TypeCatalog>,
    trail: Arc<AuditTrail>,
    cache: Arc<dyn ConsentCache>,
    notifier: Arc<dyn Notifier>,
}

impl ConsentRegistry {
    /// Create a registry.
    pub fn new(
        conn: SharedConnection,
        catalog: Arc<TypeCatalog>,
        trail: Arc<AuditTrail>,
        cache: Arc<dyn ConsentCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            conn,
            catalog,
            trail,
            cache,
            notifier,
        }
    }

    /// Consent type definitions in catalog order.
    pub fn consent_types(&self) -> &[ConsentTypeDefinition] {
        self.catalog.consent_types()
    }

    /// Full per-type consent status for a user.
    pub fn user_consent_status(&self, user: UserId) -> Result<UserConsentStatus, ConsentError> {
        let mut per_type = Vec::with_capacity(self.catalog.consent_types().len());
        for def in self.catalog.consent_types() {
            let latest = self.latest_record(user, &def.key)?;
            let (granted, explicit, updated_at) = match &latest {
                Some(record) => (record.granted, true, Some(record.created_at)),
                None => (def.default_granted, false, None),
            };
            per_type.push(TypeConsentStatus {
                key: def.key.clone(),
                name: def.name.clone(),
                description: def.description.clone(),
                granted,
                explicit,
                legal_basis: def.legal_basis,
                required: def.required,
                can_withdraw: def.can_withdraw,
                updated_at,
            });
        }

        let summary = ConsentSummary {
            total_types: per_type.len(),
            granted_count: per_type.iter().filter(|t| t.granted).count(),
            explicit_count: per_type.iter().filter(|t| t.explicit).count(),
            catalog_version: self.catalog.version().to_string(),
        };

        Ok(UserConsentStatus { per_type, summary })
    }

    /// Whether the user currently consents to `type_key`.
    ///
    /// Cached with a short TTL; the cache entry for the key is dropped on
    /// every write for that (user, type) pair.
    pub fn has_consent(&self, user: UserId, type_key: &str) -> Result<bool, ConsentError> {
        let def = self.definition(type_key)?;
        if let Some(granted) = self.cache.get(user, type_key) {
            return Ok(granted);
        }
        let granted = match self.latest_record(user, type_key)? {
            Some(record) => record.granted,
            None => def.default_granted,
        };
        self.cache.put(user, type_key, granted);
        Ok(granted)
    }

    /// Grant consent for one type. Writes one record and one forensic
    /// event; returns true when a record was written.
    pub fn grant_consent(
        &self,
        user: UserId,
        type_key: &str,
        ctx: &RequestContext,
    ) -> Result<bool, ConsentError> {
        let def = self.definition(type_key)?.clone();
        self.apply_change(
            user,
            &def,
            true,
            ConsentChange::Granted,
            ComplianceAction::ConsentGranted,
            "grant",
            ctx,
        )?;
        Ok(true)
    }

    /// Withdraw consent for one type.
    ///
    /// A required type cannot be set to false: the write is overridden to
    /// granted before persistence and the forensic event records the
    /// override. A non-withdrawable (but not required) type is a no-op
    /// returning false, with no record written.
    pub fn withdraw_consent(
        &self,
        user: UserId,
        type_key: &str,
        ctx: &RequestContext,
    ) -> Result<bool, ConsentError> {
        let def = self.definition(type_key)?.clone();

        if def.required {
            self.apply_change(
                user,
                &def,
                true,
                ConsentChange::Granted,
                ComplianceAction::ConsentWithdrawn,
                "required_policy_override",
                ctx,
            )?;
            return Ok(true);
        }

        if !def.can_withdraw {
            debug!(type_key, "withdrawal rejected: type is not withdrawable");
            return Ok(false);
        }

        self.apply_change(
            user,
            &def,
            false,
            ConsentChange::Withdrawn,
            ComplianceAction::ConsentWithdrawn,
            "withdraw",
            ctx,
        )?;
        Ok(true)
    }

    /// Renew a previously granted consent (alias of grant, audited as a
    /// renewal).
    pub fn renew_consent(
        &self,
        user: UserId,
        type_key: &str,
        ctx: &RequestContext,
    ) -> Result<bool, ConsentError> {
        let def = self.definition(type_key)?.clone();
        self.apply_change(
            user,
            &def,
            true,
            ConsentChange::Granted,
            ComplianceAction::ConsentRenewed,
            "renew",
            ctx,
        )?;
        Ok(true)
    }

    /// Apply a map of consent values in one pass.
    ///
    /// Every key is validated against the catalog before anything is
    /// written; one unknown key rejects the whole request. For each value
    /// that differs from the current effective state, one record and one
    /// forensic event are written.
    pub fn update_user_consents(
        &self,
        user: UserId,
        requested: &HashMap<String, bool>,
        ctx: &RequestContext,
    ) -> Result<ConsentUpdateOutcome, ConsentError> {
        // Validate everything up front so a bad key writes nothing.
        for key in requested.keys() {
            self.definition(key)?;
        }

        let mut previous = HashMap::new();
        let mut current = HashMap::new();
        let mut changes = Vec::new();

        for (key, &value) in requested {
            let def = self.definition(key)?.clone();
            let before = match self.latest_record(user, key)? {
                Some(record) => record.granted,
                None => def.default_granted,
            };
            previous.insert(key.clone(), before);

            // A required type never goes false; a non-withdrawable type
            // silently keeps its granted state.
            let effective = if def.required { true } else { value };
            if !effective && !def.can_withdraw {
                current.insert(key.clone(), before);
                continue;
            }

            if effective == before {
                current.insert(key.clone(), before);
                continue;
            }

            let (change, source) = if effective {
                let source = if def.required && !value {
                    "required_policy_override"
                } else {
                    "bulk_update"
                };
                (ConsentChange::Granted, source)
            } else {
                (ConsentChange::Withdrawn, "bulk_update")
            };
            let action = if effective {
                ComplianceAction::ConsentGranted
            } else {
                ComplianceAction::ConsentWithdrawn
            };
            self.apply_change(user, &def, effective, change, action, source, ctx)?;
            current.insert(key.clone(), effective);
            changes.push(key.clone());
        }

        if !changes.is_empty() {
            self.trail.log(
                LogRequest::new(
                    ComplianceAction::ConsentBulkUpdated,
                    sentra_types::LegalBasis::Consent,
                )
                .user(user)
                .actor(ComplianceActor::user(user))
                .details(json!({ "changed_keys": changes }))
                .context(ctx.clone()),
            );
        }

        Ok(ConsentUpdateOutcome {
            previous,
            current,
            changes,
        })
    }

    /// Aggregate statistics over all consent records.
    pub fn consent_statistics(&self) -> Result<ConsentStatistics, ConsentError> {
        let conn = self.conn.lock();
        let (total_subjects, total_records, grants): (u64, u64, u64) = conn.query_row(
            "SELECT COUNT(DISTINCT user_id), COUNT(*), COALESCE(SUM(granted), 0)
             FROM consent_records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let mut by_type = HashMap::new();
        let mut stmt =
            conn.prepare("SELECT type_key, COUNT(*) FROM consent_records GROUP BY type_key")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?;
        for row in rows {
            let (key, count) = row?;
            by_type.insert(key, count);
        }

        Ok(ConsentStatistics {
            total_subjects,
            total_records,
            grants,
            withdrawals: total_records - grants,
            by_type,
        })
    }

    fn definition(&self, type_key: &str) -> Result<&ConsentTypeDefinition, ConsentError> {
        self.catalog
            .consent_type(type_key)
            .ok_or_else(|| ConsentError::UnknownType {
                key: type_key.to_string(),
            })
    }

    /// Latest record for a (user, type) pair, if any.
    fn latest_record(
        &self,
        user: UserId,
        type_key: &str,
    ) -> Result<Option<ConsentRecord>, ConsentError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, type_key, granted, catalog_version, legal_basis,
                    ip_masked, user_agent, session_id, created_at
             FROM consent_records
             WHERE user_id = ?1 AND type_key = ?2
             ORDER BY created_at DESC
             LIMIT 1",
        )?;
        let mut rows = stmt.query_map(
            rusqlite::params![user.as_uuid().to_string(), type_key],
            row_to_record,
        )?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Write one record and its forensic shadow event atomically, then
    /// invalidate the cache and emit the audit/notification side effects.
    fn apply_change(
        &self,
        user: UserId,
        def: &ConsentTypeDefinition,
        granted: bool,
        change: ConsentChange,
        action: ComplianceAction,
        source: &str,
        ctx: &RequestContext,
    ) -> Result<ConsentRecord, ConsentError> {
        let previous = self.latest_record(user, &def.key)?;
        let created_at = Utc::now();

        let record = ConsentRecord {
            id: ConsentRecordId::new(),
            user_id: user,
            type_key: def.key.clone(),
            granted,
            catalog_version: self.catalog.version().to_string(),
            legal_basis: def.legal_basis,
            ip_masked: ctx.masked_ip(),
            user_agent: ctx.user_agent.clone(),
            session_id: ctx.session_id.clone(),
            created_at,
        };

        let previous_state = previous.as_ref().map(|p| {
            json!({
                "granted": p.granted,
                "record_id": p.id.as_uuid().to_string(),
                "created_at": p.created_at.to_rfc3339(),
            })
        });
        let new_state = json!({
            "granted": granted,
            "record_id": record.id.as_uuid().to_string(),
            "created_at": created_at.to_rfc3339(),
        });
        let diff = json!({
            "granted": {
                "from": previous.as_ref().map(|p| p.granted),
                "to": granted,
            }
        });

        let forensic = ConsentForensicEvent {
            id: ConsentRecordId::new(),
            user_id: user,
            record_id: record.id,
            action: change,
            previous_state,
            new_state,
            diff,
            source: source.to_string(),
            interaction_method: if ctx.session_id.is_some() { "web" } else { "api" }.to_string(),
            created_at,
        };

        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO consent_records
                 (id, user_id, type_key, granted, catalog_version, legal_basis,
                  ip_masked, user_agent, session_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    record.id.as_uuid().to_string(),
                    record.user_id.as_uuid().to_string(),
                    record.type_key,
                    record.granted,
                    record.catalog_version,
                    record.legal_basis.to_string(),
                    record.ip_masked,
                    record.user_agent,
                    record.session_id,
                    record.created_at.to_rfc3339(),
                ],
            )?;
            tx.execute(
                "INSERT INTO consent_forensics
                 (id, user_id, record_id, action, previous_state, new_state, diff,
                  source, interaction_method, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    forensic.id.as_uuid().to_string(),
                    forensic.user_id.as_uuid().to_string(),
                    forensic.record_id.as_uuid().to_string(),
                    forensic.action.to_string(),
                    forensic
                        .previous_state
                        .as_ref()
                        .map(|v| v.to_string()),
                    forensic.new_state.to_string(),
                    forensic.diff.to_string(),
                    forensic.source,
                    forensic.interaction_method,
                    forensic.created_at.to_rfc3339(),
                ],
            )?;
            tx.commit()?;
        }

        self.cache.invalidate(user, &def.key);

        // Side effects are best-effort: the consent write already
        // committed and must not be rolled back by audit or notification
        // trouble.
        self.trail.log(
            LogRequest::new(action, def.legal_basis)
                .user(user)
                .actor(ComplianceActor::user(user))
                .details(json!({
                    "type_key": def.key,
                    "granted": granted,
                    "source": source,
                }))
                .context(ctx.clone()),
        );
        self.notifier.notify(
            user,
            NotificationEvent::new(
                "consent_updated",
                json!({ "type_key": def.key, "granted": granted }),
            ),
        );

        debug!(type_key = %def.key, granted, "consent record written");
        Ok(record)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConsentRecord> {
    let id_s: String = row.get(0)?;
    let user_s: String = row.get(1)?;
    let legal_s: String = row.get(5)?;
    let created_s: String = row.get(9)?;
    Ok(ConsentRecord {
        id: ConsentRecordId::parse(&id_s).unwrap_or_default(),
        user_id: UserId::parse(&user_s).unwrap_or_default(),
        type_key: row.get(2)?,
        granted: row.get(3)?,
        catalog_version: row.get(4)?,
        legal_basis: legal_s
            .parse()
            .unwrap_or(sentra_types::LegalBasis::Consent),
        ip_masked: row.get(6)?,
        user_agent: row.get(7)?,
        session_id: row.get(8)?,
        created_at: DateTime::parse_from_rfc3339(&created_s)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlConsentCache;
    use sentra_store::Store;
    use sentra_types::NoopNotifier;

    fn registry() -> (Store, ConsentRegistry) {
        let store = Store::open_in_memory().unwrap();
        let catalog = Arc::new(TypeCatalog::builtin());
        let trail = Arc::new(AuditTrail::new(store.connection(), Arc::clone(&catalog)));
        let registry = ConsentRegistry::new(
            store.connection(),
            catalog,
            trail,
            Arc::new(TtlConsentCache::default()),
            Arc::new(NoopNotifier),
        );
        (store, registry)
    }

    fn ctx() -> RequestContext {
        RequestContext::background()
            .with_ip_address("203.0.113.9".parse().unwrap())
            .with_user_agent("test/1.0")
    }

    #[test]
    fn test_default_fallback_without_records() {
        let (_store, registry) = registry();
        let user = UserId::new();
        assert!(!registry.has_consent(user, "analytics").unwrap());
        assert!(registry.has_consent(user, "terms-of-service").unwrap());
    }

    #[test]
    fn test_unknown_type_is_validation_error() {
        let (_store, registry) = registry();
        let user = UserId::new();
        assert!(matches!(
            registry.has_consent(user, "nope"),
            Err(ConsentError::UnknownType { .. })
        ));
        let mut requested = HashMap::new();
        requested.insert("nope".to_string(), true);
        assert!(registry
            .update_user_consents(user, &requested, &ctx())
            .is_err());
    }

    #[test]
    fn test_grant_then_withdraw_analytics() {
        let (_store, registry) = registry();
        let user = UserId::new();

        assert!(registry.grant_consent(user, "analytics", &ctx()).unwrap());
        assert!(registry.has_consent(user, "analytics").unwrap());

        assert!(registry.withdraw_consent(user, "analytics", &ctx()).unwrap());
        assert!(!registry.has_consent(user, "analytics").unwrap());
    }

    #[test]
    fn test_latest_record_wins() {
        let (_store, registry) = registry();
        let user = UserId::new();
        registry.grant_consent(user, "marketing", &ctx()).unwrap();
        registry.withdraw_consent(user, "marketing", &ctx()).unwrap();
        registry.grant_consent(user, "marketing", &ctx()).unwrap();
        assert!(registry.has_consent(user, "marketing").unwrap());

        let status = registry.user_consent_status(user).unwrap();
        let marketing = status
            .per_type
            .iter()
            .find(|t| t.key == "marketing")
            .unwrap();
        assert!(marketing.granted);
        assert!(marketing.explicit);
    }

    #[test]
    fn test_required_withdrawal_forced_true() {
        let (store, registry) = registry();
        let user = UserId::new();

        assert!(registry
            .withdraw_consent(user, "terms-of-service", &ctx())
            .unwrap());
        assert!(registry.has_consent(user, "terms-of-service").unwrap());

        // The attempt is persisted, granted=true, with the override source
        // recorded in the forensic shadow.
        let conn = store.connection();
        let conn = conn.lock();
        let (granted, source): (bool, String) = conn
            .query_row(
                "SELECT r.granted, f.source
                 FROM consent_records r JOIN consent_forensics f ON f.record_id = r.id
                 WHERE r.user_id = ?1 AND r.type_key = 'terms-of-service'",
                [user.as_uuid().to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert!(granted);
        assert_eq!(source, "required_policy_override");
    }

    #[test]
    fn test_every_record_has_forensic_shadow() {
        let (store, registry) = registry();
        let user = UserId::new();
        registry.grant_consent(user, "analytics", &ctx()).unwrap();
        registry.withdraw_consent(user, "analytics", &ctx()).unwrap();
        registry.renew_consent(user, "analytics", &ctx()).unwrap();

        let conn = store.connection();
        let conn = conn.lock();
        let (records, forensics): (i64, i64) = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM consent_records),
                        (SELECT COUNT(*) FROM consent_forensics)",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(records, 3);
        assert_eq!(forensics, 3);
    }

    #[test]
    fn test_forensic_captures_prior_state() {
        let (store, registry) = registry();
        let user = UserId::new();
        registry.grant_consent(user, "analytics", &ctx()).unwrap();
        registry.withdraw_consent(user, "analytics", &ctx()).unwrap();

        let conn = store.connection();
        let conn = conn.lock();
        let previous: Option<String> = conn
            .query_row(
                "SELECT previous_state FROM consent_forensics
                 WHERE action = 'withdrawn' AND user_id = ?1",
                [user.as_uuid().to_string()],
                |row| row.get(0),
            )
            .unwrap();
        let previous: serde_json::Value =
            serde_json::from_str(&previous.unwrap()).unwrap();
        assert_eq!(previous["granted"], true);
    }

    #[test]
    fn test_bulk_update_writes_only_changes() {
        let (store, registry) = registry();
        let user = UserId::new();

        let mut requested = HashMap::new();
        requested.insert("analytics".to_string(), true);
        requested.insert("marketing".to_string(), false); // already the default
        let outcome = registry
            .update_user_consents(user, &requested, &ctx())
            .unwrap();

        assert_eq!(outcome.changes, vec!["analytics".to_string()]);
        assert_eq!(outcome.previous["analytics"], false);
        assert_eq!(outcome.current["analytics"], true);
        assert_eq!(outcome.current["marketing"], false);

        let conn = store.connection();
        let conn = conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM consent_records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_cache_invalidated_on_write() {
        let (_store, registry) = registry();
        let user = UserId::new();
        // Prime the cache with the default.
        assert!(!registry.has_consent(user, "analytics").unwrap());
        registry.grant_consent(user, "analytics", &ctx()).unwrap();
        assert!(registry.has_consent(user, "analytics").unwrap());
    }

    #[test]
    fn test_statistics() {
        let (_store, registry) = registry();
        let a = UserId::new();
        let b = UserId::new();
        registry.grant_consent(a, "analytics", &ctx()).unwrap();
        registry.grant_consent(b, "analytics", &ctx()).unwrap();
        registry.withdraw_consent(b, "analytics", &ctx()).unwrap();

        let stats = registry.consent_statistics().unwrap();
        assert_eq!(stats.total_subjects, 2);
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.grants, 2);
        assert_eq!(stats.withdrawals, 1);
        assert_eq!(stats.by_type["analytics"], 3);
    }
}
