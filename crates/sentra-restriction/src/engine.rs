//! The restriction engine service.

use crate::model::{ProcessingRestriction, RestrictionStatus};
use chrono::{DateTime, Duration, Utc};
use sentra_audit::{AuditTrail, LogRequest};
use sentra_catalog::TypeCatalog;
use sentra_store::SharedConnection;
use sentra_types::{
    ComplianceAction, ComplianceActor, DataCategory, LegalBasis, NotificationEvent, Notifier,
    RequestContext, RestrictionId, RestrictionReason, RestrictionType, UserId,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Restriction engine error.
#[derive(Debug, Error)]
pub enum RestrictionError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct RestrictionConfig {
    /// Maximum simultaneously active restrictions per user.
    pub max_active: u32,
    /// Automatic expiry applied to new restrictions, if any.
    pub auto_expiry_days: Option<u32>,
}

impl Default for RestrictionConfig {
    fn default() -> Self {
        Self {
            max_active: 5,
            auto_expiry_days: None,
        }
    }
}

/// Manages processing restriction lifecycles and activity resolution.
pub struct RestrictionEngine {
    conn: SharedConnection,
    catalog: Arc<TypeCatalog>,
    trail: Arc<AuditTrail>,
    notifier: Arc<dyn Notifier>,
    config: RestrictionConfig,
}

impl RestrictionEngine {
    /// Create an engine.
    pub fn new(
        conn: SharedConnection,
        catalog: Arc<TypeCatalog>,
        trail: Arc<AuditTrail>,
        notifier: Arc<dyn Notifier>,
        config: RestrictionConfig,
    ) -> Self {
        Self {
            conn,
            catalog,
            trail,
            notifier,
            config,
        }
    }

    /// Whether the user already holds the maximum number of active
    /// restrictions.
    pub fn has_reached_limit(&self, user: UserId) -> Result<bool, RestrictionError> {
        let conn = self.conn.lock();
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM restrictions WHERE user_id = ?1 AND status = 'active'",
            [user.as_uuid().to_string()],
            |row| row.get(0),
        )?;
        Ok(count >= self.config.max_active)
    }

    /// Create a restriction.
    ///
    /// Returns `None` (no error) when the user is at the limit; the caller
    /// surfaces that as a state error with its own reason code.
    pub fn create_restriction(
        &self,
        user: UserId,
        kind: RestrictionType,
        reason: RestrictionReason,
        notes: Option<String>,
        data_categories: Vec<DataCategory>,
        ctx: &RequestContext,
    ) -> Result<Option<ProcessingRestriction>, RestrictionError> {
        if self.has_reached_limit(user)? {
            debug!(%user, "restriction rejected: limit reached");
            return Ok(None);
        }

        let created_at = Utc::now();
        let restriction = ProcessingRestriction {
            id: RestrictionId::new(),
            user_id: user,
            kind,
            reason,
            status: RestrictionStatus::Active,
            data_categories,
            notes,
            expires_at: self
                .config
                .auto_expiry_days
                .map(|days| created_at + Duration::days(i64::from(days))),
            lifted_by: None,
            lifted_reason: None,
            lifted_at: None,
            created_at,
        };

        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO restrictions
                 (id, user_id, kind, reason, status, data_categories, notes,
                  expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    restriction.id.as_uuid().to_string(),
                    restriction.user_id.as_uuid().to_string(),
                    restriction.kind.to_string(),
                    restriction.reason.to_string(),
                    restriction.status.to_string(),
                    serde_json::to_string(&restriction.data_categories)?,
                    restriction.notes,
                    restriction.expires_at.map(|t| t.to_rfc3339()),
                    restriction.created_at.to_rfc3339(),
                ],
            )?;
        }

        self.trail.log(
            LogRequest::new(ComplianceAction::RestrictionCreated, LegalBasis::LegalObligation)
                .user(user)
                .actor(ComplianceActor::user(user))
                .details(json!({
                    "restriction_id": restriction.id.as_uuid().to_string(),
                    "kind": restriction.kind.to_string(),
                    "reason": restriction.reason.to_string(),
                }))
                .context(ctx.clone()),
        );
        self.notifier.notify(
            user,
            NotificationEvent::new(
                "restriction_created",
                json!({ "kind": restriction.kind.to_string() }),
            ),
        );

        info!(id = %restriction.id, kind = %restriction.kind, "restriction created");
        Ok(Some(restriction))
    }

    /// Lift a restriction.
    ///
    /// Returns false when no active restriction with that id belongs to
    /// the user (not found, not owned, or already terminal).
    pub fn remove_restriction(
        &self,
        id: RestrictionId,
        user: UserId,
        actor: &ComplianceActor,
        reason: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<bool, RestrictionError> {
        let lifted_at = Utc::now();
        let updated = {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE restrictions
                 SET status = 'removed', lifted_by = ?1, lifted_reason = ?2, lifted_at = ?3
                 WHERE id = ?4 AND user_id = ?5 AND status = 'active'",
                rusqlite::params![
                    actor.identifier(),
                    reason,
                    lifted_at.to_rfc3339(),
                    id.as_uuid().to_string(),
                    user.as_uuid().to_string(),
                ],
            )?
        };

        if updated == 0 {
            return Ok(false);
        }

        self.trail.log(
            LogRequest::new(ComplianceAction::RestrictionRemoved, LegalBasis::LegalObligation)
                .user(user)
                .actor(actor.clone())
                .details(json!({
                    "restriction_id": id.as_uuid().to_string(),
                    "lifted_reason": reason,
                }))
                .context(ctx.clone()),
        );
        self.notifier.notify(
            user,
            NotificationEvent::new(
                "restriction_removed",
                json!({ "restriction_id": id.as_uuid().to_string() }),
            ),
        );

        Ok(true)
    }

    /// Whether an active restriction blocks `activity` for this user.
    ///
    /// A wildcard restriction always matches. Any other restriction
    /// matches only if the catalog maps its type onto the activity, and,
    /// when a data category is given, only if the restriction's category
    /// subset covers it.
    pub fn has_active_restriction(
        &self,
        user: UserId,
        activity: &str,
        category: Option<DataCategory>,
    ) -> Result<bool, RestrictionError> {
        let map = self.catalog.activity_map();
        for restriction in self.active_restrictions(user)? {
            if !map.blocks(restriction.kind, activity) {
                continue;
            }
            if let Some(category) = category {
                if !restriction.covers_category(category) {
                    continue;
                }
            }
            return Ok(true);
        }
        Ok(false)
    }

    /// The user's active restrictions, newest first.
    pub fn active_restrictions(
        &self,
        user: UserId,
    ) -> Result<Vec<ProcessingRestriction>, RestrictionError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, kind, reason, status, data_categories, notes,
                    expires_at, lifted_by, lifted_reason, lifted_at, created_at
             FROM restrictions
             WHERE user_id = ?1 AND status = 'active'
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([user.as_uuid().to_string()], row_to_restriction)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Expire active restrictions past their expiry instant.
    ///
    /// Idempotent: already-expired rows are terminal and never match
    /// again. Each expiry is audit-logged.
    pub fn process_expired(&self) -> Result<u64, RestrictionError> {
        let now = Utc::now().to_rfc3339();
        let expired: Vec<(String, String)> = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT id, user_id FROM restrictions
                 WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at < ?1",
            )?;
            let rows = stmt.query_map([&now], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut count = 0u64;
        for (id, user_s) in expired {
            let updated = {
                let conn = self.conn.lock();
                conn.execute(
                    "UPDATE restrictions SET status = 'expired'
                     WHERE id = ?1 AND status = 'active'",
                    [&id],
                )?
            };
            if updated == 0 {
                continue;
            }
            count += 1;

            let mut request = LogRequest::new(
                ComplianceAction::RestrictionExpired,
                LegalBasis::LegalObligation,
            )
            .actor(ComplianceActor::system("restriction_sweep"))
            .details(json!({ "restriction_id": id }));
            if let Some(user) = UserId::parse(&user_s) {
                request = request.user(user);
            }
            self.trail.log(request);
        }

        Ok(count)
    }
}

fn row_to_restriction(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProcessingRestriction> {
    let id_s: String = row.get(0)?;
    let user_s: String = row.get(1)?;
    let kind_s: String = row.get(2)?;
    let reason_s: String = row.get(3)?;
    let status_s: String = row.get(4)?;
    let categories_s: String = row.get(5)?;
    let expires_s: Option<String> = row.get(7)?;
    let lifted_s: Option<String> = row.get(10)?;
    let created_s: String = row.get(11)?;

    Ok(ProcessingRestriction {
        id: RestrictionId::parse(&id_s).unwrap_or_default(),
        user_id: UserId::parse(&user_s).unwrap_or_default(),
        kind: kind_s.parse().unwrap_or(RestrictionType::All),
        reason: reason_s.parse().unwrap_or(RestrictionReason::Other),
        status: status_s.parse().unwrap_or(RestrictionStatus::Active),
        data_categories: serde_json::from_str(&categories_s).unwrap_or_default(),
        notes: row.get(6)?,
        expires_at: expires_s.and_then(|s| parse_rfc3339(&s)),
        lifted_by: row.get(8)?,
        lifted_reason: row.get(9)?,
        lifted_at: lifted_s.and_then(|s| parse_rfc3339(&s)),
        created_at: parse_rfc3339(&created_s).unwrap_or_default(),
    })
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_store::Store;
    use sentra_types::NoopNotifier;

    fn engine_with(config: RestrictionConfig) -> (Store, RestrictionEngine) {
        let store = Store::open_in_memory().unwrap();
        let catalog = Arc::new(TypeCatalog::builtin());
        let trail = Arc::new(AuditTrail::new(store.connection(), Arc::clone(&catalog)));
        let engine = RestrictionEngine::new(
            store.connection(),
            catalog,
            trail,
            Arc::new(NoopNotifier),
            config,
        );
        (store, engine)
    }

    fn engine() -> (Store, RestrictionEngine) {
        engine_with(RestrictionConfig::default())
    }

    fn ctx() -> RequestContext {
        RequestContext::background().with_user_agent("test/1.0")
    }

    #[test]
    fn test_marketing_objection_scenario() {
        let (_store, engine) = engine();
        let user = UserId::new();

        let restriction = engine
            .create_restriction(
                user,
                RestrictionType::Marketing,
                RestrictionReason::Objection,
                None,
                Vec::new(),
                &ctx(),
            )
            .unwrap()
            .unwrap();

        assert!(engine
            .has_active_restriction(user, "marketing_emails", None)
            .unwrap());
        assert!(!engine
            .has_active_restriction(user, "usage_analytics", None)
            .unwrap());

        assert!(engine
            .remove_restriction(
                restriction.id,
                user,
                &ComplianceActor::user(user),
                Some("resolved"),
                &ctx(),
            )
            .unwrap());
        assert!(!engine
            .has_active_restriction(user, "marketing_emails", None)
            .unwrap());
    }

    #[test]
    fn test_wildcard_blocks_every_activity() {
        let (_store, engine) = engine();
        let user = UserId::new();
        engine
            .create_restriction(
                user,
                RestrictionType::All,
                RestrictionReason::UnlawfulProcessing,
                None,
                Vec::new(),
                &ctx(),
            )
            .unwrap()
            .unwrap();

        for activity in ["marketing_emails", "usage_analytics", "anything_else"] {
            assert!(engine.has_active_restriction(user, activity, None).unwrap());
        }
    }

    #[test]
    fn test_category_subset_scopes_match() {
        let (_store, engine) = engine();
        let user = UserId::new();
        engine
            .create_restriction(
                user,
                RestrictionType::Analytics,
                RestrictionReason::AccuracyDispute,
                None,
                vec![DataCategory::Activity],
                &ctx(),
            )
            .unwrap()
            .unwrap();

        assert!(engine
            .has_active_restriction(user, "usage_analytics", Some(DataCategory::Activity))
            .unwrap());
        assert!(!engine
            .has_active_restriction(user, "usage_analytics", Some(DataCategory::Profile))
            .unwrap());
        // Without a category the restriction still applies.
        assert!(engine
            .has_active_restriction(user, "usage_analytics", None)
            .unwrap());
    }

    #[test]
    fn test_limit_rejects_with_none() {
        let (_store, engine) = engine_with(RestrictionConfig {
            max_active: 2,
            auto_expiry_days: None,
        });
        let user = UserId::new();
        for _ in 0..2 {
            assert!(engine
                .create_restriction(
                    user,
                    RestrictionType::Marketing,
                    RestrictionReason::Objection,
                    None,
                    Vec::new(),
                    &ctx(),
                )
                .unwrap()
                .is_some());
        }
        assert!(engine.has_reached_limit(user).unwrap());
        assert!(engine
            .create_restriction(
                user,
                RestrictionType::Analytics,
                RestrictionReason::Objection,
                None,
                Vec::new(),
                &ctx(),
            )
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_remove_unowned_returns_false() {
        let (_store, engine) = engine();
        let owner = UserId::new();
        let other = UserId::new();
        let restriction = engine
            .create_restriction(
                owner,
                RestrictionType::Marketing,
                RestrictionReason::Objection,
                None,
                Vec::new(),
                &ctx(),
            )
            .unwrap()
            .unwrap();

        assert!(!engine
            .remove_restriction(
                restriction.id,
                other,
                &ComplianceActor::user(other),
                None,
                &ctx(),
            )
            .unwrap());
        // Still in force for the owner.
        assert!(engine
            .has_active_restriction(owner, "marketing_emails", None)
            .unwrap());
    }

    #[test]
    fn test_expiry_sweep_is_idempotent() {
        let (store, engine) = engine_with(RestrictionConfig {
            max_active: 5,
            auto_expiry_days: Some(30),
        });
        let user = UserId::new();
        engine
            .create_restriction(
                user,
                RestrictionType::Profiling,
                RestrictionReason::Objection,
                None,
                Vec::new(),
                &ctx(),
            )
            .unwrap()
            .unwrap();

        // Nothing expired yet.
        assert_eq!(engine.process_expired().unwrap(), 0);

        // Backdate the expiry.
        {
            let conn = store.connection();
            let conn = conn.lock();
            conn.execute(
                "UPDATE restrictions SET expires_at = '2000-01-01T00:00:00+00:00'",
                [],
            )
            .unwrap();
        }

        assert_eq!(engine.process_expired().unwrap(), 1);
        assert_eq!(engine.process_expired().unwrap(), 0);
        assert!(!engine
            .has_active_restriction(user, "recommendation_engine", None)
            .unwrap());
    }

    #[test]
    fn test_removed_records_lift_metadata() {
        let (store, engine) = engine();
        let user = UserId::new();
        let restriction = engine
            .create_restriction(
                user,
                RestrictionType::DataSharing,
                RestrictionReason::LegalClaims,
                Some("pending litigation".to_string()),
                Vec::new(),
                &ctx(),
            )
            .unwrap()
            .unwrap();
        engine
            .remove_restriction(
                restriction.id,
                user,
                &ComplianceActor::operator("ops-7"),
                Some("claim settled"),
                &ctx(),
            )
            .unwrap();

        let conn = store.connection();
        let conn = conn.lock();
        let (status, lifted_by, lifted_reason): (String, String, String) = conn
            .query_row(
                "SELECT status, lifted_by, lifted_reason FROM restrictions WHERE id = ?1",
                [restriction.id.as_uuid().to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(status, "removed");
        assert_eq!(lifted_by, "operator:ops-7");
        assert_eq!(lifted_reason, "claim settled");
    }
}
