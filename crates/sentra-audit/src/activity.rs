//! Privacy-level classified user activity stream.
//!
//! Runs parallel to the audit trail: high-volume user-facing and security
//! events, each classified into a privacy level that drives an independent
//! retention window. Immutable events carry no retention instant and are
//! never purged.

use chrono::{DateTime, Duration, Utc};
use sentra_store::SharedConnection;
use sentra_types::{mask_ip, RequestContext, UserId};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Activity recording error.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Privacy classification of an activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PrivacyLevel {
    /// Routine product activity.
    Standard,
    /// Account-sensitive activity.
    High,
    /// Security-relevant activity.
    Critical,
    /// Compliance evidence, exempt from purge.
    Immutable,
}

impl PrivacyLevel {
    /// Retention window in days. `None` means never purged.
    pub fn retention_days(&self) -> Option<u32> {
        match self {
            Self::Standard => Some(90),
            Self::High => Some(365),
            Self::Critical => Some(1825),
            Self::Immutable => None,
        }
    }
}

/// Category of a recorded activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityCategory {
    /// Sign-in, sign-out, credential changes.
    Authentication,
    /// Profile edits.
    Profile,
    /// Content interaction (views, comments).
    Content,
    /// Purchases and payments.
    Purchase,
    /// Security-relevant incidents.
    Security,
    /// Consent, restriction, and export activity.
    Privacy,
    /// Operator actions on the account.
    Administration,
}

impl ActivityCategory {
    /// Privacy level assigned to events in this category.
    pub fn privacy_level(&self) -> PrivacyLevel {
        match self {
            Self::Content => PrivacyLevel::Standard,
            Self::Profile | Self::Purchase => PrivacyLevel::High,
            Self::Authentication | Self::Security | Self::Administration => PrivacyLevel::Critical,
            Self::Privacy => PrivacyLevel::Immutable,
        }
    }
}

/// A single classified activity event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Event identifier.
    pub id: Uuid,
    /// The user the activity belongs to.
    pub user_id: UserId,
    /// Activity category.
    pub category: ActivityCategory,
    /// Derived privacy level.
    pub privacy_level: PrivacyLevel,
    /// Short description of what happened.
    pub description: String,
    /// Masked client IP.
    pub ip_masked: Option<String>,
    /// Purge eligibility instant; `None` for immutable events.
    pub retention_until: Option<DateTime<Utc>>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

/// Records and purges classified activity events.
pub struct ActivityRecorder {
    conn: SharedConnection,
}

impl ActivityRecorder {
    /// Create a recorder over the shared store connection.
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Record an activity event. Like the audit trail, never blocks the
    /// primary action: failures are traced and swallowed.
    pub fn record(
        &self,
        user_id: UserId,
        category: ActivityCategory,
        description: impl Into<String>,
        context: &RequestContext,
    ) -> Option<ActivityEvent> {
        match self.try_record(user_id, category, description.into(), context) {
            Ok(event) => Some(event),
            Err(e) => {
                error!("activity write failed: {}", e);
                None
            }
        }
    }

    fn try_record(
        &self,
        user_id: UserId,
        category: ActivityCategory,
        description: String,
        context: &RequestContext,
    ) -> Result<ActivityEvent, ActivityError> {
        let created_at = Utc::now();
        let privacy_level = category.privacy_level();
        let retention_until = privacy_level
            .retention_days()
            .map(|days| created_at + Duration::days(i64::from(days)));

        let event = ActivityEvent {
            id: Uuid::new_v4(),
            user_id,
            category,
            privacy_level,
            description,
            ip_masked: context.ip_address.map(|ip| mask_ip(ip).to_string()),
            retention_until,
            created_at,
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO activity_events
             (id, user_id, category, privacy_level, description, ip_masked,
              retention_until, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                event.id.to_string(),
                event.user_id.as_uuid().to_string(),
                event.category.to_string(),
                event.privacy_level.to_string(),
                event.description,
                event.ip_masked,
                event.retention_until.map(|t| t.to_rfc3339()),
                event.created_at.to_rfc3339(),
            ],
        )?;

        Ok(event)
    }

    /// Delete activity events past retention, bounded by `limit`.
    /// Immutable events (NULL retention) are never candidates.
    pub fn purge_expired(&self, limit: u32) -> Result<u64, ActivityError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        let ids: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT id FROM activity_events
                 WHERE retention_until IS NOT NULL AND retention_until < ?1
                 ORDER BY retention_until ASC LIMIT ?2",
            )?;
            let rows = stmt.query_map(rusqlite::params![now, limit], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut purged = 0u64;
        for id in &ids {
            purged += conn.execute("DELETE FROM activity_events WHERE id = ?1", [id])? as u64;
        }
        Ok(purged)
    }

    /// Events for one user, most recent first.
    pub fn events_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<ActivityEvent>, ActivityError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, category, privacy_level, description, ip_masked,
                    retention_until, created_at
             FROM activity_events
             WHERE user_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![user_id.as_uuid().to_string(), limit],
            |row| {
                let id_s: String = row.get(0)?;
                let user_s: String = row.get(1)?;
                let category_s: String = row.get(2)?;
                let level_s: String = row.get(3)?;
                let retention_s: Option<String> = row.get(6)?;
                let created_s: String = row.get(7)?;
                Ok(ActivityEvent {
                    id: Uuid::parse_str(&id_s).unwrap_or_default(),
                    user_id: UserId::parse(&user_s).unwrap_or_default(),
                    category: category_s
                        .parse()
                        .unwrap_or(ActivityCategory::Content),
                    privacy_level: level_s.parse().unwrap_or(PrivacyLevel::Standard),
                    description: row.get(4)?,
                    ip_masked: row.get(5)?,
                    retention_until: retention_s.and_then(|s| {
                        DateTime::parse_from_rfc3339(&s)
                            .ok()
                            .map(|t| t.with_timezone(&Utc))
                    }),
                    created_at: DateTime::parse_from_rfc3339(&created_s)
                        .map(|t| t.with_timezone(&Utc))
                        .unwrap_or_default(),
                })
            },
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_store::Store;
    use std::sync::Arc;

    fn recorder() -> (Store, ActivityRecorder) {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        (store, ActivityRecorder::new(Arc::clone(&conn)))
    }

    #[test]
    fn test_level_derivation() {
        assert_eq!(
            ActivityCategory::Security.privacy_level(),
            PrivacyLevel::Critical
        );
        assert_eq!(
            ActivityCategory::Privacy.privacy_level(),
            PrivacyLevel::Immutable
        );
    }

    #[test]
    fn test_record_masks_ip() {
        let (_store, recorder) = recorder();
        let ctx = RequestContext::background().with_ip_address("203.0.113.42".parse().unwrap());
        let event = recorder
            .record(UserId::new(), ActivityCategory::Content, "viewed item", &ctx)
            .unwrap();
        assert_eq!(event.ip_masked.as_deref(), Some("203.0.113.0"));
        assert!(event.retention_until.is_some());
    }

    #[test]
    fn test_immutable_events_have_no_retention() {
        let (_store, recorder) = recorder();
        let event = recorder
            .record(
                UserId::new(),
                ActivityCategory::Privacy,
                "consent withdrawn",
                &RequestContext::background(),
            )
            .unwrap();
        assert!(event.retention_until.is_none());
    }

    #[test]
    fn test_purge_skips_immutable() {
        let (store, recorder) = recorder();
        let user = UserId::new();
        recorder.record(
            user,
            ActivityCategory::Content,
            "viewed",
            &RequestContext::background(),
        );
        recorder.record(
            user,
            ActivityCategory::Privacy,
            "export requested",
            &RequestContext::background(),
        );

        // Backdate everything purgeable.
        {
            let conn = store.connection();
            let conn = conn.lock();
            conn.execute(
                "UPDATE activity_events
                 SET retention_until = '2000-01-01T00:00:00+00:00'
                 WHERE retention_until IS NOT NULL",
                [],
            )
            .unwrap();
        }

        assert_eq!(recorder.purge_expired(100).unwrap(), 1);
        let remaining = recorder.events_for_user(user, 10).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].privacy_level, PrivacyLevel::Immutable);
    }
}
