//! Processing restriction model.

use chrono::{DateTime, Utc};
use sentra_types::{DataCategory, RestrictionId, RestrictionReason, RestrictionType, UserId};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle state of a restriction. `Removed` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RestrictionStatus {
    /// In force.
    Active,
    /// Lifted manually.
    Removed,
    /// Passed its expiry and swept.
    Expired,
}

impl RestrictionStatus {
    /// Whether the state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// A user-initiated block on some category of processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingRestriction {
    /// Restriction identifier.
    pub id: RestrictionId,
    /// The data subject.
    pub user_id: UserId,
    /// What processing the restriction targets.
    pub kind: RestrictionType,
    /// Why the subject requested it.
    pub reason: RestrictionReason,
    /// Lifecycle state.
    pub status: RestrictionStatus,
    /// Data categories in scope; empty means all categories.
    pub data_categories: Vec<DataCategory>,
    /// Free-text notes from the subject.
    pub notes: Option<String>,
    /// Automatic expiry instant, if configured.
    pub expires_at: Option<DateTime<Utc>>,
    /// Who lifted the restriction (on removal).
    pub lifted_by: Option<String>,
    /// Why it was lifted (on removal).
    pub lifted_reason: Option<String>,
    /// When it was lifted (on removal).
    pub lifted_at: Option<DateTime<Utc>>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

impl ProcessingRestriction {
    /// Whether the restriction covers a data category.
    ///
    /// An empty category subset applies to every category.
    pub fn covers_category(&self, category: DataCategory) -> bool {
        self.data_categories.is_empty() || self.data_categories.contains(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!RestrictionStatus::Active.is_terminal());
        assert!(RestrictionStatus::Removed.is_terminal());
        assert!(RestrictionStatus::Expired.is_terminal());
    }

    #[test]
    fn test_empty_category_subset_covers_all() {
        let restriction = ProcessingRestriction {
            id: RestrictionId::new(),
            user_id: UserId::new(),
            kind: RestrictionType::Marketing,
            reason: RestrictionReason::Objection,
            status: RestrictionStatus::Active,
            data_categories: Vec::new(),
            notes: None,
            expires_at: None,
            lifted_by: None,
            lifted_reason: None,
            lifted_at: None,
            created_at: Utc::now(),
        };
        assert!(restriction.covers_category(DataCategory::Profile));

        let scoped = ProcessingRestriction {
            data_categories: vec![DataCategory::Messages],
            ..restriction
        };
        assert!(scoped.covers_category(DataCategory::Messages));
        assert!(!scoped.covers_category(DataCategory::Profile));
    }
}
