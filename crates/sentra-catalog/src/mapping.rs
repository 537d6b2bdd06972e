//! Restriction-type to processing-activity mapping.

use sentra_types::RestrictionType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maps each restriction type to the concrete processing activities it
/// blocks. `RestrictionType::All` is a wildcard and never consults the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityMap {
    activities: HashMap<RestrictionType, Vec<String>>,
}

impl ActivityMap {
    /// The built-in mapping.
    pub fn builtin() -> Self {
        let mut activities = HashMap::new();
        activities.insert(
            RestrictionType::Marketing,
            vec![
                "marketing_emails".to_string(),
                "marketing_sms".to_string(),
                "promotional_notifications".to_string(),
                "advertising".to_string(),
            ],
        );
        activities.insert(
            RestrictionType::Analytics,
            vec![
                "usage_analytics".to_string(),
                "behavioral_tracking".to_string(),
                "performance_metrics".to_string(),
            ],
        );
        activities.insert(
            RestrictionType::Profiling,
            vec![
                "recommendation_engine".to_string(),
                "interest_profiling".to_string(),
                "personalized_content".to_string(),
            ],
        );
        activities.insert(
            RestrictionType::DataSharing,
            vec![
                "third_party_sharing".to_string(),
                "partner_data_feeds".to_string(),
            ],
        );
        activities.insert(
            RestrictionType::AutomatedDecisions,
            vec![
                "automated_scoring".to_string(),
                "automated_moderation".to_string(),
            ],
        );
        Self { activities }
    }

    /// Create from an explicit map (operator-supplied extensions).
    pub fn from_map(activities: HashMap<RestrictionType, Vec<String>>) -> Self {
        Self { activities }
    }

    /// Whether a restriction of `kind` blocks `activity`.
    ///
    /// The wildcard type blocks everything; any other type blocks only the
    /// activities listed for it. An unmapped type blocks nothing.
    pub fn blocks(&self, kind: RestrictionType, activity: &str) -> bool {
        if kind.is_wildcard() {
            return true;
        }
        self.activities
            .get(&kind)
            .map(|list| list.iter().any(|a| a == activity))
            .unwrap_or(false)
    }

    /// Activities mapped for a restriction type.
    pub fn activities_for(&self, kind: RestrictionType) -> &[String] {
        self.activities
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Merge operator overrides on top of this map. Overridden types are
    /// replaced wholesale, not appended.
    pub fn merge(&mut self, overrides: HashMap<RestrictionType, Vec<String>>) {
        for (kind, list) in overrides {
            self.activities.insert(kind, list);
        }
    }
}

impl Default for ActivityMap {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(RestrictionType::Marketing, "marketing_emails", true)]
    #[test_case(RestrictionType::Marketing, "usage_analytics", false)]
    #[test_case(RestrictionType::All, "anything_at_all", true)]
    #[test_case(RestrictionType::Analytics, "behavioral_tracking", true)]
    fn test_blocks(kind: RestrictionType, activity: &str, expected: bool) {
        assert_eq!(ActivityMap::builtin().blocks(kind, activity), expected);
    }

    #[test]
    fn test_merge_replaces_wholesale() {
        let mut map = ActivityMap::builtin();
        let mut overrides = HashMap::new();
        overrides.insert(RestrictionType::Marketing, vec!["custom_only".to_string()]);
        map.merge(overrides);
        assert!(map.blocks(RestrictionType::Marketing, "custom_only"));
        assert!(!map.blocks(RestrictionType::Marketing, "marketing_emails"));
    }
}
