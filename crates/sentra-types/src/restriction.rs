//! Processing restriction vocabulary.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Kind of processing a restriction targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RestrictionType {
    /// Wildcard: blocks every processing activity.
    All,
    /// Marketing communications and advertising.
    Marketing,
    /// Usage analytics and behavioral measurement.
    Analytics,
    /// Interest profiling and personalization.
    Profiling,
    /// Disclosure of data to third parties.
    DataSharing,
    /// Fully automated decision-making.
    AutomatedDecisions,
}

impl RestrictionType {
    /// Iterate over every restriction type.
    pub fn all_types() -> impl Iterator<Item = Self> {
        use strum::IntoEnumIterator;
        Self::iter()
    }

    /// Whether this type matches every activity regardless of mapping.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// Why the data subject requested the restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RestrictionReason {
    /// The subject contests the accuracy of the data (Article 18(1)(a)).
    AccuracyDispute,
    /// Processing is unlawful but the subject opposes erasure (18(1)(b)).
    UnlawfulProcessing,
    /// Data is needed for the subject's legal claims (18(1)(c)).
    LegalClaims,
    /// Objection to processing is pending verification (18(1)(d)).
    Objection,
    /// Any other reason, detailed in free-text notes.
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_wildcard() {
        assert!(RestrictionType::All.is_wildcard());
        assert!(!RestrictionType::Marketing.is_wildcard());
    }

    #[test]
    fn test_parse_reason() {
        assert_eq!(
            RestrictionReason::from_str("accuracy_dispute").unwrap(),
            RestrictionReason::AccuracyDispute
        );
    }
}
