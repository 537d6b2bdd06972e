//! Consent type definitions.

use sentra_types::LegalBasis;
use serde::{Deserialize, Serialize};

/// Definition of a single consent type.
///
/// Definitions are immutable once published under a catalog version; a new
/// catalog version supersedes but never mutates prior ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentTypeDefinition {
    /// Stable key referenced by consent records ("analytics").
    pub key: String,
    /// Human-readable name.
    pub name: String,
    /// Description shown to the data subject.
    pub description: String,
    /// Grouping category ("essential", "functional", "marketing").
    pub category: String,
    /// Legal basis this consent type rests on.
    pub legal_basis: LegalBasis,
    /// Whether the consent is required to use the service.
    pub required: bool,
    /// Value assumed when no explicit record exists.
    pub default_granted: bool,
    /// Whether the subject may withdraw after granting.
    pub can_withdraw: bool,
    /// Processing purposes covered by this consent.
    pub purposes: Vec<String>,
}

impl ConsentTypeDefinition {
    /// The built-in consent types, in presentation order.
    pub fn builtin() -> Vec<Self> {
        vec![
            Self {
                key: "terms-of-service".to_string(),
                name: "Terms of Service".to_string(),
                description: "Acceptance of the terms of service.".to_string(),
                category: "essential".to_string(),
                legal_basis: LegalBasis::Contract,
                required: true,
                default_granted: true,
                can_withdraw: false,
                purposes: vec!["service_provision".to_string()],
            },
            Self {
                key: "privacy-policy".to_string(),
                name: "Privacy Policy".to_string(),
                description: "Acknowledgement of the privacy policy.".to_string(),
                category: "essential".to_string(),
                legal_basis: LegalBasis::LegalObligation,
                required: true,
                default_granted: true,
                can_withdraw: false,
                purposes: vec!["service_provision".to_string(), "legal_compliance".to_string()],
            },
            Self {
                key: "analytics".to_string(),
                name: "Analytics".to_string(),
                description: "Usage measurement to improve the service.".to_string(),
                category: "functional".to_string(),
                legal_basis: LegalBasis::Consent,
                required: false,
                default_granted: false,
                can_withdraw: true,
                purposes: vec![
                    "usage_analytics".to_string(),
                    "performance_metrics".to_string(),
                ],
            },
            Self {
                key: "marketing".to_string(),
                name: "Marketing Communications".to_string(),
                description: "Promotional email and in-product messaging.".to_string(),
                category: "marketing".to_string(),
                legal_basis: LegalBasis::Consent,
                required: false,
                default_granted: false,
                can_withdraw: true,
                purposes: vec![
                    "marketing_emails".to_string(),
                    "promotional_notifications".to_string(),
                ],
            },
            Self {
                key: "personalization".to_string(),
                name: "Personalization".to_string(),
                description: "Content tailored to observed interests.".to_string(),
                category: "functional".to_string(),
                legal_basis: LegalBasis::Consent,
                required: false,
                default_granted: false,
                can_withdraw: true,
                purposes: vec![
                    "recommendation_engine".to_string(),
                    "personalized_content".to_string(),
                ],
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_keys_unique() {
        let types = ConsentTypeDefinition::builtin();
        let mut keys: Vec<_> = types.iter().map(|t| t.key.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), types.len());
    }

    #[test]
    fn test_required_types_not_withdrawable() {
        for def in ConsentTypeDefinition::builtin() {
            if def.required {
                assert!(!def.can_withdraw, "{} is required yet withdrawable", def.key);
                assert!(def.default_granted);
            }
        }
    }

    #[test]
    fn test_every_type_has_purposes() {
        for def in ConsentTypeDefinition::builtin() {
            assert!(!def.purposes.is_empty(), "{} has no purposes", def.key);
        }
    }
}
