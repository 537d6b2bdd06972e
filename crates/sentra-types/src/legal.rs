//! Legal bases for processing personal data.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Legal basis for a processing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LegalBasis {
    /// Freely given consent (Article 6(1)(a)).
    Consent,
    /// Performance of a contract (Article 6(1)(b)).
    Contract,
    /// Compliance with a legal obligation (Article 6(1)(c)).
    LegalObligation,
    /// Protection of vital interests (Article 6(1)(d)).
    VitalInterests,
    /// Task carried out in the public interest (Article 6(1)(e)).
    PublicTask,
    /// Legitimate interests of the controller (Article 6(1)(f)).
    LegitimateInterests,
}

impl LegalBasis {
    /// Get the GDPR article reference.
    pub fn article(&self) -> &'static str {
        match self {
            Self::Consent => "Article 6(1)(a)",
            Self::Contract => "Article 6(1)(b)",
            Self::LegalObligation => "Article 6(1)(c)",
            Self::VitalInterests => "Article 6(1)(d)",
            Self::PublicTask => "Article 6(1)(e)",
            Self::LegitimateInterests => "Article 6(1)(f)",
        }
    }
}
