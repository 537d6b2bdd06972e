//! Data categories partitioning a user's personal data.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// A named partition of a user's data, used to scope both processing
/// restrictions and data exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataCategory {
    /// Core profile fields (name, email, avatar).
    Profile,
    /// Account settings and security metadata.
    Account,
    /// UI and notification preferences.
    Preferences,
    /// Behavioral activity history.
    Activity,
    /// User-curated collections.
    Collections,
    /// Wallet and balance data.
    Wallet,
    /// Consent state and consent history.
    Consents,
    /// Purchase and order history.
    Purchases,
    /// Comments authored by the user.
    Comments,
    /// Private messages.
    Messages,
    /// Free-text biography content.
    Biography,
    /// Compliance audit entries referencing the user.
    Audit,
}

impl DataCategory {
    /// Iterate over all categories in catalog order.
    pub fn all() -> impl Iterator<Item = Self> {
        use strum::IntoEnumIterator;
        Self::iter()
    }

    /// Human-readable title for export artifacts.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Profile => "Profile",
            Self::Account => "Account",
            Self::Preferences => "Preferences",
            Self::Activity => "Activity",
            Self::Collections => "Collections",
            Self::Wallet => "Wallet",
            Self::Consents => "Consents",
            Self::Purchases => "Purchases",
            Self::Comments => "Comments",
            Self::Messages => "Messages",
            Self::Biography => "Biography",
            Self::Audit => "Audit Trail",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_all_covers_every_variant() {
        assert_eq!(DataCategory::all().count(), 12);
    }

    #[test]
    fn test_parse_snake_case() {
        assert_eq!(DataCategory::from_str("wallet").unwrap(), DataCategory::Wallet);
        assert!(DataCategory::from_str("unknown_category").is_err());
    }
}
