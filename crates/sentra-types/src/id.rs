//! Typed identifiers for compliance records.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string representation of the inner UUID.
            pub fn parse(s: &str) -> Option<Self> {
                Uuid::parse_str(s).ok().map(Self)
            }

            /// Get the inner UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a user (data subject).
    UserId,
    "usr"
);

define_id!(
    /// Unique identifier for a consent record.
    ConsentRecordId,
    "cns"
);

define_id!(
    /// Unique identifier for an audit log entry.
    AuditEntryId,
    "aud"
);

define_id!(
    /// Unique identifier for a processing restriction.
    RestrictionId,
    "rst"
);

define_id!(
    /// Unique identifier for a data export job.
    ExportJobId,
    "exp"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefix() {
        let id = UserId::new();
        assert!(id.to_string().starts_with("usr_"));
        let id = ExportJobId::new();
        assert!(id.to_string().starts_with("exp_"));
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = RestrictionId::new();
        let parsed = RestrictionId::parse(&id.as_uuid().to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(AuditEntryId::parse("not-a-uuid").is_none());
    }

    #[test]
    fn test_serde_transparent() {
        let id = ConsentRecordId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }
}
