//! Actors that initiate compliance-relevant actions.

use crate::UserId;
use serde::{Deserialize, Serialize};

/// The entity that initiated a compliance-relevant action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComplianceActor {
    /// A data subject acting on their own data.
    User {
        user_id: UserId,
        session_id: Option<String>,
    },
    /// An automated component (sweeps, workers, scheduled jobs).
    System { component: String },
    /// A privileged operator acting on behalf of the controller.
    Operator {
        operator_id: String,
        name: Option<String>,
    },
    /// Unknown actor (for events with no attributable origin).
    Unknown,
}

impl ComplianceActor {
    /// Create a user actor.
    pub fn user(user_id: UserId) -> Self {
        Self::User {
            user_id,
            session_id: None,
        }
    }

    /// Create a system actor.
    pub fn system(component: impl Into<String>) -> Self {
        Self::System {
            component: component.into(),
        }
    }

    /// Create an operator actor.
    pub fn operator(operator_id: impl Into<String>) -> Self {
        Self::Operator {
            operator_id: operator_id.into(),
            name: None,
        }
    }

    /// Get a stable display identifier for this actor.
    pub fn identifier(&self) -> String {
        match self {
            Self::User { user_id, .. } => user_id.to_string(),
            Self::System { component } => format!("system:{}", component),
            Self::Operator { operator_id, name } => name
                .clone()
                .unwrap_or_else(|| format!("operator:{}", operator_id)),
            Self::Unknown => "unknown".to_string(),
        }
    }

    /// The user this actor refers to, if any.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }
}
