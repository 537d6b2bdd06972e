//! Notification channel port.

use crate::UserId;
use serde::{Deserialize, Serialize};

/// Payload delivered to the notification channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Event kind ("consent_updated", "restriction_created").
    pub kind: String,
    /// Event-specific payload.
    pub payload: serde_json::Value,
}

impl NotificationEvent {
    /// Create an event.
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Fire-and-forget notification channel.
///
/// Implementations must not block or fail loudly; the compliance services
/// treat delivery as best-effort.
pub trait Notifier: Send + Sync {
    /// Deliver an event for a user.
    fn notify(&self, user: UserId, event: NotificationEvent);
}

/// A notifier that drops everything. Default for tests and for
/// deployments without a channel configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _user: UserId, _event: NotificationEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_accepts_events() {
        NoopNotifier.notify(
            UserId::new(),
            NotificationEvent::new("consent_updated", serde_json::json!({"granted": true})),
        );
    }
}
