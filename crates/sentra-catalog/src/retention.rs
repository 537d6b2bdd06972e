//! Retention schedules for audit entries and classified activity events.

use sentra_types::ComplianceAction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Days a record must be kept before it becomes eligible for purge.
///
/// The schedule is the single source of truth for retention arithmetic:
/// per-action overrides first, then the default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionSchedule {
    by_action: HashMap<ComplianceAction, u32>,
    default_days: u32,
}

impl RetentionSchedule {
    /// The built-in schedule.
    ///
    /// Consent and restriction evidence is kept ten years, export activity
    /// five; everything else falls back to six years.
    pub fn builtin() -> Self {
        let mut by_action = HashMap::new();
        for action in [
            ComplianceAction::ConsentGranted,
            ComplianceAction::ConsentWithdrawn,
            ComplianceAction::ConsentRenewed,
            ComplianceAction::ConsentBulkUpdated,
            ComplianceAction::RestrictionCreated,
            ComplianceAction::RestrictionRemoved,
            ComplianceAction::RestrictionExpired,
        ] {
            by_action.insert(action, 3650);
        }
        for action in [
            ComplianceAction::ExportRequested,
            ComplianceAction::ExportCompleted,
            ComplianceAction::ExportFailed,
            ComplianceAction::ExportDownloaded,
            ComplianceAction::ExportExpired,
        ] {
            by_action.insert(action, 1825);
        }
        Self {
            by_action,
            default_days: 2190,
        }
    }

    /// Create a schedule with an explicit default.
    pub fn with_default(default_days: u32) -> Self {
        Self {
            by_action: HashMap::new(),
            default_days,
        }
    }

    /// Retention period in days for an action.
    pub fn days_for(&self, action: ComplianceAction) -> u32 {
        self.by_action
            .get(&action)
            .copied()
            .unwrap_or(self.default_days)
    }

    /// The default applied when no per-action entry exists.
    pub fn default_days(&self) -> u32 {
        self.default_days
    }

    /// Override the retention for one action.
    pub fn set_days(&mut self, action: ComplianceAction, days: u32) {
        self.by_action.insert(action, days);
    }

    /// Merge operator overrides on top of this schedule.
    pub fn merge(&mut self, overrides: HashMap<ComplianceAction, u32>, default_days: Option<u32>) {
        for (action, days) in overrides {
            self.by_action.insert(action, days);
        }
        if let Some(days) = default_days {
            self.default_days = days;
        }
    }
}

impl Default for RetentionSchedule {
    fn default() -> Self {
        Self::builtin()
    }
}
