//! Category collectors.
//!
//! One collector per data category, registered at startup. The registry is
//! the only dispatch point; there is no string-keyed lookup between a
//! category and the code that gathers its data.

use sentra_audit::{ActivityRecorder, AuditTrail};
use sentra_consent::ConsentRegistry;
use sentra_types::{DataCategory, UserId};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Collection failure for one category.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("no collector registered for category: {0}")]
    Unregistered(DataCategory),
    #[error("collection failed: {0}")]
    Failed(String),
}

/// Gathers one category of a user's data into a nested structure.
pub trait Collector: Send + Sync {
    /// The category this collector serves.
    fn category(&self) -> DataCategory;
    /// Collect the user's data for this category.
    fn collect(&self, user: UserId) -> Result<Value, CollectError>;
}

/// Registry mapping each category to its collector.
#[derive(Default)]
pub struct CollectorRegistry {
    collectors: HashMap<DataCategory, Box<dyn Collector>>,
}

impl CollectorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collector, replacing any prior one for the category.
    pub fn register(&mut self, collector: Box<dyn Collector>) {
        self.collectors.insert(collector.category(), collector);
    }

    /// Collect one category.
    pub fn collect(&self, category: DataCategory, user: UserId) -> Result<Value, CollectError> {
        self.collectors
            .get(&category)
            .ok_or(CollectError::Unregistered(category))?
            .collect(user)
    }

    /// Categories with a registered collector.
    pub fn registered(&self) -> Vec<DataCategory> {
        self.collectors.keys().copied().collect()
    }
}

/// Collector over the consent registry: current status plus summary.
pub struct ConsentsCollector {
    registry: Arc<ConsentRegistry>,
}

impl ConsentsCollector {
    /// Create the collector.
    pub fn new(registry: Arc<ConsentRegistry>) -> Self {
        Self { registry }
    }
}

impl Collector for ConsentsCollector {
    fn category(&self) -> DataCategory {
        DataCategory::Consents
    }

    fn collect(&self, user: UserId) -> Result<Value, CollectError> {
        let status = self
            .registry
            .user_consent_status(user)
            .map_err(|e| CollectError::Failed(e.to_string()))?;
        let records: Vec<Value> = status
            .per_type
            .iter()
            .map(|t| {
                json!({
                    "type": t.key,
                    "name": t.name,
                    "granted": t.granted,
                    "explicit": t.explicit,
                    "legal_basis": t.legal_basis.to_string(),
                    "updated_at": t.updated_at.map(|ts| ts.to_rfc3339()),
                })
            })
            .collect();
        Ok(json!({
            "records": records,
            "summary": {
                "total_types": status.summary.total_types,
                "granted": status.summary.granted_count,
                "catalog_version": status.summary.catalog_version,
            },
        }))
    }
}

/// Collector over the audit trail: entries referencing the user.
pub struct AuditTrailCollector {
    trail: Arc<AuditTrail>,
    limit: u32,
}

impl AuditTrailCollector {
    /// Create the collector. `limit` bounds the exported entry count.
    pub fn new(trail: Arc<AuditTrail>, limit: u32) -> Self {
        Self { trail, limit }
    }
}

impl Collector for AuditTrailCollector {
    fn category(&self) -> DataCategory {
        DataCategory::Audit
    }

    fn collect(&self, user: UserId) -> Result<Value, CollectError> {
        let entries = self
            .trail
            .entries_for_user(user, self.limit)
            .map_err(|e| CollectError::Failed(e.to_string()))?;
        let rows: Vec<Value> = entries
            .iter()
            .map(|e| {
                json!({
                    "action": e.action.to_string(),
                    "legal_basis": e.legal_basis.to_string(),
                    "note": e.note,
                    "created_at": e.created_at.to_rfc3339(),
                })
            })
            .collect();
        Ok(Value::Array(rows))
    }
}

/// Collector over the classified activity stream.
pub struct ActivityCollector {
    recorder: Arc<ActivityRecorder>,
    limit: u32,
}

impl ActivityCollector {
    /// Create the collector. `limit` bounds the exported event count.
    pub fn new(recorder: Arc<ActivityRecorder>, limit: u32) -> Self {
        Self { recorder, limit }
    }
}

impl Collector for ActivityCollector {
    fn category(&self) -> DataCategory {
        DataCategory::Activity
    }

    fn collect(&self, user: UserId) -> Result<Value, CollectError> {
        let events = self
            .recorder
            .events_for_user(user, self.limit)
            .map_err(|e| CollectError::Failed(e.to_string()))?;
        let rows: Vec<Value> = events
            .iter()
            .map(|e| {
                json!({
                    "category": e.category.to_string(),
                    "description": e.description,
                    "created_at": e.created_at.to_rfc3339(),
                })
            })
            .collect();
        Ok(Value::Array(rows))
    }
}

/// Collector returning a fixed structure.
///
/// Host applications use this for categories whose data lives outside the
/// compliance core and is gathered ahead of time; tests use it directly.
pub struct StaticCollector {
    category: DataCategory,
    value: Value,
}

impl StaticCollector {
    /// Create a collector that always returns `value`.
    pub fn new(category: DataCategory, value: Value) -> Self {
        Self { category, value }
    }
}

impl Collector for StaticCollector {
    fn category(&self) -> DataCategory {
        self.category
    }

    fn collect(&self, _user: UserId) -> Result<Value, CollectError> {
        Ok(self.value.clone())
    }
}
