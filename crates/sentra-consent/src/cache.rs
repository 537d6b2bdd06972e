//! Consent lookup cache port.

use parking_lot::RwLock;
use sentra_types::UserId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Injected cache for `has_consent` lookups.
///
/// The registry invalidates the affected (user, type) key on every write,
/// so implementations only need correct expiry, not cross-process
/// coherence.
pub trait ConsentCache: Send + Sync {
    /// Cached value, if fresh.
    fn get(&self, user: UserId, type_key: &str) -> Option<bool>;
    /// Store a value.
    fn put(&self, user: UserId, type_key: &str, granted: bool);
    /// Drop the value for one (user, type) key.
    fn invalidate(&self, user: UserId, type_key: &str);
}

/// In-process TTL cache.
pub struct TtlConsentCache {
    ttl: Duration,
    entries: RwLock<HashMap<(UserId, String), (bool, Instant)>>,
}

impl TtlConsentCache {
    /// Create a cache with the given entry lifetime.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for TtlConsentCache {
    fn default() -> Self {
        // Short by design: a stale grant must not outlive a settings save.
        Self::new(Duration::from_secs(60))
    }
}

impl ConsentCache for TtlConsentCache {
    fn get(&self, user: UserId, type_key: &str) -> Option<bool> {
        let entries = self.entries.read();
        let (granted, stored_at) = entries.get(&(user, type_key.to_string()))?;
        if stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(*granted)
    }

    fn put(&self, user: UserId, type_key: &str, granted: bool) {
        self.entries
            .write()
            .insert((user, type_key.to_string()), (granted, Instant::now()));
    }

    fn invalidate(&self, user: UserId, type_key: &str) {
        self.entries.write().remove(&(user, type_key.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_invalidate() {
        let cache = TtlConsentCache::default();
        let user = UserId::new();
        assert_eq!(cache.get(user, "analytics"), None);
        cache.put(user, "analytics", true);
        assert_eq!(cache.get(user, "analytics"), Some(true));
        cache.invalidate(user, "analytics");
        assert_eq!(cache.get(user, "analytics"), None);
    }

    #[test]
    fn test_expiry() {
        let cache = TtlConsentCache::new(Duration::from_millis(0));
        let user = UserId::new();
        cache.put(user, "marketing", false);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(user, "marketing"), None);
    }

    #[test]
    fn test_keys_are_scoped_per_user() {
        let cache = TtlConsentCache::default();
        let a = UserId::new();
        let b = UserId::new();
        cache.put(a, "analytics", true);
        assert_eq!(cache.get(b, "analytics"), None);
    }
}
