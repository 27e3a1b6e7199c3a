//! Two-Tier TTL Cache
//!
//! - Memory tier: in-process map, authoritative for the process lifetime
//! - Session tier: durable `SessionStore`, survives restarts within a session
//!
//! Access pattern:
//! 1. Check the memory tier first
//! 2. On miss, check the session tier
//! 3. On a live session hit, back-fill the memory tier (original expiry kept)
//!
//! Expiry is evaluated lazily on read. There is no background sweep and no
//! explicit deletion; expired entries are simply overwritten by the next `set`.

use crate::clock::{duration_ms, Clock, SystemClock};
use crate::storage::SessionStore;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default time-to-live (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default session key namespace
pub const DEFAULT_NAMESPACE: &str = "tally:";

/// Cache statistics for monitoring
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Memory tier hits
    pub memory_hits: u64,
    /// Session tier hits (back-filled into memory)
    pub session_hits: u64,
    /// Total misses
    pub misses: u64,
    /// Swallowed session tier failures
    pub session_errors: u64,
}

impl CacheStats {
    /// Calculate overall hit rate
    #[inline]
    pub fn hit_rate(&self) -> f64 {
        let total = self.memory_hits + self.session_hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        (self.memory_hits + self.session_hits) as f64 / total as f64
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry<V> {
    value: V,
    expires_at: i64,
}

/// Session tier wire format: `{"v": value, "e": expiresAtMs}`
#[derive(Serialize, Deserialize)]
struct StoredEntry<V> {
    v: V,
    e: i64,
}

/// Two-tier cache with lazy TTL expiry
///
/// # Example
/// ```ignore
/// use std::sync::Arc;
/// use tally_foundation::{MemorySessionStore, TtlCache};
///
/// let cache: TtlCache<u64> = TtlCache::new(Arc::new(MemorySessionStore::new()));
/// cache.set("file:https://github.com/o/r/blob/main/a.rs", 42);
/// assert_eq!(cache.get("file:https://github.com/o/r/blob/main/a.rs"), Some(42));
/// ```
pub struct TtlCache<V> {
    memory: Mutex<HashMap<String, MemoryEntry<V>>>,
    session: Arc<dyn SessionStore>,
    namespace: String,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    stats: Mutex<CacheStats>,
}

impl<V> TtlCache<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Create with the default TTL, namespace and wall clock
    pub fn new(session: Arc<dyn SessionStore>) -> Self {
        TtlCacheBuilder::new(session).build()
    }

    /// Get a live value
    ///
    /// Checks memory first, then the session tier. Session tier failures
    /// count as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();

        if let Some(entry) = self.memory.lock().get(key) {
            if entry.expires_at > now {
                self.stats.lock().memory_hits += 1;
                return Some(entry.value.clone());
            }
        }

        match self.session_get(key, now) {
            Some(entry) => {
                self.stats.lock().session_hits += 1;
                let value = entry.value.clone();
                self.memory.lock().insert(key.to_string(), entry);
                Some(value)
            }
            None => {
                self.stats.lock().misses += 1;
                None
            }
        }
    }

    /// Insert with the default TTL
    pub fn set(&self, key: &str, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert with a custom TTL
    ///
    /// A zero TTL stores an entry that is already expired.
    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        let expires_at = self.clock.now_ms().saturating_add(duration_ms(ttl));

        self.session_set(key, &value, expires_at);
        self.memory
            .lock()
            .insert(key.to_string(), MemoryEntry { value, expires_at });
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    /// Memory tier size (including expired entries not yet overwritten)
    pub fn memory_len(&self) -> usize {
        self.memory.lock().len()
    }

    fn session_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    fn session_get(&self, key: &str, now: i64) -> Option<MemoryEntry<V>> {
        let raw = match self.session.get(&self.session_key(key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                debug!("Session tier read failed for {}: {}", key, e);
                self.stats.lock().session_errors += 1;
                return None;
            }
        };

        match serde_json::from_str::<StoredEntry<V>>(&raw) {
            Ok(stored) if stored.e > now => Some(MemoryEntry {
                value: stored.v,
                expires_at: stored.e,
            }),
            Ok(_) => None,
            Err(e) => {
                debug!("Ignoring malformed session entry {}: {}", key, e);
                self.stats.lock().session_errors += 1;
                None
            }
        }
    }

    fn session_set(&self, key: &str, value: &V, expires_at: i64) {
        let stored = StoredEntry {
            v: value,
            e: expires_at,
        };
        let result = serde_json::to_string(&stored)
            .map_err(crate::Error::from)
            .and_then(|raw| self.session.set(&self.session_key(key), &raw));

        if let Err(e) = result {
            // Memory tier stays authoritative
            debug!("Session tier write failed for {}: {}", key, e);
            self.stats.lock().session_errors += 1;
        }
    }
}

/// Builder for TtlCache with fluent API
pub struct TtlCacheBuilder {
    session: Arc<dyn SessionStore>,
    namespace: String,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TtlCacheBuilder {
    pub fn new(session: Arc<dyn SessionStore>) -> Self {
        Self {
            session,
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_ttl: DEFAULT_TTL,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build<V>(self) -> TtlCache<V>
    where
        V: Clone + Serialize + DeserializeOwned,
    {
        TtlCache {
            memory: Mutex::new(HashMap::new()),
            session: self.session,
            namespace: self.namespace,
            default_ttl: self.default_ttl,
            clock: self.clock,
            stats: Mutex::new(CacheStats::default()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemorySessionStore;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Count {
        Lines(u64),
        Unavailable,
    }

    fn cache_with(
        session: Arc<dyn SessionStore>,
        clock: Arc<ManualClock>,
    ) -> TtlCache<Count> {
        TtlCacheBuilder::new(session).clock(clock).build()
    }

    #[test]
    fn test_basic_set_get() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = cache_with(Arc::new(MemorySessionStore::new()), clock);

        cache.set("a", Count::Lines(10));
        assert_eq!(cache.get("a"), Some(Count::Lines(10)));
        assert_eq!(cache.stats().memory_hits, 1);
    }

    #[test]
    fn test_zero_ttl_is_expired() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = cache_with(Arc::new(MemorySessionStore::new()), clock);

        cache.set_with_ttl("a", Count::Lines(1), Duration::ZERO);
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = cache_with(Arc::new(MemorySessionStore::new()), clock.clone());

        cache.set_with_ttl("a", Count::Lines(1), Duration::from_secs(u64::MAX));
        clock.advance(Duration::from_secs(365 * 24 * 3600));
        assert_eq!(cache.get("a"), Some(Count::Lines(1)));
    }

    #[test]
    fn test_unset_is_distinct_from_unavailable() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = cache_with(Arc::new(MemorySessionStore::new()), clock);

        assert_eq!(cache.get("never"), None);

        cache.set("failed", Count::Unavailable);
        assert_eq!(cache.get("failed"), Some(Count::Unavailable));
    }

    #[test]
    fn test_expiry_is_lazy() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_with(Arc::new(MemorySessionStore::new()), clock.clone());

        cache.set_with_ttl("a", Count::Lines(5), Duration::from_secs(10));
        clock.advance(Duration::from_millis(9_999));
        assert_eq!(cache.get("a"), Some(Count::Lines(5)));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("a"), None);

        // Expired entry is silently overwritten
        cache.set("a", Count::Lines(6));
        assert_eq!(cache.get("a"), Some(Count::Lines(6)));
        assert_eq!(cache.memory_len(), 1);
    }

    #[test]
    fn test_session_backfill() {
        let clock = Arc::new(ManualClock::new(0));
        let session: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());

        let first = cache_with(session.clone(), clock.clone());
        first.set_with_ttl("a", Count::Lines(3), Duration::from_secs(60));

        // A new process in the same session
        let second = cache_with(session, clock.clone());
        assert_eq!(second.memory_len(), 0);
        assert_eq!(second.get("a"), Some(Count::Lines(3)));
        assert_eq!(second.stats().session_hits, 1);
        assert_eq!(second.memory_len(), 1);

        // Back-filled entry keeps the original expiry
        clock.advance(Duration::from_secs(60));
        assert_eq!(second.get("a"), None);
    }

    #[test]
    fn test_session_uses_namespace_and_wire_format() {
        let clock = Arc::new(ManualClock::new(100));
        let session = Arc::new(MemorySessionStore::new());
        let cache: TtlCache<u64> = TtlCacheBuilder::new(session.clone())
            .clock(clock)
            .namespace("ns:")
            .default_ttl(Duration::from_secs(1))
            .build();

        cache.set("k", 7);
        let raw = session.get("ns:k").unwrap().unwrap();
        assert_eq!(raw, r#"{"v":7,"e":1100}"#);
    }

    #[test]
    fn test_session_failure_is_swallowed() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_with(Arc::new(MemorySessionStore::unavailable()), clock);

        cache.set("a", Count::Lines(1));
        assert_eq!(cache.get("a"), Some(Count::Lines(1)));
        assert_eq!(cache.get("b"), None);
        assert!(cache.stats().session_errors >= 2);
    }

    #[test]
    fn test_session_quota_failure_keeps_memory() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_with(Arc::new(MemorySessionStore::with_quota(4)), clock);

        cache.set("long-key", Count::Lines(99));
        assert_eq!(cache.get("long-key"), Some(Count::Lines(99)));
    }

    #[test]
    fn test_malformed_session_entry_is_miss() {
        let clock = Arc::new(ManualClock::new(0));
        let session = Arc::new(MemorySessionStore::new());
        session.set("tally:a", "not json").unwrap();

        let cache = cache_with(session, clock);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_hit_rate() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_with(Arc::new(MemorySessionStore::new()), clock);

        cache.set("a", Count::Lines(1));
        cache.get("a");
        cache.get("a");
        cache.get("missing");

        let hit_rate = cache.stats().hit_rate();
        assert!((hit_rate - 0.666).abs() < 0.01);
    }
}
