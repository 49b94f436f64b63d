//! In-memory result cache.
//!
//! [`CacheStore`] maps canonical query keys to previously computed pages.
//! Entries expire lazily: a lookup that finds an entry older than the TTL
//! deletes it and reports a miss. When the store is full, inserting a new key
//! evicts the oldest inserted entry. Recently read entries get no special
//! treatment.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::query::{canonical_string, DataQuery};
use crate::value::Timestamp;

/// Cache settings.
///
/// Deserializes from camelCase with every field optional; `ttl` is given in
/// milliseconds.
///
/// ```
/// use std::time::Duration;
/// use standout_query::CacheConfig;
///
/// let config: CacheConfig = serde_json::from_str(r#"{"ttl": 1500, "maxSize": 8}"#).unwrap();
/// assert!(config.enabled);
/// assert_eq!(config.ttl, Duration::from_millis(1500));
/// assert_eq!(config.max_size, 8);
/// assert_eq!(config.key_prefix, "query:");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    pub enabled: bool,
    #[serde(with = "duration_ms")]
    pub ttl: Duration,
    pub max_size: usize,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(5 * 60),
            max_size: 100,
            key_prefix: "query:".to_string(),
        }
    }
}

impl CacheConfig {
    /// A configuration that never stores anything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// A stored value and when it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub stored_at: Timestamp,
}

/// Occupancy snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<String>,
}

/// Bounded TTL cache with first-in-first-out eviction.
///
/// All operations take `&self`; the map and the insertion order live behind a
/// single mutex so the check-evict-insert sequence of [`set`](Self::set) is
/// atomic.
pub struct CacheStore<V> {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner<V>>,
}

impl<V> std::fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("config", &self.config)
            .field("size", &self.inner.lock().entries.len())
            .finish()
    }
}

impl<V: Clone> CacheStore<V> {
    /// Creates a store reading time from the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a store with an explicit time source.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns `true` if the store can hold anything.
    pub fn is_active(&self) -> bool {
        self.config.enabled && self.config.max_size > 0
    }

    /// Looks up a live entry, deleting it if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        self.entry(key).map(|entry| entry.value)
    }

    /// Like [`get`](Self::get) but returns the whole entry.
    pub fn entry(&self, key: &str) -> Option<CacheEntry<V>> {
        if !self.config.enabled {
            return None;
        }
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let stored_at = inner.entries.get(key)?.stored_at;
        if self.is_expired(stored_at, now) {
            trace!(key, "cache entry expired");
            inner.entries.remove(key);
            inner.order.retain(|k| k != key);
            return None;
        }
        inner.entries.get(key).cloned()
    }

    /// Stores `value` under `key`.
    ///
    /// Replacing an existing key refreshes its timestamp and keeps its place
    /// in the eviction order. Inserting a new key into a full store evicts
    /// the oldest inserted entry first.
    pub fn set(&self, key: impl Into<String>, value: V) {
        if !self.is_active() {
            return;
        }
        let key = key.into();
        let stored_at = self.clock.now();
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.value = value;
            entry.stored_at = stored_at;
            return;
        }

        while inner.entries.len() >= self.config.max_size {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            if inner.entries.remove(&oldest).is_some() {
                debug!(key = %oldest, "cache full, evicted oldest entry");
            }
        }

        inner.order.push_back(key.clone());
        inner.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                stored_at,
            },
        );
    }

    /// Deletes one entry. Returns `true` if it was present.
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.entries.remove(key).is_some();
        if removed {
            inner.order.retain(|k| k != key);
        }
        removed
    }

    /// Deletes every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Returns the number of stored entries (expired ones included until
    /// they are looked up) and the capacity.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.inner.lock().entries.len(),
            max_size: self.config.max_size,
        }
    }

    /// Derives the key for `query` under this store's prefix.
    pub fn key_for(&self, query: &DataQuery) -> serde_json::Result<String> {
        cache_key(query, &self.config.key_prefix)
    }

    fn is_expired(&self, stored_at: Timestamp, now: Timestamp) -> bool {
        let age = now.as_millis().saturating_sub(stored_at.as_millis());
        let ttl = i64::try_from(self.config.ttl.as_millis()).unwrap_or(i64::MAX);
        age > ttl
    }
}

/// Derives the cache key of a query: `prefix` followed by the hex SHA-256 of
/// its canonical form. Queries that differ only in ways that cannot change
/// the result share a key.
pub fn cache_key(query: &DataQuery, prefix: &str) -> serde_json::Result<String> {
    let canonical = canonical_string(&query.canonical_form()?);
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(format!("{prefix}{digest:x}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::filter::FilterCondition;
    use crate::op::Op;

    fn store(config: CacheConfig) -> (CacheStore<u32>, Arc<MockClock>) {
        let clock = Arc::new(MockClock::new(Timestamp(1_000_000)));
        (CacheStore::with_clock(config, clock.clone()), clock)
    }

    fn sized(max_size: usize) -> CacheConfig {
        CacheConfig {
            max_size,
            ..CacheConfig::default()
        }
    }

    #[test]
    fn get_after_set() {
        let (cache, _) = store(CacheConfig::default());
        assert_eq!(cache.get("a"), None);
        cache.set("a", 1);
        assert_eq!(cache.get("a"), Some(1));
        let entry = cache.entry("a").unwrap();
        assert_eq!(entry.key, "a");
        assert_eq!(entry.stored_at, Timestamp(1_000_000));
    }

    #[test]
    fn expired_entries_are_removed_on_read() {
        let config = CacheConfig {
            ttl: Duration::from_secs(10),
            ..CacheConfig::default()
        };
        let (cache, clock) = store(config);
        cache.set("a", 1);

        clock.advance(Duration::from_secs(10));
        assert_eq!(cache.get("a"), Some(1), "age equal to ttl is still live");

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn oldest_inserted_is_evicted() {
        let (cache, _) = store(sized(3));
        for (i, key) in ["a", "b", "c"].into_iter().enumerate() {
            cache.set(key, i as u32);
        }
        // Reading does not protect an entry
        assert_eq!(cache.get("a"), Some(0));

        cache.set("d", 3);
        assert_eq!(cache.stats(), CacheStats { size: 3, max_size: 3 });
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(1));
        assert_eq!(cache.get("d"), Some(3));
    }

    #[test]
    fn replacing_a_key_resets_age_without_eviction() {
        let config = CacheConfig {
            ttl: Duration::from_secs(10),
            max_size: 2,
            ..CacheConfig::default()
        };
        let (cache, clock) = store(config);
        cache.set("a", 1);
        cache.set("b", 2);

        clock.advance(Duration::from_secs(8));
        cache.set("a", 10);
        assert_eq!(cache.stats().size, 2);

        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn replaced_key_keeps_its_eviction_slot() {
        let (cache, _) = store(sized(2));
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 3);
        cache.set("c", 4);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(4));
    }

    #[test]
    fn disabled_store_is_inert() {
        let (cache, _) = store(CacheConfig::disabled());
        cache.set("a", 1);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.stats().size, 0);

        let (zero, _) = store(sized(0));
        zero.set("a", 1);
        assert_eq!(zero.get("a"), None);
        assert!(!zero.is_active());
    }

    #[test]
    fn remove_and_clear() {
        let (cache, _) = store(sized(2));
        cache.set("a", 1);
        cache.set("b", 2);
        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));

        // Removal frees a slot without disturbing the rest
        cache.set("c", 3);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));

        cache.clear();
        assert_eq!(cache.stats().size, 0);
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn keys_are_prefixed_hashes() {
        let query = DataQuery {
            filters: vec![FilterCondition::new("status", Op::Eq, "open")],
            ..DataQuery::default()
        };
        let key = cache_key(&query, "query:").unwrap();
        assert!(key.starts_with("query:"));
        assert_eq!(key.len(), "query:".len() + 64);
        assert_eq!(key, cache_key(&query.clone(), "query:").unwrap());
        assert_ne!(key, cache_key(&DataQuery::default(), "query:").unwrap());
    }

    #[test]
    fn config_serde_uses_millis() {
        let json = serde_json::to_value(CacheConfig::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "enabled": true,
                "ttl": 300000,
                "maxSize": 100,
                "keyPrefix": "query:"
            })
        );
    }
}
