//! Bounded in-memory cache tier
//!
//! LRU eviction by recency of `get`, with an independent per-entry TTL
//! checked lazily on access. TTL always takes precedence: an expired entry
//! is a miss no matter how recently it was used.

use crate::key::CacheKey;
use logsift_core::{ClassificationOutcome, Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct CacheEntry {
    value: ClassificationOutcome,
    inserted_at: Instant,
    ttl: Duration,
    last_access: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }
}

struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    // Monotonic access clock; cheaper than timestamps for LRU ordering
    clock: u64,
}

/// Thread-safe bounded in-memory tier
pub struct MemoryCache {
    max_entries: usize,
    default_ttl: Duration,
    inner: Mutex<Inner>,
}

impl MemoryCache {
    /// Create a cache; sizing defects are rejected here, at startup,
    /// rather than surfacing at request time
    pub fn new(max_entries: usize, default_ttl: Duration) -> Result<Self> {
        if max_entries == 0 {
            return Err(Error::config("cache max_entries must be positive"));
        }
        if default_ttl.is_zero() {
            return Err(Error::config("cache ttl must be positive"));
        }
        Ok(Self {
            max_entries,
            default_ttl,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                clock: 0,
            }),
        })
    }

    /// Look up a key, refreshing its recency on hit.
    ///
    /// Expired entries are removed and reported as misses.
    pub fn get(&self, key: &CacheKey) -> Option<ClassificationOutcome> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let clock = inner.clock;

        match inner.entries.get_mut(key) {
            Some(entry) if entry.is_expired(now) => {}
            Some(entry) => {
                entry.last_access = clock;
                return Some(entry.value.clone());
            }
            None => return None,
        }

        inner.entries.remove(key);
        None
    }

    /// Insert with the default TTL
    pub fn insert(&self, key: CacheKey, value: ClassificationOutcome) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    /// Insert with an explicit TTL, evicting as needed
    pub fn insert_with_ttl(&self, key: CacheKey, value: ClassificationOutcome, ttl: Duration) {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        // Reclaim expired entries before resorting to LRU eviction
        if inner.entries.len() >= self.max_entries && !inner.entries.contains_key(&key) {
            inner.entries.retain(|_, entry| !entry.is_expired(now));
        }
        if inner.entries.len() >= self.max_entries && !inner.entries.contains_key(&key) {
            if let Some(lru_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| key.clone())
            {
                tracing::debug!(key = %lru_key, "evicting least recently used cache entry");
                inner.entries.remove(&lru_key);
            }
        }

        inner.clock += 1;
        let clock = inner.clock;
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                ttl,
                last_access: clock,
            },
        );
    }

    /// Number of stored entries, including not-yet-reclaimed expired ones
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logsift_core::{Category, LogEntry, Stage};

    fn key(n: u32) -> CacheKey {
        CacheKey::from_entry(&LogEntry::new("src", format!("message {n}")))
    }

    fn outcome(label: &str) -> ClassificationOutcome {
        ClassificationOutcome::new(Category::new(label), Stage::Pattern)
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(MemoryCache::new(0, Duration::from_secs(60)).is_err());
        assert!(MemoryCache::new(10, Duration::ZERO).is_err());
    }

    #[test]
    fn get_returns_inserted_value() {
        let cache = MemoryCache::new(10, Duration::from_secs(60)).unwrap();
        cache.insert(key(1), outcome("user_action"));
        assert_eq!(cache.get(&key(1)), Some(outcome("user_action")));
        assert_eq!(cache.get(&key(2)), None);
    }

    #[test]
    fn least_recently_accessed_entry_is_evicted_first() {
        let cache = MemoryCache::new(3, Duration::from_secs(60)).unwrap();
        cache.insert(key(1), outcome("a"));
        cache.insert(key(2), outcome("b"));
        cache.insert(key(3), outcome("c"));

        // Touch 1 and 3 so 2 becomes least recently used
        cache.get(&key(1));
        cache.get(&key(3));

        cache.insert(key(4), outcome("d"));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&key(2)), None);
        assert!(cache.get(&key(1)).is_some());
        assert!(cache.get(&key(3)).is_some());
        assert!(cache.get(&key(4)).is_some());
    }

    #[test]
    fn expired_entry_is_a_miss_even_if_recently_used() {
        let cache = MemoryCache::new(10, Duration::from_secs(60)).unwrap();
        cache.insert_with_ttl(key(1), outcome("a"), Duration::from_nanos(1));

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&key(1)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_entries_are_reclaimed_before_lru_eviction() {
        let cache = MemoryCache::new(2, Duration::from_secs(60)).unwrap();
        cache.insert_with_ttl(key(1), outcome("a"), Duration::from_nanos(1));
        cache.insert(key(2), outcome("b"));

        std::thread::sleep(Duration::from_millis(5));

        // Capacity is reached, but the expired entry frees the slot
        cache.insert(key(3), outcome("c"));
        assert!(cache.get(&key(2)).is_some());
        assert!(cache.get(&key(3)).is_some());
    }
}
