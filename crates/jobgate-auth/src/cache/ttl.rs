//! Bounded LRU cache with a fixed per-entry lifetime.
//!
//! Entries live for exactly `ttl` from insertion; reading an entry refreshes
//! its LRU recency but never its lifetime. When the cache is full, inserting
//! a new key evicts the least-recently-used entry.
//!
//! All state sits behind one `parking_lot::Mutex` whose critical sections are
//! O(1) and never span an `.await`.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::AuthResult;
use crate::error::AuthError;

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of entries currently stored (expired entries not yet reclaimed included).
    pub size: usize,
    /// Maximum number of entries.
    pub capacity: usize,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, expired reads included.
    pub misses: u64,
    /// Number of entries dropped because their lifetime elapsed.
    pub expirations: u64,
    /// Number of live entries evicted to make room.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Cached value with its insertion instant.
struct CachedEntry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> CachedEntry<V> {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) < ttl
    }
}

/// Concurrency-safe key/value cache with fixed capacity and fixed TTL.
pub struct BoundedTtlCache<K, V> {
    entries: Mutex<LruCache<K, CachedEntry<V>>>,
    capacity: NonZeroUsize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> BoundedTtlCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries for `ttl` each.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `capacity` is zero.
    pub fn new(capacity: usize, ttl: Duration) -> AuthResult<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| AuthError::configuration("cache capacity must be > 0"))?;

        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    /// Look up `key`, marking it most recently used.
    ///
    /// An entry older than the TTL is removed and reported as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get(key) {
            if entry.is_fresh(now, self.ttl) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        // Entry expired, remove it
        entries.pop(key);
        self.expirations.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or replace `key`, evicting the least-recently-used entry when full.
    ///
    /// Replacing a key restarts its lifetime.
    pub fn set(&self, key: K, value: V) {
        let entry = CachedEntry {
            value,
            inserted_at: Instant::now(),
        };

        let mut entries = self.entries.lock();
        let replacing = entries.contains(&key);
        if entries.push(key, entry).is_some() && !replacing {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(capacity = self.capacity.get(), "Evicted least recently used entry");
        }
    }

    /// Returns `true` if `key` holds a live entry. Does not touch recency.
    pub fn contains(&self, key: &K) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .peek(key)
            .is_some_and(|entry| entry.is_fresh(now, self.ttl))
    }

    /// Remove `key`, returning its value if it was live.
    pub fn remove(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.entries
            .lock()
            .pop(key)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| entry.value)
    }

    /// Clear all cached entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Get cache statistics for monitoring.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            capacity: self.capacity.get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl<K, V> BoundedTtlCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Clean up expired entries.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let stale: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now, self.ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            entries.pop(key);
        }

        if !stale.is_empty() {
            self.expirations
                .fetch_add(stale.len() as u64, Ordering::Relaxed);
        }

        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cache(capacity: usize) -> BoundedTtlCache<String, u32> {
        BoundedTtlCache::new(capacity, Duration::from_secs(300)).unwrap()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = BoundedTtlCache::<String, u32>::new(0, Duration::from_secs(1));
        assert!(matches!(result, Err(AuthError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = cache(4);
        cache.set("a".to_string(), 1);

        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert!(cache.contains(&"a".to_string()));
        assert_eq!(cache.get(&"b".to_string()), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = BoundedTtlCache::new(4, Duration::from_secs(300)).unwrap();
        cache.set("a".to_string(), 1_u32);

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get(&"a".to_string()), Some(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cache.contains(&"a".to_string()));
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_access_does_not_extend_lifetime() {
        let cache = BoundedTtlCache::new(4, Duration::from_secs(10)).unwrap();
        cache.set("a".to_string(), 1_u32);

        for _ in 0..9 {
            tokio::time::advance(Duration::from_secs(1)).await;
            assert_eq!(cache.get(&"a".to_string()), Some(1));
        }

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_restarts_lifetime() {
        let cache = BoundedTtlCache::new(4, Duration::from_secs(10)).unwrap();
        cache.set("a".to_string(), 1_u32);
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("a".to_string(), 2);
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(cache.get(&"a".to_string()), Some(2));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[tokio::test]
    async fn test_capacity_plus_one_evicts_lru() {
        let cache = cache(3);
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);
        cache.set("c".to_string(), 3);

        // Touch "a" so "b" becomes least recently used
        assert_eq!(cache.get(&"a".to_string()), Some(1));

        cache.set("d".to_string(), 4);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&"b".to_string()), None);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"c".to_string()), Some(3));
        assert_eq!(cache.get(&"d".to_string()), Some(4));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_without_access_oldest_insert_is_evicted() {
        let cache = cache(2);
        cache.set("first".to_string(), 1);
        cache.set("second".to_string(), 2);
        cache.set("third".to_string(), 3);

        assert!(!cache.contains(&"first".to_string()));
        assert!(cache.contains(&"second".to_string()));
    }

    #[tokio::test]
    async fn test_contains_does_not_touch_recency() {
        let cache = cache(2);
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);

        assert!(cache.contains(&"a".to_string()));
        cache.set("c".to_string(), 3);

        // "a" stayed least recently used despite the contains() call
        assert!(!cache.contains(&"a".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = BoundedTtlCache::new(8, Duration::from_secs(5)).unwrap();
        cache.set("a".to_string(), 1_u32);
        cache.set("b".to_string(), 2);
        tokio::time::advance(Duration::from_secs(3)).await;
        cache.set("c".to_string(), 3);
        tokio::time::advance(Duration::from_secs(3)).await;

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&"c".to_string()));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let cache = cache(4);
        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);

        assert_eq!(cache.remove(&"a".to_string()), Some(1));
        assert_eq!(cache.remove(&"a".to_string()), None);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_stay_bounded() {
        let cache = Arc::new(BoundedTtlCache::new(16, Duration::from_secs(60)).unwrap());

        let mut handles = Vec::new();
        for worker in 0..8_u32 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                for i in 0..200_u32 {
                    cache.set(format!("key-{}", i % 32), worker);
                    let _ = cache.get(&format!("key-{}", (i + worker) % 32));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(cache.len() <= 16);
        // Last write wins: every surviving value came from some worker
        for i in 0..32_u32 {
            if let Some(v) = cache.get(&format!("key-{i}")) {
                assert!(v < 8);
            }
        }
    }
}
