// MultiKeyCache - bounded, sharded, type-erased cache
//
// Keys are ordered tuples of key parts. Values are stored as
// `Arc<dyn Any + Send + Sync>` and handed back typed; a type mismatch is
// treated as a miss. Each shard is an independently locked map so that
// concurrent access to different keys rarely contends, and a write never
// exposes a half-built value because values are fully constructed before
// insertion.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::CacheConfig;
use crate::telemetry::{CacheStats, CacheStatsSnapshot};

use super::CacheKey;

type Value = Arc<dyn Any + Send + Sync>;

struct Entry {
    value: Value,
    last_used: AtomicU64,
}

type Shard = RwLock<HashMap<CacheKey, Entry>>;

/// Thread-safe bounded cache keyed by [`CacheKey`]
pub struct MultiKeyCache {
    name: String,
    enabled: bool,
    capacity: usize,
    shard_capacity: usize,
    shards: Vec<Shard>,
    clock: AtomicU64,
    stats: CacheStats,
}

impl MultiKeyCache {
    /// Create an enabled cache holding at most roughly `capacity` entries
    pub fn new(name: impl Into<String>, capacity: usize, shards: usize) -> Self {
        Self::build(name.into(), true, capacity, shards)
    }

    /// A cache that always misses and drops every put
    pub fn disabled(name: impl Into<String>) -> Self {
        Self::build(name.into(), false, 0, 1)
    }

    pub fn from_config(name: impl Into<String>, config: &CacheConfig) -> Self {
        Self::build(name.into(), config.enabled, config.capacity, config.shards)
    }

    fn build(name: String, enabled: bool, capacity: usize, shards: usize) -> Self {
        let capacity = capacity.max(1);
        let shard_count = shards.clamp(1, capacity);
        let shard_capacity = capacity.div_ceil(shard_count);
        Self {
            name,
            enabled,
            capacity,
            shard_capacity,
            shards: (0..shard_count)
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
            clock: AtomicU64::new(0),
            stats: CacheStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn shard(&self, key: &CacheKey) -> &Shard {
        let index = (key.hash_value() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Typed lookup; absent, evicted or differently-typed entries are misses.
    pub fn get<T: Any + Send + Sync>(&self, key: &CacheKey) -> Option<Arc<T>> {
        if !self.enabled {
            self.stats.record_miss();
            return None;
        }

        let shard = self
            .shard(key)
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let found = shard.get(key).and_then(|entry| {
            entry.last_used.store(self.tick(), Ordering::Relaxed);
            Arc::clone(&entry.value).downcast::<T>().ok()
        });

        match &found {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        found
    }

    /// Insert or replace; last write wins.
    pub fn put<T: Any + Send + Sync>(&self, key: CacheKey, value: Arc<T>) {
        if !self.enabled {
            return;
        }

        let mut shard = self
            .shard(&key)
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        shard.insert(
            key,
            Entry {
                value,
                last_used: AtomicU64::new(self.tick()),
            },
        );
        self.stats.record_insert();
        self.evict_if_needed(&mut shard);
    }

    /// Return the cached value for `key`, computing and inserting it on a miss.
    ///
    /// The computation runs outside any lock. If another thread inserted the
    /// same key meanwhile, its value is returned and ours is dropped, so all
    /// callers observe a single instance per key while it stays cached.
    pub fn get_or_try_insert_with<T, E, F>(&self, key: CacheKey, compute: F) -> Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<Arc<T>, E>,
    {
        if let Some(found) = self.get::<T>(&key) {
            return Ok(found);
        }

        let computed = compute()?;
        if !self.enabled {
            return Ok(computed);
        }

        let mut shard = self
            .shard(&key)
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = shard
            .get(&key)
            .and_then(|entry| Arc::clone(&entry.value).downcast::<T>().ok())
        {
            return Ok(existing);
        }

        let stored: Value = computed.clone();
        shard.insert(
            key,
            Entry {
                value: stored,
                last_used: AtomicU64::new(self.tick()),
            },
        );
        self.stats.record_insert();
        self.evict_if_needed(&mut shard);
        Ok(computed)
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        self.shard(key)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.write().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot(&self.name, self.len())
    }

    /// Drop the least recently used eighth of an over-full shard.
    fn evict_if_needed(&self, shard: &mut HashMap<CacheKey, Entry>) {
        if shard.len() <= self.shard_capacity {
            return;
        }

        let batch = (self.shard_capacity / 8).max(1) + (shard.len() - self.shard_capacity);
        let mut by_age: Vec<(u64, CacheKey)> = shard
            .iter()
            .map(|(key, entry)| (entry.last_used.load(Ordering::Relaxed), key.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(last_used, _)| *last_used);

        let evicted = batch.min(by_age.len());
        for (_, key) in by_age.into_iter().take(evicted) {
            shard.remove(&key);
        }
        self.stats.record_evictions(evicted);
        tracing::debug!(cache = %self.name, evicted, "evicted least recently used entries");
    }
}

impl std::fmt::Debug for MultiKeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiKeyCache")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("capacity", &self.capacity)
            .field("shards", &self.shards.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_key;
    use crate::identity::InstanceId;
    use std::thread;

    #[test]
    fn test_get_put() {
        let cache = MultiKeyCache::new("test", 100, 4);
        let id = InstanceId::next();
        let key = cache_key!(id, 0usize, 10usize);

        assert!(cache.get::<String>(&key).is_none());
        cache.put(key.clone(), Arc::new("hello".to_string()));
        assert_eq!(cache.get::<String>(&key).unwrap().as_str(), "hello");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_type_mismatch_is_miss() {
        let cache = MultiKeyCache::new("test", 100, 4);
        let key = cache_key!(InstanceId::next(), 1usize);
        cache.put(key.clone(), Arc::new(42u32));
        assert!(cache.get::<String>(&key).is_none());
        assert_eq!(*cache.get::<u32>(&key).unwrap(), 42);
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let cache = MultiKeyCache::disabled("off");
        let key = cache_key!(InstanceId::next(), 1usize);
        cache.put(key.clone(), Arc::new(1u8));
        assert!(cache.get::<u8>(&key).is_none());
        assert!(cache.is_empty());

        let computed = cache
            .get_or_try_insert_with(key, || Ok::<_, ()>(Arc::new(2u8)))
            .unwrap();
        assert_eq!(*computed, 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = MultiKeyCache::new("test", 100, 4);
        let a = cache_key!("a");
        let b = cache_key!("b");
        cache.put(a.clone(), Arc::new(1i32));
        cache.put(b.clone(), Arc::new(2i32));
        assert!(cache.remove(&a));
        assert!(!cache.remove(&a));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get::<i32>(&b).is_none());
    }

    #[test]
    fn test_eviction_bounds_size() {
        let cache = MultiKeyCache::new("bounded", 16, 1);
        for i in 0..100usize {
            cache.put(cache_key!(i), Arc::new(i));
        }
        assert!(cache.len() <= 16);
        let stats = cache.stats();
        assert!(stats.evictions >= 84);
        assert_eq!(stats.inserts, 100);
        // most recent insert survives
        assert_eq!(*cache.get::<usize>(&cache_key!(99usize)).unwrap(), 99);
    }

    #[test]
    fn test_eviction_prefers_least_recently_used() {
        let cache = MultiKeyCache::new("lru", 8, 1);
        for i in 0..8usize {
            cache.put(cache_key!(i), Arc::new(i));
        }
        // touch key 0 so it is the most recently used
        assert!(cache.get::<usize>(&cache_key!(0usize)).is_some());
        cache.put(cache_key!(100usize), Arc::new(100usize));

        assert!(cache.get::<usize>(&cache_key!(0usize)).is_some());
        assert!(cache.get::<usize>(&cache_key!(1usize)).is_none());
    }

    #[test]
    fn test_get_or_insert_computes_once() {
        let cache = MultiKeyCache::new("test", 100, 4);
        let key = cache_key!("k");
        let first = cache
            .get_or_try_insert_with(key.clone(), || Ok::<_, ()>(Arc::new(vec![1, 2, 3])))
            .unwrap();
        let second = cache
            .get_or_try_insert_with(key, || -> Result<Arc<Vec<i32>>, ()> {
                panic!("should not recompute")
            })
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_get_or_insert_propagates_errors() {
        let cache = MultiKeyCache::new("test", 100, 4);
        let key = cache_key!("err");
        let result = cache.get_or_try_insert_with(key.clone(), || Err::<Arc<u8>, _>("boom"));
        assert_eq!(result.unwrap_err(), "boom");
        assert!(cache.get::<u8>(&key).is_none());
    }

    #[test]
    fn test_concurrent_get_or_insert_single_instance() {
        let cache = Arc::new(MultiKeyCache::new("race", 1000, 8));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    cache
                        .get_or_try_insert_with(cache_key!("shared"), || {
                            Ok::<_, ()>(Arc::new(InstanceId::next()))
                        })
                        .unwrap()
                })
            })
            .collect();

        let ids: Vec<InstanceId> = handles.into_iter().map(|h| *h.join().unwrap()).collect();
        assert!(ids.iter().all(|id| *id == ids[0]));
    }

    #[test]
    fn test_stats_hits_and_misses() {
        let cache = MultiKeyCache::new("stats", 10, 2);
        let key = cache_key!("x");
        assert!(cache.get::<u8>(&key).is_none());
        cache.put(key.clone(), Arc::new(1u8));
        assert!(cache.get::<u8>(&key).is_some());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }
}
