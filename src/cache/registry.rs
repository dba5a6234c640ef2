// CacheRegistry - owner of the managed caches of one context

use std::sync::{Arc, Mutex, PoisonError};

use crate::config::CacheConfig;
use crate::telemetry::CacheStatsSnapshot;

use super::MultiKeyCache;

/// Creates caches from a shared [`CacheConfig`] and tracks the managed ones
/// so they can be cleared in bulk between independent runs.
#[derive(Debug)]
pub struct CacheRegistry {
    config: CacheConfig,
    managed: Mutex<Vec<Arc<MultiKeyCache>>>,
}

impl CacheRegistry {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            managed: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// New cache that is cleared by [`clear_managed_caches`](Self::clear_managed_caches)
    pub fn new_managed_cache(&self, name: &str) -> Arc<MultiKeyCache> {
        let cache = Arc::new(MultiKeyCache::from_config(name, &self.config));
        self.managed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&cache));
        log::debug!("[CacheRegistry] Created managed cache '{}'", name);
        cache
    }

    /// New cache whose lifetime is entirely up to the caller
    pub fn new_unmanaged_cache(&self, name: &str) -> Arc<MultiKeyCache> {
        Arc::new(MultiKeyCache::from_config(name, &self.config))
    }

    /// Clear and stop tracking a managed cache. Returns false if it was not managed here.
    pub fn free_managed_cache(&self, cache: &Arc<MultiKeyCache>) -> bool {
        let mut managed = self.managed.lock().unwrap_or_else(PoisonError::into_inner);
        match managed.iter().position(|c| Arc::ptr_eq(c, cache)) {
            Some(index) => {
                managed.swap_remove(index);
                cache.clear();
                true
            }
            None => false,
        }
    }

    pub fn clear_managed_caches(&self) {
        let managed = self.managed.lock().unwrap_or_else(PoisonError::into_inner);
        for cache in managed.iter() {
            cache.clear();
        }
        log::info!("[CacheRegistry] Cleared {} managed caches", managed.len());
    }

    pub fn managed_cache_count(&self) -> usize {
        self.managed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn stats(&self) -> Vec<CacheStatsSnapshot> {
        self.managed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|cache| cache.stats())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_key;

    #[test]
    fn test_managed_caches_clear_together() {
        let registry = CacheRegistry::new(CacheConfig::default());
        let a = registry.new_managed_cache("a");
        let b = registry.new_managed_cache("b");
        let unmanaged = registry.new_unmanaged_cache("u");
        for cache in [&a, &b, &unmanaged] {
            cache.put(cache_key!("k"), Arc::new(1u8));
        }

        assert_eq!(registry.managed_cache_count(), 2);
        registry.clear_managed_caches();
        assert!(a.is_empty());
        assert!(b.is_empty());
        assert_eq!(unmanaged.len(), 1);
    }

    #[test]
    fn test_free_managed_cache() {
        let registry = CacheRegistry::new(CacheConfig::default());
        let a = registry.new_managed_cache("a");
        a.put(cache_key!("k"), Arc::new(1u8));

        assert!(registry.free_managed_cache(&a));
        assert!(a.is_empty());
        assert_eq!(registry.managed_cache_count(), 0);
        assert!(!registry.free_managed_cache(&a));
    }

    #[test]
    fn test_stats_per_managed_cache() {
        let registry = CacheRegistry::new(CacheConfig::default());
        registry.new_managed_cache("windows");
        registry.new_managed_cache("features");
        let names: Vec<String> = registry.stats().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["windows".to_string(), "features".to_string()]);
    }

    #[test]
    fn test_disabled_config_yields_disabled_caches() {
        let registry = CacheRegistry::new(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        });
        assert!(!registry.new_managed_cache("x").is_enabled());
    }
}
