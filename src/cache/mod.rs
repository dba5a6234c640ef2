//! Caching subsystem.
//!
//! - `key`: ordered, value-compared cache keys and the `cache_key!` macro
//! - `multi_key`: the bounded, sharded, type-erased [`MultiKeyCache`]
//! - `registry`: managed cache lifecycle (bulk clear/free)
//!
//! [`CacheContext`] is the explicitly passed owner of every cache a set of
//! windows and pipelines share. Tests get isolation through
//! [`CacheContext::new_scope`] instead of a hidden process-wide cache.

mod key;
mod multi_key;
mod registry;

use std::sync::Arc;

pub use key::{CacheKey, KeyPart};
pub use multi_key::MultiKeyCache;
pub use registry::CacheRegistry;

use crate::config::EngineConfig;
use crate::pipeline::AdvisoryLog;
use crate::telemetry::CacheStatsSnapshot;

/// Window derivation and feature caches shared by one evaluation scope
#[derive(Debug)]
pub struct CacheContext {
    config: EngineConfig,
    registry: CacheRegistry,
    windows: Arc<MultiKeyCache>,
    features: Arc<MultiKeyCache>,
    grams: Arc<MultiKeyCache>,
    labeled: Arc<MultiKeyCache>,
    advisories: AdvisoryLog,
}

impl CacheContext {
    pub fn new(config: EngineConfig) -> Self {
        let registry = CacheRegistry::new(config.cache.clone());
        let windows = registry.new_managed_cache("windows");
        let features = registry.new_managed_cache("unprocessed-features");
        let grams = registry.new_managed_cache("processed-features");
        let labeled = registry.new_managed_cache("labeled-features");
        if !config.cache.enabled {
            log::info!("[CacheContext] Caching disabled by configuration");
        }
        Self {
            config,
            registry,
            windows,
            features,
            grams,
            labeled,
            advisories: AdvisoryLog::default(),
        }
    }

    /// Context configured from [`EngineConfig::global`]
    pub fn from_global() -> Self {
        Self::new(EngineConfig::global().clone())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    /// Sub-window and resize results, keyed by parent window identity
    pub fn window_cache(&self) -> &Arc<MultiKeyCache> {
        &self.windows
    }

    /// Unprocessed feature grams, keyed by (window, extractor, size, shift)
    pub fn feature_cache(&self) -> &Arc<MultiKeyCache> {
        &self.features
    }

    /// Processed feature grams, keyed by (window, descriptor)
    pub fn gram_cache(&self) -> &Arc<MultiKeyCache> {
        &self.grams
    }

    /// Labeled feature grams of memory-caching iterables, keyed by (iterable, index)
    pub fn labeled_cache(&self) -> &Arc<MultiKeyCache> {
        &self.labeled
    }

    pub fn advisories(&self) -> &AdvisoryLog {
        &self.advisories
    }

    /// Clear every managed cache of this context.
    pub fn reset(&self) {
        self.registry.clear_managed_caches();
    }

    /// Fresh, isolated context with the same configuration
    pub fn new_scope(&self) -> Self {
        Self::new(self.config.clone())
    }

    pub fn stats(&self) -> Vec<CacheStatsSnapshot> {
        self.registry.stats()
    }
}

impl Default for CacheContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_key;

    #[test]
    fn test_context_owns_four_managed_caches() {
        let ctx = CacheContext::default();
        assert_eq!(ctx.registry().managed_cache_count(), 4);
        assert_eq!(ctx.stats().len(), 4);
    }

    #[test]
    fn test_reset_clears_caches() {
        let ctx = CacheContext::default();
        ctx.window_cache().put(cache_key!("w"), Arc::new(1u8));
        ctx.gram_cache().put(cache_key!("g"), Arc::new(1u8));
        ctx.reset();
        assert!(ctx.window_cache().is_empty());
        assert!(ctx.gram_cache().is_empty());
    }

    #[test]
    fn test_new_scope_is_isolated() {
        let ctx = CacheContext::default();
        ctx.window_cache().put(cache_key!("w"), Arc::new(1u8));
        let scoped = ctx.new_scope();
        assert!(scoped.window_cache().is_empty());
        assert_eq!(scoped.config(), ctx.config());
        assert_eq!(ctx.window_cache().len(), 1);
    }
}
