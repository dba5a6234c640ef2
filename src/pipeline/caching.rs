// Caching pipeline - two-level feature gram cache keyed by window identity
//
// Unprocessed grams are cached under (window, extractor, size, shift), so
// descriptors that share an extractor but differ in processor reuse the same
// extraction. Processed grams are cached under (window, descriptor).
// Extraction for one window is serialized through a striped lock so that
// concurrent requests for the same window compute each gram once.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cache::{CacheContext, KeyPart};
use crate::cache_key;
use crate::error::FeatureError;
use crate::features::FeatureGram;
use crate::identity::InstanceId;
use crate::window::{DataWindow, WindowPayload};

use super::iterable::{DiskCacheProvider, FeatureGramIterable, LabeledWindowSource, NoDiskCache};
use super::memory_cache_iterable::MemoryCachingIterable;
use super::policy::CachingStrategy;
use super::{
    FeatureExtractionPipeline, FeatureGramDescriptor, LabeledFeatureIterable,
    WindowFeaturePipeline,
};

pub struct CachingFeatureExtractionPipeline {
    inner: FeatureExtractionPipeline,
    ctx: Arc<CacheContext>,
    gram_strategy: CachingStrategy,
    window_locks: Vec<Mutex<()>>,
    disk: Arc<dyn DiskCacheProvider>,
}

impl CachingFeatureExtractionPipeline {
    /// Build a pipeline whose caches live in `ctx`.
    ///
    /// Gram caching is resolved once here from the context configuration.
    pub fn new(
        ctx: Arc<CacheContext>,
        descriptors: Vec<FeatureGramDescriptor>,
    ) -> Result<Self, FeatureError> {
        let config = ctx.config();
        let inner = FeatureExtractionPipeline::new(descriptors, &config.features)?;
        let gram_strategy = CachingStrategy::resolve(
            config.cache.enabled && config.features.gram_caching_enabled,
            true,
            false,
            ctx.advisories(),
        );
        let window_locks = (0..config.features.window_locks.max(1))
            .map(|_| Mutex::new(()))
            .collect();

        log::info!(
            "[FeatureCache] Pipeline with {} descriptor(s), gram caching {:?}",
            inner.descriptors().len(),
            gram_strategy
        );

        Ok(Self {
            inner,
            ctx,
            gram_strategy,
            window_locks,
            disk: Arc::new(NoDiskCache),
        })
    }

    /// Use `provider` for disk-backed caching of labeled feature iterables.
    pub fn with_disk_provider(mut self, provider: Arc<dyn DiskCacheProvider>) -> Self {
        self.disk = provider;
        self
    }

    pub fn context(&self) -> &Arc<CacheContext> {
        &self.ctx
    }

    pub fn descriptors(&self) -> &[FeatureGramDescriptor] {
        self.inner.descriptors()
    }

    pub fn gram_strategy(&self) -> CachingStrategy {
        self.gram_strategy
    }

    fn window_lock(&self, id: InstanceId) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        let stripe = (hasher.finish() % self.window_locks.len() as u64) as usize;
        self.window_locks[stripe]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn unprocessed_gram<P: WindowPayload>(
        &self,
        window: &Arc<DataWindow<P>>,
        descriptor: &FeatureGramDescriptor,
    ) -> Result<Arc<FeatureGram>, FeatureError> {
        let key = cache_key!(
            window.id(),
            KeyPart::Signature(descriptor.extractor().signature()),
            descriptor.window_size_msec(),
            descriptor.window_shift_msec()
        );
        let mut computed = false;
        let gram = self.ctx.feature_cache().get_or_try_insert_with(key, || {
            computed = true;
            descriptor
                .extract_unprocessed(window, self.inner.parallel_threshold())
                .map(Arc::new)
        })?;
        if computed {
            tracing::debug!(
                window = %window.id(),
                extractor = descriptor.extractor().name(),
                features = gram.len(),
                "unprocessed gram miss"
            );
        } else {
            tracing::trace!(window = %window.id(), "unprocessed gram hit");
        }
        Ok(gram)
    }

    fn processed_gram<P: WindowPayload>(
        &self,
        window: &Arc<DataWindow<P>>,
        descriptor: &FeatureGramDescriptor,
    ) -> Result<Arc<FeatureGram>, FeatureError> {
        let key = cache_key!(window.id(), KeyPart::Signature(descriptor.signature()));
        let mut computed = false;
        let gram = self.ctx.gram_cache().get_or_try_insert_with(key, || {
            computed = true;
            let unprocessed = self.unprocessed_gram(window, descriptor)?;
            descriptor.process(unprocessed)
        })?;
        if !computed {
            tracing::trace!(window = %window.id(), "processed gram hit");
        }
        Ok(gram)
    }

    /// Feature grams for every window of `source`, wrapped in the caching
    /// strategy resolved from `use_memory` and `use_disk`.
    pub fn extract_all<P: WindowPayload>(
        self: &Arc<Self>,
        source: LabeledWindowSource<P>,
        use_memory: bool,
        use_disk: bool,
    ) -> Arc<dyn FeatureGramIterable> {
        let pipeline: Arc<dyn WindowFeaturePipeline<P>> = Arc::clone(self) as _;
        let streaming = self.ctx.config().features.streaming_enabled;
        let iterable = Arc::new(LabeledFeatureIterable::new(source, pipeline, streaming));
        self.cache_iterable(iterable, use_memory, use_disk)
    }

    /// Wrap `iterable` in memory and/or disk caching.
    ///
    /// Caching is skipped for iterables that are not streamed, and a disk
    /// request the provider cannot satisfy degrades to memory or no caching.
    pub fn cache_iterable(
        &self,
        iterable: Arc<dyn FeatureGramIterable>,
        use_memory: bool,
        use_disk: bool,
    ) -> Arc<dyn FeatureGramIterable> {
        let features = &self.ctx.config().features;
        let mut strategy = CachingStrategy::resolve(
            self.ctx.config().cache.enabled && features.labeled_caching_enabled,
            use_memory,
            use_disk,
            self.ctx.advisories(),
        );
        if strategy == CachingStrategy::Uncached {
            return iterable;
        }
        if !iterable.is_streamed() {
            self.ctx.advisories().not_streamed();
            return iterable;
        }

        if let CachingStrategy::Disk { with_memory } = strategy {
            let memory = with_memory.then(|| Arc::clone(self.ctx.labeled_cache()));
            match self.disk.disk_caching_iterable(Arc::clone(&iterable), memory) {
                Some(cached) => return cached,
                None => {
                    strategy = strategy.without_disk();
                    self.ctx.advisories().disk_unavailable(strategy);
                }
            }
        }

        if strategy.uses_memory() {
            Arc::new(MemoryCachingIterable::new(
                iterable,
                Arc::clone(self.ctx.labeled_cache()),
            ))
        } else {
            iterable
        }
    }
}

impl<P: WindowPayload> WindowFeaturePipeline<P> for CachingFeatureExtractionPipeline {
    fn extract(&self, window: &Arc<DataWindow<P>>) -> Result<Vec<Arc<FeatureGram>>, FeatureError> {
        if self.gram_strategy == CachingStrategy::Uncached {
            return self.inner.extract(window);
        }
        let _guard = self.window_lock(window.id());
        self.inner
            .descriptors()
            .iter()
            .map(|descriptor| self.processed_gram(window, descriptor))
            .collect()
    }
}

impl fmt::Debug for CachingFeatureExtractionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingFeatureExtractionPipeline")
            .field("descriptors", &self.inner.descriptors())
            .field("gram_strategy", &self.gram_strategy)
            .field("window_locks", &self.window_locks.len())
            .finish()
    }
}
