// Pipeline - feature extraction over windows and labeled window sets
//
// Module organization:
// - gram_extractor: descriptors and sliding sub-window extraction
// - caching: the two-level caching pipeline
// - iterable: labeled window sources and lazily extracted feature iterables
// - memory_cache_iterable: memory-backed caching of a feature iterable
// - policy: caching strategy resolution and one-time advisories

mod caching;
mod gram_extractor;
mod iterable;
mod memory_cache_iterable;
mod policy;

use std::sync::Arc;

use crate::config::FeatureConfig;
use crate::error::FeatureError;
use crate::features::FeatureGram;
use crate::identity::InstanceId;
use crate::window::labeled::{Labels, Tags};
use crate::window::{DataWindow, LabeledWindow, WindowPayload};

pub use caching::CachingFeatureExtractionPipeline;
pub use gram_extractor::FeatureGramDescriptor;
pub use iterable::{
    DiskCacheProvider, FeatureGramIterable, FeatureItem, LabeledFeatureIterable, LabeledWindowSource,
    NoDiskCache, StreamedWindows,
};
pub use memory_cache_iterable::MemoryCachingIterable;
pub use policy::{AdvisoryLog, CachingStrategy};

/// Feature grams of one labeled window, carrying its labels along
#[derive(Debug, Clone)]
pub struct LabeledFeatureGram {
    window_id: InstanceId,
    labels: Labels,
    tags: Tags,
    trainable: bool,
    grams: Vec<Arc<FeatureGram>>,
}

impl LabeledFeatureGram {
    pub fn new<P: WindowPayload>(labeled: &LabeledWindow<P>, grams: Vec<Arc<FeatureGram>>) -> Self {
        Self {
            window_id: labeled.window().id(),
            labels: labeled.labels().clone(),
            tags: labeled.tags().clone(),
            trainable: labeled.is_trainable(),
            grams,
        }
    }

    /// Identity of the window the grams were extracted from
    pub fn window_id(&self) -> InstanceId {
        self.window_id
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn is_trainable(&self) -> bool {
        self.trainable
    }

    /// One gram per descriptor, in descriptor order
    pub fn grams(&self) -> &[Arc<FeatureGram>] {
        &self.grams
    }
}

/// Anything that turns a window into its feature grams
pub trait WindowFeaturePipeline<P: WindowPayload>: Send + Sync {
    fn extract(&self, window: &Arc<DataWindow<P>>) -> Result<Vec<Arc<FeatureGram>>, FeatureError>;

    fn extract_labeled(
        &self,
        labeled: &LabeledWindow<P>,
    ) -> Result<LabeledFeatureGram, FeatureError> {
        let grams = self.extract(labeled.window())?;
        Ok(LabeledFeatureGram::new(labeled, grams))
    }
}

/// Uncached feature extraction, one gram per descriptor
#[derive(Debug, Clone)]
pub struct FeatureExtractionPipeline {
    descriptors: Vec<FeatureGramDescriptor>,
    parallel_threshold: usize,
}

impl FeatureExtractionPipeline {
    pub fn new(
        descriptors: Vec<FeatureGramDescriptor>,
        config: &FeatureConfig,
    ) -> Result<Self, FeatureError> {
        if descriptors.is_empty() {
            return Err(FeatureError::invalid_config(
                "a pipeline needs at least one feature gram descriptor",
            ));
        }
        Ok(Self {
            descriptors,
            parallel_threshold: config.effective_parallel_threshold(),
        })
    }

    pub fn descriptors(&self) -> &[FeatureGramDescriptor] {
        &self.descriptors
    }

    pub fn parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    /// Lazily extracted feature grams for every window of `source`
    pub fn extract_all<P: WindowPayload>(
        self: &Arc<Self>,
        source: LabeledWindowSource<P>,
        streaming_enabled: bool,
    ) -> LabeledFeatureIterable<P> {
        let pipeline: Arc<dyn WindowFeaturePipeline<P>> = Arc::clone(self) as _;
        LabeledFeatureIterable::new(source, pipeline, streaming_enabled)
    }
}

impl<P: WindowPayload> WindowFeaturePipeline<P> for FeatureExtractionPipeline {
    fn extract(&self, window: &Arc<DataWindow<P>>) -> Result<Vec<Arc<FeatureGram>>, FeatureError> {
        self.descriptors
            .iter()
            .map(|descriptor| {
                let gram = descriptor.extract_unprocessed(window, self.parallel_threshold)?;
                descriptor.process(Arc::new(gram))
            })
            .collect()
    }
}
