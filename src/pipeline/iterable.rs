// Iterable module - labeled window sources and lazily extracted feature sets
//
// A source is either materialized (it holds every labeled window, so
// iterating again is cheap) or streamed (a restartable generator that
// re-derives its windows on every pass). Only streamed sources are worth
// wrapping in a caching iterable.

use std::fmt;
use std::iter;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::cache::MultiKeyCache;
use crate::error::{log_feature_error, FeatureError};
use crate::identity::InstanceId;
use crate::window::{LabeledWindow, WindowPayload};

use super::{LabeledFeatureGram, WindowFeaturePipeline};

/// Item produced by feature iterables
pub type FeatureItem = Result<Arc<LabeledFeatureGram>, FeatureError>;

type WindowGenerator<P> = dyn Fn() -> Box<dyn Iterator<Item = LabeledWindow<P>>> + Send + Sync;

/// Restartable generator of labeled windows
pub struct StreamedWindows<P: WindowPayload> {
    generator: Arc<WindowGenerator<P>>,
}

impl<P: WindowPayload> StreamedWindows<P> {
    /// `generator` is called once per pass and must yield the same windows each time.
    pub fn new<F, I>(generator: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: Iterator<Item = LabeledWindow<P>> + 'static,
    {
        Self {
            generator: Arc::new(move || Box::new(generator()) as Box<dyn Iterator<Item = _>>),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = LabeledWindow<P>>> {
        (self.generator)()
    }
}

impl<P: WindowPayload> Clone for StreamedWindows<P> {
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
        }
    }
}

/// Labeled windows to extract features from
pub enum LabeledWindowSource<P: WindowPayload> {
    Materialized(Vec<LabeledWindow<P>>),
    Streamed(StreamedWindows<P>),
}

impl<P: WindowPayload> LabeledWindowSource<P> {
    pub fn is_streamed(&self) -> bool {
        matches!(self, LabeledWindowSource::Streamed(_))
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = LabeledWindow<P>> + '_> {
        match self {
            LabeledWindowSource::Materialized(windows) => Box::new(windows.iter().cloned()),
            LabeledWindowSource::Streamed(stream) => stream.iter(),
        }
    }
}

impl<P: WindowPayload> From<Vec<LabeledWindow<P>>> for LabeledWindowSource<P> {
    fn from(windows: Vec<LabeledWindow<P>>) -> Self {
        LabeledWindowSource::Materialized(windows)
    }
}

impl<P: WindowPayload> From<StreamedWindows<P>> for LabeledWindowSource<P> {
    fn from(stream: StreamedWindows<P>) -> Self {
        LabeledWindowSource::Streamed(stream)
    }
}

/// A repeatable sequence of labeled feature grams
pub trait FeatureGramIterable: Send + Sync {
    fn id(&self) -> InstanceId;

    /// True when repeated iteration re-derives the items
    fn is_streamed(&self) -> bool;

    fn iter(&self) -> Box<dyn Iterator<Item = FeatureItem> + '_>;
}

/// Feature grams extracted from a labeled window source
///
/// When streamed, each pass extracts features again as the windows are
/// produced. Otherwise every item is extracted on the first pass and kept.
pub struct LabeledFeatureIterable<P: WindowPayload> {
    id: InstanceId,
    source: LabeledWindowSource<P>,
    pipeline: Arc<dyn WindowFeaturePipeline<P>>,
    streamed: bool,
    materialized: OnceCell<Vec<Arc<LabeledFeatureGram>>>,
}

impl<P: WindowPayload> LabeledFeatureIterable<P> {
    pub fn new(
        source: LabeledWindowSource<P>,
        pipeline: Arc<dyn WindowFeaturePipeline<P>>,
        streaming_enabled: bool,
    ) -> Self {
        let streamed = streaming_enabled && source.is_streamed();
        Self {
            id: InstanceId::next(),
            source,
            pipeline,
            streamed,
            materialized: OnceCell::new(),
        }
    }

    fn materialize(&self) -> Result<&Vec<Arc<LabeledFeatureGram>>, FeatureError> {
        self.materialized.get_or_try_init(|| {
            log::debug!("[FeatureIterable] Materializing features of iterable {}", self.id);
            self.source
                .iter()
                .map(|labeled| self.pipeline.extract_labeled(&labeled).map(Arc::new))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| {
                    log_feature_error(&err, "materializing labeled features");
                    err
                })
        })
    }
}

impl<P: WindowPayload> FeatureGramIterable for LabeledFeatureIterable<P> {
    fn id(&self) -> InstanceId {
        self.id
    }

    fn is_streamed(&self) -> bool {
        self.streamed
    }

    fn iter(&self) -> Box<dyn Iterator<Item = FeatureItem> + '_> {
        if self.streamed {
            return Box::new(
                self.source
                    .iter()
                    .map(move |labeled| self.pipeline.extract_labeled(&labeled).map(Arc::new)),
            );
        }
        match self.materialize() {
            Ok(items) => Box::new(items.iter().cloned().map(Ok)),
            Err(error) => Box::new(iter::once(Err(error))),
        }
    }
}

impl<P: WindowPayload> fmt::Debug for LabeledFeatureIterable<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabeledFeatureIterable")
            .field("id", &self.id)
            .field("streamed", &self.streamed)
            .field("materialized", &self.materialized.get().map(Vec::len))
            .finish()
    }
}

/// Extension point for storage-backed caching of feature iterables
pub trait DiskCacheProvider: Send + Sync {
    /// Wrap `source` in a disk-backed cache, optionally fronted by
    /// `memory_cache`. `None` means disk caching is not available here.
    fn disk_caching_iterable(
        &self,
        source: Arc<dyn FeatureGramIterable>,
        memory_cache: Option<Arc<MultiKeyCache>>,
    ) -> Option<Arc<dyn FeatureGramIterable>>;
}

/// Provider used when no storage backend is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDiskCache;

impl DiskCacheProvider for NoDiskCache {
    fn disk_caching_iterable(
        &self,
        _source: Arc<dyn FeatureGramIterable>,
        _memory_cache: Option<Arc<MultiKeyCache>>,
    ) -> Option<Arc<dyn FeatureGramIterable>> {
        None
    }
}
