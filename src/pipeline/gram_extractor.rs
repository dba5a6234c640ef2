// Gram extractor - sliding a feature extractor across a window
//
// A descriptor fixes the sub-window size and shift, the extractor applied to
// each sub-window and an optional processor applied to the resulting gram.
// Sub-windows are taken through `DataWindow::sub_window`, so repeated
// extraction over the same window reuses the same sub-window instances.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;

use crate::error::{log_window_error, FeatureError};
use crate::features::{Feature, FeatureExtractor, FeatureGram, FeatureProcessor};
use crate::telemetry;
use crate::window::{DataWindow, WindowPayload};

/// Extraction parameters for one feature gram
#[derive(Clone)]
pub struct FeatureGramDescriptor {
    window_size_msec: f64,
    window_shift_msec: f64,
    extractor: Arc<dyn FeatureExtractor>,
    processor: Option<Arc<dyn FeatureProcessor>>,
}

impl FeatureGramDescriptor {
    /// `window_size_msec == 0` applies the extractor to the whole window;
    /// `window_shift_msec == 0` means non-overlapping sub-windows.
    pub fn new(
        window_size_msec: f64,
        window_shift_msec: f64,
        extractor: Arc<dyn FeatureExtractor>,
    ) -> Result<Self, FeatureError> {
        for (what, value) in [("size", window_size_msec), ("shift", window_shift_msec)] {
            if !value.is_finite() || value < 0.0 {
                return Err(FeatureError::invalid_config(format!(
                    "sub-window {} must be a non-negative number of milliseconds, got {}",
                    what, value
                )));
            }
        }
        let window_shift_msec = if window_size_msec == 0.0 {
            0.0
        } else if window_shift_msec == 0.0 {
            window_size_msec
        } else {
            window_shift_msec
        };
        Ok(Self {
            window_size_msec,
            window_shift_msec,
            extractor,
            processor: None,
        })
    }

    /// Whole-window extraction
    pub fn whole(extractor: Arc<dyn FeatureExtractor>) -> Self {
        Self {
            window_size_msec: 0.0,
            window_shift_msec: 0.0,
            extractor,
            processor: None,
        }
    }

    pub fn with_processor(mut self, processor: Arc<dyn FeatureProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn window_size_msec(&self) -> f64 {
        self.window_size_msec
    }

    /// Effective shift; equals the size unless an explicit shift was given
    pub fn window_shift_msec(&self) -> f64 {
        self.window_shift_msec
    }

    pub fn extractor(&self) -> &Arc<dyn FeatureExtractor> {
        &self.extractor
    }

    pub fn processor(&self) -> Option<&Arc<dyn FeatureProcessor>> {
        self.processor.as_ref()
    }

    /// Hash of every parameter that changes the produced gram
    pub fn signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.extractor.signature().hash(&mut hasher);
        self.window_size_msec.to_bits().hash(&mut hasher);
        self.window_shift_msec.to_bits().hash(&mut hasher);
        self.processor
            .as_ref()
            .map(|p| p.signature())
            .hash(&mut hasher);
        hasher.finish()
    }

    /// Slide the extractor across `window` without any feature caching.
    pub fn extract_unprocessed<P: WindowPayload>(
        &self,
        window: &Arc<DataWindow<P>>,
        parallel_threshold: usize,
    ) -> Result<FeatureGram, FeatureError> {
        extract_gram(
            window,
            self.extractor.as_ref(),
            self.window_size_msec,
            self.window_shift_msec,
            parallel_threshold,
        )
    }

    /// Apply the processor, if any, to an unprocessed gram.
    pub fn process(&self, gram: Arc<FeatureGram>) -> Result<Arc<FeatureGram>, FeatureError> {
        match &self.processor {
            Some(processor) => Ok(Arc::new(processor.apply(&gram)?)),
            None => Ok(gram),
        }
    }
}

impl fmt::Debug for FeatureGramDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureGramDescriptor")
            .field("window_size_msec", &self.window_size_msec)
            .field("window_shift_msec", &self.window_shift_msec)
            .field("extractor", &self.extractor.name())
            .field("processor", &self.processor.as_ref().map(|p| p.name()))
            .finish()
    }
}

/// Sub-windows of `size_msec` at `start + k * shift_msec` that fit in the window
fn sliding_sub_windows<P: WindowPayload>(
    window: &Arc<DataWindow<P>>,
    size_msec: f64,
    shift_msec: f64,
) -> Result<Vec<Arc<DataWindow<P>>>, FeatureError> {
    let shift_msec = if shift_msec > 0.0 { shift_msec } else { size_msec };
    let start = window.start_msec();
    let end = window.end_msec();
    let tolerance = 1e-9 * end.abs().max(1.0);

    let mut subs = Vec::new();
    for k in 0usize.. {
        let sub_start = start + k as f64 * shift_msec;
        let sub_end = sub_start + size_msec;
        if sub_end > end + tolerance {
            break;
        }
        let sub = window
            .sub_window(sub_start, sub_end.min(end))
            .map_err(|err| {
                log_window_error(&err, "sliding sub-window");
                err
            })?;
        if let Some(sub) = sub {
            subs.push(sub);
        }
    }
    Ok(subs)
}

pub(crate) fn extract_gram<P: WindowPayload>(
    window: &Arc<DataWindow<P>>,
    extractor: &dyn FeatureExtractor,
    size_msec: f64,
    shift_msec: f64,
    parallel_threshold: usize,
) -> Result<FeatureGram, FeatureError> {
    if size_msec == 0.0 {
        let feature = extractor.apply(&**window)?;
        telemetry::hub().record_features_extracted(1);
        return Ok(FeatureGram::new(vec![feature]));
    }

    let subs = sliding_sub_windows(window, size_msec, shift_msec)?;
    let features = if subs.len() > parallel_threshold.max(1) {
        tracing::trace!(
            window = %window.id(),
            sub_windows = subs.len(),
            extractor = extractor.name(),
            "extracting in parallel"
        );
        apply_parallel(&subs, extractor)?
    } else {
        subs.iter()
            .map(|sub| extractor.apply(&**sub))
            .collect::<Result<Vec<_>, _>>()?
    };

    telemetry::hub().record_features_extracted(features.len());
    Ok(FeatureGram::new(features))
}

/// Apply `extractor` to every sub-window on scoped worker threads, keeping order.
fn apply_parallel<P: WindowPayload>(
    subs: &[Arc<DataWindow<P>>],
    extractor: &dyn FeatureExtractor,
) -> Result<Vec<Feature>, FeatureError> {
    let workers = thread::available_parallelism()
        .map_or(1, NonZeroUsize::get)
        .min(subs.len())
        .max(1);
    let chunk_len = (subs.len() + workers - 1) / workers;

    thread::scope(|scope| -> Result<Vec<Feature>, FeatureError> {
        let handles: Vec<_> = subs
            .chunks(chunk_len.max(1))
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|sub| extractor.apply(&**sub))
                        .collect::<Result<Vec<_>, _>>()
                })
            })
            .collect();

        let mut features = Vec::with_capacity(subs.len());
        for handle in handles {
            match handle.join() {
                Ok(chunk) => features.extend(chunk?),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        Ok(features)
    })
}
