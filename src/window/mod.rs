// DataWindow - immutable, sub-windowable signal windows
//
// A window holds a start/end time, a logical sampling rate, optional explicit
// independent data and a payload of samples. Sub-windows, resizes and splits
// are new windows, but identical derivations of the same window are served
// from the derivation cache so the same `Arc` (and therefore the same
// instance id) comes back. Downstream feature caches key on that id.
//
// Module organization:
// - index: sample count and time/index arithmetic
// - pad: padding policies
// - scalar: f64 sample payload (zero-copy sub-windows)
// - pcm: interleaved PCM byte payload
// - factory: concrete window factories and concatenation
// - labeled: window plus labels/tags/trainable flag

pub mod factory;
pub mod index;
pub mod labeled;
pub mod pad;
pub mod pcm;
pub mod scalar;

use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

use crate::cache::{CacheKey, MultiKeyCache};
use crate::cache_key;
use crate::error::WindowError;
use crate::identity::InstanceId;
use crate::telemetry;
use crate::vector::Vector;

pub use factory::{concat_windows, PcmWindowFactory, ScalarWindowFactory, WindowFactory};
pub use index::MIN_SPLIT_SAMPLES;
pub use labeled::{LabelValue, LabeledWindow};
pub use pad::{pad, PadType};
pub use pcm::{PcmFormat, PcmPayload, PcmWindow};
pub use scalar::{ScalarPayload, ScalarWindow};

/// Sample storage behind a [`DataWindow`]
///
/// Implementations supply decoded values and build new windows for the two
/// derivations that depend on the storage layout. Caching and validation of
/// those derivations is done by `DataWindow` itself.
pub trait WindowPayload: Send + Sync + Sized + 'static {
    /// Decoded values, `sample_len() * dimensions()` long, interleaved.
    fn values(&self) -> &[f64];

    /// Values per logical sample.
    fn dimensions(&self) -> usize {
        1
    }

    /// Number of logical samples held.
    fn sample_len(&self) -> usize;

    /// Window over logical samples `[start, end)` of `parent`, starting at `new_start_msec`.
    fn new_sub_window(
        parent: &DataWindow<Self>,
        new_start_msec: f64,
        start: usize,
        end: usize,
    ) -> Result<DataWindow<Self>, WindowError>;

    /// Window of `duration_msec` whose leading samples are `parent`'s.
    fn uncached_pad(
        parent: &DataWindow<Self>,
        duration_msec: f64,
        pad_type: PadType,
    ) -> Result<DataWindow<Self>, WindowError>;
}

/// Read-only view of a window used by feature extractors
pub trait SignalView: Send + Sync {
    fn instance_id(&self) -> InstanceId;
    fn start_msec(&self) -> f64;
    fn end_msec(&self) -> f64;
    fn samples_per_second(&self) -> f64;
    fn sample_count(&self) -> usize;
    fn dimensions(&self) -> usize;
    fn values(&self) -> &[f64];
    fn independent_values(&self) -> &[f64];

    fn duration_msec(&self) -> f64 {
        self.end_msec() - self.start_msec()
    }
}

/// Immutable signal window over payload `P`
pub struct DataWindow<P: WindowPayload> {
    id: InstanceId,
    start_msec: f64,
    end_msec: f64,
    rate: f64,
    sample_count: usize,
    independent: Option<Vector>,
    generated_independent: OnceCell<Vector>,
    // Weak: derived windows live in this cache
    cache: Weak<MultiKeyCache>,
    payload: P,
}

impl<P: WindowPayload> DataWindow<P> {
    /// Validate and assemble a window.
    ///
    /// Fails with an invalid-argument class error if `end < start`, the rate
    /// is not positive, or the payload/independent data length differs from
    /// the sample count implied by the times and rate.
    ///
    /// The window refers to `cache` without keeping it alive. Once the cache
    /// is dropped, derivations are computed without caching.
    pub fn from_parts(
        cache: Arc<MultiKeyCache>,
        start_msec: f64,
        end_msec: f64,
        samples_per_second: f64,
        independent: Option<Vector>,
        payload: P,
    ) -> Result<Self, WindowError> {
        Self::assemble(
            Arc::downgrade(&cache),
            start_msec,
            end_msec,
            samples_per_second,
            independent,
            payload,
        )
    }

    fn assemble(
        cache: Weak<MultiKeyCache>,
        start_msec: f64,
        end_msec: f64,
        samples_per_second: f64,
        independent: Option<Vector>,
        payload: P,
    ) -> Result<Self, WindowError> {
        if !start_msec.is_finite() || !end_msec.is_finite() {
            return Err(WindowError::invalid("start and end times must be finite"));
        }
        if end_msec < start_msec {
            return Err(WindowError::invalid(format!(
                "end time {} is before start time {}",
                end_msec, start_msec
            )));
        }
        if !(samples_per_second.is_finite() && samples_per_second > 0.0) {
            return Err(WindowError::invalid(format!(
                "sampling rate must be positive, got {}",
                samples_per_second
            )));
        }

        let sample_count = index::span_sample_count(start_msec, end_msec, samples_per_second);
        if payload.sample_len() != sample_count {
            return Err(WindowError::LengthMismatch {
                what: "sample data",
                expected: sample_count,
                actual: payload.sample_len(),
            });
        }
        if let Some(vector) = &independent {
            if vector.len() != sample_count {
                return Err(WindowError::LengthMismatch {
                    what: "independent data",
                    expected: sample_count,
                    actual: vector.len(),
                });
            }
        }

        telemetry::hub().record_window_created();
        Ok(Self {
            id: InstanceId::next(),
            start_msec,
            end_msec,
            rate: samples_per_second,
            sample_count,
            independent,
            generated_independent: OnceCell::new(),
            cache,
            payload,
        })
    }

    /// Window derived from this one: same rate and cache, `count` samples from `start_msec`.
    pub fn derive(
        &self,
        start_msec: f64,
        count: usize,
        independent: Option<Vector>,
        payload: P,
    ) -> Result<Self, WindowError> {
        let end_msec = start_msec + index::offset_msec(count, self.rate);
        Self::assemble(
            Weak::clone(&self.cache),
            start_msec,
            end_msec,
            self.rate,
            independent,
            payload,
        )
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn start_msec(&self) -> f64 {
        self.start_msec
    }

    pub fn end_msec(&self) -> f64 {
        self.end_msec
    }

    pub fn duration_msec(&self) -> f64 {
        self.end_msec - self.start_msec
    }

    /// Logical samples per second, independent of dimensionality
    pub fn samples_per_second(&self) -> f64 {
        self.rate
    }

    /// `floor(duration_msec * samples_per_second / 1000)`
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn values(&self) -> &[f64] {
        self.payload.values()
    }

    pub fn dimensions(&self) -> usize {
        self.payload.dimensions()
    }

    /// Derivation cache, `None` once its context has been dropped
    pub fn cache(&self) -> Option<Arc<MultiKeyCache>> {
        self.cache.upgrade()
    }

    fn cached_derivation<F>(&self, key: CacheKey, compute: F) -> Result<Arc<Self>, WindowError>
    where
        F: FnOnce() -> Result<Arc<Self>, WindowError>,
    {
        match self.cache.upgrade() {
            Some(cache) => cache.get_or_try_insert_with(key, compute),
            None => compute(),
        }
    }

    /// Explicit independent data supplied at construction, if any
    pub fn independent_data(&self) -> Option<&Vector> {
        self.independent.as_ref()
    }

    /// Explicit independent data, or generated `start, start + 1000/rate, ...`
    pub fn independent_values(&self) -> &[f64] {
        match &self.independent {
            Some(vector) => vector.values(),
            None => self
                .generated_independent
                .get_or_init(|| {
                    Vector::regular(self.start_msec, 1000.0 / self.rate, self.sample_count)
                })
                .values(),
        }
    }

    /// Explicit independent data restricted to `[start, end)`
    pub fn sliced_independent(&self, start: usize, end: usize) -> Option<Vector> {
        self.independent
            .as_ref()
            .and_then(|vector| vector.slice(start, end))
    }

    /// Logical sample index for a millisecond offset into this window.
    ///
    /// See [`index::index_of`] for the rounding rules. `None` when the
    /// offset lies outside `[0, duration_msec]`.
    pub fn index_of(&self, offset_msec: f64, is_lower_bound: bool) -> Option<usize> {
        index::index_of(
            offset_msec,
            self.duration_msec(),
            self.rate,
            self.sample_count.checked_sub(1),
            is_lower_bound,
        )
    }

    /// Sub-window covering absolute times `[start_msec, end_msec)`.
    ///
    /// `Ok(None)` if either time is outside this window. A request that
    /// resolves to no samples yields a one-sample window instead.
    pub fn sub_window(
        &self,
        start_msec: f64,
        end_msec: f64,
    ) -> Result<Option<Arc<Self>>, WindowError> {
        self.sub_window_at_offsets(start_msec - self.start_msec, end_msec - self.start_msec)
    }

    /// Offset-relative sub-window; offsets must satisfy `0 <= start < end <= duration`.
    pub fn sub_window2(
        &self,
        start_offset_msec: f64,
        end_offset_msec: f64,
    ) -> Result<Arc<Self>, WindowError> {
        let duration = self.duration_msec();
        if !(0.0..=duration).contains(&start_offset_msec) {
            return Err(WindowError::invalid(format!(
                "start offset {} outside [0, {}]",
                start_offset_msec, duration
            )));
        }
        if !(0.0..=duration).contains(&end_offset_msec) {
            return Err(WindowError::invalid(format!(
                "end offset {} outside [0, {}]",
                end_offset_msec, duration
            )));
        }
        if end_offset_msec <= start_offset_msec {
            return Err(WindowError::invalid(format!(
                "end offset {} must be larger than start offset {}",
                end_offset_msec, start_offset_msec
            )));
        }

        self.sub_window_at_offsets(start_offset_msec, end_offset_msec)?
            .ok_or_else(|| WindowError::invalid("offsets do not resolve to samples"))
    }

    fn sub_window_at_offsets(
        &self,
        start_offset_msec: f64,
        end_offset_msec: f64,
    ) -> Result<Option<Arc<Self>>, WindowError> {
        let start = self.index_of(start_offset_msec, true);
        let end = self.index_of(end_offset_msec, false);
        let (Some(start), Some(mut end)) = (start, end) else {
            return Ok(None);
        };
        if end <= start {
            end = start + 1;
        }
        self.sub_window_by_index(start, end).map(Some)
    }

    /// Cached sub-window over logical samples `[start, end)`.
    ///
    /// `end` is clamped to the sample count. Repeated calls with the same
    /// indices return the same `Arc` while the entry stays cached.
    pub(crate) fn sub_window_by_index(
        &self,
        start: usize,
        end: usize,
    ) -> Result<Arc<Self>, WindowError> {
        let count = self.sample_count;
        if start > end || start > count {
            return Err(WindowError::IndexOutOfRange {
                start,
                end,
                sample_count: count,
            });
        }
        let end = end.min(count);

        self.cached_derivation(cache_key!(self.id, start, end), || {
            let new_start = self.start_msec + index::offset_msec(start, self.rate);
            let window = P::new_sub_window(self, new_start, start, end)?;
            telemetry::hub().record_window_derived();
            tracing::trace!(parent = %self.id, child = %window.id, start, end, "derived sub-window");
            Ok(Arc::new(window))
        })
    }

    /// Window of the requested duration.
    ///
    /// Equal duration returns this window itself. Shorter durations take the
    /// leading sub-window. Longer durations pad according to `pad_type` and
    /// are cached by `(id, duration, pad_type)`.
    pub fn resize(
        self: &Arc<Self>,
        duration_msec: f64,
        pad_type: PadType,
    ) -> Result<Arc<Self>, WindowError> {
        if !duration_msec.is_finite() || duration_msec < 0.0 {
            return Err(WindowError::invalid(format!(
                "resize duration must be non-negative, got {}",
                duration_msec
            )));
        }

        let current = self.duration_msec();
        if index::same_duration(duration_msec, current, self.start_msec) {
            return Ok(Arc::clone(self));
        }
        if duration_msec < current {
            return self
                .sub_window_at_offsets(0.0, duration_msec)?
                .ok_or_else(|| WindowError::invalid("resize duration does not resolve to samples"));
        }

        self.cached_derivation(cache_key!(self.id, duration_msec, pad_type), || {
            let window = P::uncached_pad(self, duration_msec, pad_type)?;
            telemetry::hub().record_window_derived();
            tracing::trace!(parent = %self.id, child = %window.id, duration_msec, "padded window");
            Ok(Arc::new(window))
        })
    }

    /// Split into consecutive, non-overlapping windows of `duration_msec`.
    ///
    /// The trailing partial window is kept only when `keep_partial_window`
    /// is set. Segments shorter than [`MIN_SPLIT_SAMPLES`] are dropped.
    pub fn split_on_time(
        &self,
        duration_msec: f64,
        keep_partial_window: bool,
    ) -> Result<Vec<Arc<Self>>, WindowError> {
        if !duration_msec.is_finite() || duration_msec < 0.0 {
            return Err(WindowError::invalid(format!(
                "split duration must be non-negative, got {}",
                duration_msec
            )));
        }

        let total = self.sample_count;
        if total == 0 {
            return Ok(Vec::new());
        }
        let window_duration = self.duration_msec();
        // An exact whole-window duration is one full segment. Anything shorter
        // uses the lower-bound index, which clamps to `total - 1`.
        let per_segment = if index::same_duration(duration_msec, window_duration, self.start_msec) {
            total
        } else if duration_msec > window_duration {
            // the whole window is the only, partial, segment
            total + 1
        } else {
            self.index_of(duration_msec, true).unwrap_or(total + 1)
        };
        if per_segment == 0 {
            return Ok(Vec::new());
        }

        let mut segments = Vec::with_capacity(total / per_segment + 1);
        let mut start = 0;
        loop {
            let mut end = start + per_segment;
            let mut done = false;
            if end > total {
                if !keep_partial_window {
                    break;
                }
                end = total;
                done = true;
            }
            if end - start >= MIN_SPLIT_SAMPLES {
                segments.push(self.sub_window_by_index(start, end)?);
            }
            start = end;
            if done {
                break;
            }
        }
        Ok(segments)
    }
}

impl<P: WindowPayload> SignalView for DataWindow<P> {
    fn instance_id(&self) -> InstanceId {
        self.id
    }

    fn start_msec(&self) -> f64 {
        self.start_msec
    }

    fn end_msec(&self) -> f64 {
        self.end_msec
    }

    fn samples_per_second(&self) -> f64 {
        self.rate
    }

    fn sample_count(&self) -> usize {
        self.sample_count
    }

    fn dimensions(&self) -> usize {
        self.payload.dimensions()
    }

    fn values(&self) -> &[f64] {
        self.payload.values()
    }

    fn independent_values(&self) -> &[f64] {
        DataWindow::independent_values(self)
    }
}

impl<P: WindowPayload> fmt::Debug for DataWindow<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataWindow")
            .field("id", &self.id)
            .field("start_msec", &self.start_msec)
            .field("end_msec", &self.end_msec)
            .field("samples_per_second", &self.rate)
            .field("sample_count", &self.sample_count)
            .field("dimensions", &self.payload.dimensions())
            .field("explicit_independent", &self.independent.is_some())
            .finish()
    }
}
