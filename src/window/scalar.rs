// Scalar window - one f64 value per logical sample
//
// Sub-windows share the parent's sample buffer and only narrow the visible
// range, so splitting a long recording never copies sample data.

use std::sync::Arc;

use crate::cache::CacheContext;
use crate::error::WindowError;
use crate::vector::Vector;

use super::index;
use super::pad::{pad, PadType};
use super::{DataWindow, WindowPayload};

/// Window of scalar samples
pub type ScalarWindow = DataWindow<ScalarPayload>;

/// Shared sample buffer plus the visible range
#[derive(Debug, Clone)]
pub struct ScalarPayload {
    samples: Arc<[f64]>,
    offset: usize,
    len: usize,
}

impl ScalarPayload {
    pub fn new(samples: Vec<f64>) -> Self {
        let len = samples.len();
        Self {
            samples: samples.into(),
            offset: 0,
            len,
        }
    }

    fn view(&self, start: usize, end: usize) -> Self {
        Self {
            samples: Arc::clone(&self.samples),
            offset: self.offset + start,
            len: end - start,
        }
    }

    /// True if both payloads view the same underlying buffer
    pub fn shares_buffer_with(&self, other: &ScalarPayload) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }
}

impl WindowPayload for ScalarPayload {
    fn values(&self) -> &[f64] {
        &self.samples[self.offset..self.offset + self.len]
    }

    fn sample_len(&self) -> usize {
        self.len
    }

    fn new_sub_window(
        parent: &DataWindow<Self>,
        new_start_msec: f64,
        start: usize,
        end: usize,
    ) -> Result<DataWindow<Self>, WindowError> {
        parent.derive(
            new_start_msec,
            end - start,
            parent.sliced_independent(start, end),
            parent.payload().view(start, end),
        )
    }

    fn uncached_pad(
        parent: &DataWindow<Self>,
        duration_msec: f64,
        pad_type: PadType,
    ) -> Result<DataWindow<Self>, WindowError> {
        let new_count = index::sample_count(duration_msec, parent.samples_per_second());
        let padded = pad(parent.values(), new_count, pad_type)?;
        // explicit independent data cannot be extended; padded windows use generated times
        parent.derive(
            parent.start_msec(),
            new_count,
            None,
            ScalarPayload::new(padded),
        )
    }
}

impl DataWindow<ScalarPayload> {
    /// Window over `[start_msec, end_msec]`, rate derived from the data length.
    pub fn from_samples(
        ctx: &CacheContext,
        start_msec: f64,
        end_msec: f64,
        data: Vec<f64>,
    ) -> Result<Self, WindowError> {
        let duration = end_msec - start_msec;
        if !(duration.is_finite() && duration > 0.0) {
            return Err(WindowError::invalid(format!(
                "window must have positive duration to derive its rate, got [{}, {}]",
                start_msec, end_msec
            )));
        }
        if data.is_empty() {
            return Err(WindowError::invalid("sample data is empty"));
        }
        let rate = data.len() as f64 * 1000.0 / duration;
        Self::from_parts(
            Arc::clone(ctx.window_cache()),
            start_msec,
            end_msec,
            rate,
            None,
            ScalarPayload::new(data),
        )
    }

    /// Window starting at `start_msec` with end time derived from the rate.
    pub fn with_rate(
        ctx: &CacheContext,
        start_msec: f64,
        samples_per_second: f64,
        data: Vec<f64>,
    ) -> Result<Self, WindowError> {
        if !(samples_per_second.is_finite() && samples_per_second > 0.0) {
            return Err(WindowError::invalid(format!(
                "sampling rate must be positive, got {}",
                samples_per_second
            )));
        }
        let end_msec = start_msec + index::offset_msec(data.len(), samples_per_second);
        Self::from_parts(
            Arc::clone(ctx.window_cache()),
            start_msec,
            end_msec,
            samples_per_second,
            None,
            ScalarPayload::new(data),
        )
    }

    /// Fully explicit window; every length is validated against the rate.
    pub fn with_independent(
        ctx: &CacheContext,
        start_msec: f64,
        end_msec: f64,
        samples_per_second: f64,
        independent: Option<Vector>,
        data: Vec<f64>,
    ) -> Result<Self, WindowError> {
        Self::from_parts(
            Arc::clone(ctx.window_cache()),
            start_msec,
            end_msec,
            samples_per_second,
            independent,
            ScalarPayload::new(data),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_samples_derives_rate() {
        let ctx = CacheContext::default();
        let window = ScalarWindow::from_samples(&ctx, 0.0, 1000.0, vec![0.0; 100]).unwrap();
        assert_eq!(window.samples_per_second(), 100.0);
        assert_eq!(window.sample_count(), 100);
    }

    #[test]
    fn test_with_rate_derives_end() {
        let ctx = CacheContext::default();
        let window = ScalarWindow::with_rate(&ctx, 500.0, 1000.0, vec![1.0; 250]).unwrap();
        assert_eq!(window.end_msec(), 750.0);
        assert_eq!(window.sample_count(), 250);
    }

    #[test]
    fn test_odd_lengths_keep_every_sample() {
        let ctx = CacheContext::default();
        for len in [1usize, 3, 7, 13, 441, 1001] {
            let window =
                ScalarWindow::from_samples(&ctx, 0.3, 0.3 + 0.7, vec![0.5; len]).unwrap();
            assert_eq!(window.sample_count(), len);
        }
    }

    #[test]
    fn test_constructor_validation() {
        let ctx = CacheContext::default();
        assert!(ScalarWindow::from_samples(&ctx, 10.0, 5.0, vec![0.0; 4]).is_err());
        assert!(ScalarWindow::from_samples(&ctx, 0.0, 10.0, vec![]).is_err());
        assert!(ScalarWindow::with_rate(&ctx, 0.0, 0.0, vec![0.0; 4]).is_err());
        assert!(ScalarWindow::with_rate(&ctx, 0.0, -5.0, vec![0.0; 4]).is_err());

        let err = ScalarWindow::with_independent(
            &ctx,
            0.0,
            1000.0,
            10.0,
            Some(Vector::explicit(vec![0.0; 9])),
            vec![0.0; 10],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            WindowError::LengthMismatch {
                what: "independent data",
                expected: 10,
                actual: 9
            }
        ));

        let err =
            ScalarWindow::with_independent(&ctx, 0.0, 1000.0, 10.0, None, vec![0.0; 11]).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_sub_window_shares_buffer() {
        let ctx = CacheContext::default();
        let data: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let window = ScalarWindow::from_samples(&ctx, 0.0, 1000.0, data).unwrap();
        let sub = window.sub_window(100.0, 200.0).unwrap().unwrap();
        assert!(sub.payload().shares_buffer_with(window.payload()));
        assert_eq!(sub.values(), &(10..20).map(|i| i as f64).collect::<Vec<_>>()[..]);
        assert_eq!(sub.start_msec(), 100.0);
        assert_eq!(sub.end_msec(), 200.0);
    }

    #[test]
    fn test_sub_window_slices_explicit_independent() {
        let ctx = CacheContext::default();
        let times: Vec<f64> = (0..10).map(|i| (i * i) as f64).collect();
        let window = ScalarWindow::with_independent(
            &ctx,
            0.0,
            1000.0,
            10.0,
            Some(Vector::explicit(times)),
            vec![0.0; 10],
        )
        .unwrap();
        let sub = window.sub_window2(200.0, 500.0).unwrap();
        assert_eq!(sub.independent_values(), &[4.0, 9.0, 16.0]);
    }
}
