// Window factories - building concrete windows from decoded values
//
// Generic algorithms such as concatenation work on decoded values and use a
// factory to turn the result back into a window of the caller's choosing.

use std::sync::Arc;

use crate::cache::{CacheContext, MultiKeyCache};
use crate::error::WindowError;

use super::pcm::{PcmFormat, PcmPayload};
use super::scalar::ScalarPayload;
use super::{index, DataWindow, WindowPayload};

/// Creates windows of payload `P` from decoded values
pub trait WindowFactory<P: WindowPayload>: Send + Sync {
    /// `values` holds `sample_count * dimensions` interleaved values spanning
    /// `[start_msec, end_msec]`; the rate is derived from them.
    fn new_window(
        &self,
        start_msec: f64,
        end_msec: f64,
        values: Vec<f64>,
    ) -> Result<DataWindow<P>, WindowError>;
}

fn derived_rate(start_msec: f64, end_msec: f64, samples: usize) -> Result<f64, WindowError> {
    let duration = end_msec - start_msec;
    if !(duration.is_finite() && duration > 0.0) || samples == 0 {
        return Err(WindowError::invalid(format!(
            "cannot derive a sampling rate for {} samples over [{}, {}]",
            samples, start_msec, end_msec
        )));
    }
    Ok(samples as f64 * 1000.0 / duration)
}

/// Builds [`ScalarWindow`](super::ScalarWindow)s
#[derive(Debug, Clone)]
pub struct ScalarWindowFactory {
    cache: Arc<MultiKeyCache>,
}

impl ScalarWindowFactory {
    pub fn new(ctx: &CacheContext) -> Self {
        Self {
            cache: Arc::clone(ctx.window_cache()),
        }
    }
}

impl WindowFactory<ScalarPayload> for ScalarWindowFactory {
    fn new_window(
        &self,
        start_msec: f64,
        end_msec: f64,
        values: Vec<f64>,
    ) -> Result<DataWindow<ScalarPayload>, WindowError> {
        let rate = derived_rate(start_msec, end_msec, values.len())?;
        DataWindow::from_parts(
            Arc::clone(&self.cache),
            start_msec,
            end_msec,
            rate,
            None,
            ScalarPayload::new(values),
        )
    }
}

/// Builds [`PcmWindow`](super::PcmWindow)s of a fixed format and dimensionality
#[derive(Debug, Clone)]
pub struct PcmWindowFactory {
    cache: Arc<MultiKeyCache>,
    format: PcmFormat,
    dimensions: usize,
}

impl PcmWindowFactory {
    pub fn new(ctx: &CacheContext, format: PcmFormat, dimensions: usize) -> Result<Self, WindowError> {
        format.validate()?;
        if dimensions == 0 {
            return Err(WindowError::invalid("dimensions must be at least 1"));
        }
        Ok(Self {
            cache: Arc::clone(ctx.window_cache()),
            format,
            dimensions,
        })
    }
}

impl WindowFactory<PcmPayload> for PcmWindowFactory {
    fn new_window(
        &self,
        start_msec: f64,
        end_msec: f64,
        values: Vec<f64>,
    ) -> Result<DataWindow<PcmPayload>, WindowError> {
        if values.len() % self.dimensions != 0 {
            return Err(WindowError::invalid(format!(
                "{} values is not a multiple of {} dimensions",
                values.len(),
                self.dimensions
            )));
        }
        let rate = derived_rate(start_msec, end_msec, values.len() / self.dimensions)?;
        let payload = PcmPayload::new(self.format.encode(&values), self.format, self.dimensions)?;
        DataWindow::from_parts(Arc::clone(&self.cache), start_msec, end_msec, rate, None, payload)
    }
}

/// Append the samples of `windows` into one window starting at 0.
///
/// The result spans the summed durations. All windows must share a sampling
/// rate and dimensionality.
pub fn concat_windows<P, F>(
    windows: &[Arc<DataWindow<P>>],
    factory: &F,
) -> Result<Arc<DataWindow<P>>, WindowError>
where
    P: WindowPayload,
    F: WindowFactory<P> + ?Sized,
{
    let first = windows
        .first()
        .ok_or_else(|| WindowError::invalid("cannot concatenate an empty list of windows"))?;
    let rate = first.samples_per_second();

    let mut duration = 0.0;
    let mut values = Vec::with_capacity(windows.iter().map(|w| w.values().len()).sum());
    for window in windows {
        let tolerance = 1e-9 * rate.abs();
        if (window.samples_per_second() - rate).abs() > tolerance {
            return Err(WindowError::RateMismatch {
                expected: rate,
                actual: window.samples_per_second(),
            });
        }
        if window.dimensions() != first.dimensions() {
            return Err(WindowError::LengthMismatch {
                what: "sample dimensions",
                expected: first.dimensions(),
                actual: window.dimensions(),
            });
        }
        duration += index::offset_msec(window.sample_count(), rate);
        values.extend_from_slice(window.values());
    }

    factory.new_window(0.0, duration, values).map(Arc::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{PcmWindow, ScalarWindow};

    #[test]
    fn test_scalar_factory() {
        let ctx = CacheContext::default();
        let factory = ScalarWindowFactory::new(&ctx);
        let window = factory.new_window(100.0, 200.0, vec![0.0; 10]).unwrap();
        assert_eq!(window.samples_per_second(), 100.0);
        assert_eq!(window.sample_count(), 10);
        assert!(factory.new_window(100.0, 100.0, vec![0.0; 10]).is_err());
    }

    #[test]
    fn test_concat_scalar_windows() {
        let ctx = CacheContext::default();
        let a = Arc::new(ScalarWindow::with_rate(&ctx, 500.0, 100.0, vec![1.0; 50]).unwrap());
        let b = Arc::new(ScalarWindow::with_rate(&ctx, 9000.0, 100.0, vec![2.0; 30]).unwrap());

        let joined = concat_windows(&[a, b], &ScalarWindowFactory::new(&ctx)).unwrap();
        assert_eq!(joined.start_msec(), 0.0);
        assert_eq!(joined.duration_msec(), 800.0);
        assert_eq!(joined.sample_count(), 80);
        assert!(joined.values()[..50].iter().all(|&v| v == 1.0));
        assert!(joined.values()[50..].iter().all(|&v| v == 2.0));
    }

    #[test]
    fn test_concat_rejects_mismatched_rates_and_empty() {
        let ctx = CacheContext::default();
        let factory = ScalarWindowFactory::new(&ctx);
        let a = Arc::new(ScalarWindow::with_rate(&ctx, 0.0, 100.0, vec![1.0; 10]).unwrap());
        let b = Arc::new(ScalarWindow::with_rate(&ctx, 0.0, 200.0, vec![1.0; 10]).unwrap());

        assert!(matches!(
            concat_windows(&[a, b], &factory).unwrap_err(),
            WindowError::RateMismatch { .. }
        ));
        assert!(concat_windows::<ScalarPayload, _>(&[], &factory)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_concat_pcm_windows() {
        let ctx = CacheContext::default();
        let format = PcmFormat::mono16();
        let a = Arc::new(PcmWindow::from_values(&ctx, 0.0, 8.0, format, 2, &[0.5; 8]).unwrap());
        let b = Arc::new(PcmWindow::from_values(&ctx, 0.0, 8.0, format, 2, &[-0.5; 4]).unwrap());

        let factory = PcmWindowFactory::new(&ctx, format, 2).unwrap();
        let joined = concat_windows(&[a, b], &factory).unwrap();
        assert_eq!(joined.sample_count(), 6);
        assert_eq!(joined.dimensions(), 2);
        assert_eq!(joined.duration_msec(), 750.0);
    }
}
