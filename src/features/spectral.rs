// Spectral module - Frequency-domain feature extraction
//
// Both extractors start from the Hann-windowed power spectrum of the signal
// with the DC bin removed. Multi-dimensional samples are averaged to one value
// per sample before the transform.
//
// References:
// - Davis, S. & Mermelstein, P. (1980). Comparison of parametric representations
//   for monosyllabic word recognition in continuously spoken sentences

use serde_json::json;

use crate::error::FeatureError;
use crate::vector::Vector;
use crate::window::SignalView;

use super::fft::FftProcessor;
use super::{mean_per_sample, Feature, FeatureExtractor};

/// Floor applied before taking logarithms of power values
const LOG_FLOOR: f64 = 1e-50;

pub const DEFAULT_MIN_HZ: f64 = 20.0;
pub const DEFAULT_MAX_HZ: f64 = 20_000.0;
pub const DEFAULT_BAND_COUNT: usize = 64;

fn validate_range(min_hz: f64, max_hz: f64) -> Result<(), FeatureError> {
    if !(min_hz.is_finite() && max_hz.is_finite()) || min_hz < 0.0 || max_hz < 0.0 {
        return Err(FeatureError::invalid_config(format!(
            "frequency range must be non-negative, got [{}, {}]",
            min_hz, max_hz
        )));
    }
    if min_hz >= max_hz {
        return Err(FeatureError::invalid_config(format!(
            "minimum frequency {} must be below maximum {}",
            min_hz, max_hz
        )));
    }
    Ok(())
}

/// Average consecutive buckets of `values` down to `count` values.
fn downsample(values: &[f64], count: usize) -> Vec<f64> {
    let len = values.len();
    (0..count)
        .map(|i| {
            let start = i * len / count;
            let end = ((i + 1) * len / count).max(start + 1);
            let bucket = &values[start..end];
            bucket.iter().sum::<f64>() / bucket.len() as f64
        })
        .collect()
}

/// Linearly interpolate `values` up to `count` evenly spaced points.
fn interpolate(values: &[f64], count: usize) -> Vec<f64> {
    if values.len() == 1 || count == 1 {
        return vec![values[0]; count];
    }
    let scale = (values.len() - 1) as f64 / (count - 1) as f64;
    (0..count)
        .map(|i| {
            let position = i as f64 * scale;
            let lower = position.floor() as usize;
            let upper = (lower + 1).min(values.len() - 1);
            let fraction = position - lower as f64;
            values[lower] * (1.0 - fraction) + values[upper] * fraction
        })
        .collect()
}

fn resample(values: &[f64], count: usize) -> Vec<f64> {
    match values.len() {
        0 => vec![0.0; count],
        len if len > count => downsample(values, count),
        len if len < count => interpolate(values, count),
        _ => values.to_vec(),
    }
}

/// Power spectrum with the DC component removed
fn dc_free_power(fft: &FftProcessor, signal: &dyn SignalView) -> (Vec<f64>, Vec<f64>) {
    let samples = mean_per_sample(signal);
    let (frequencies, mut power) = fft.power_spectrum(&samples, signal.samples_per_second());
    if let Some(dc) = power.first_mut() {
        *dc = 0.0;
    }
    (frequencies, power)
}

/// FFT power in `band_count` bands between `min_hz` and `max_hz`
///
/// The power spectrum is trimmed to the frequency range, then averaged down
/// or interpolated up to `band_count` values, optionally normalized to zero
/// mean and unit standard deviation, and optionally converted to log10.
pub struct FftExtractor {
    fft: FftProcessor,
    min_hz: f64,
    max_hz: f64,
    band_count: usize,
    normalize: bool,
    use_log: bool,
}

impl FftExtractor {
    pub fn new(
        min_hz: f64,
        max_hz: f64,
        band_count: usize,
        normalize: bool,
        use_log: bool,
    ) -> Result<Self, FeatureError> {
        validate_range(min_hz, max_hz)?;
        if band_count == 0 {
            return Err(FeatureError::invalid_config("band count must be at least 1"));
        }
        Ok(Self {
            fft: FftProcessor::new(),
            min_hz,
            max_hz,
            band_count,
            normalize,
            use_log,
        })
    }

    pub fn band_count(&self) -> usize {
        self.band_count
    }
}

impl Default for FftExtractor {
    fn default() -> Self {
        Self {
            fft: FftProcessor::new(),
            min_hz: DEFAULT_MIN_HZ,
            max_hz: DEFAULT_MAX_HZ,
            band_count: DEFAULT_BAND_COUNT,
            normalize: false,
            use_log: false,
        }
    }
}

impl FeatureExtractor for FftExtractor {
    fn name(&self) -> &str {
        "fft"
    }

    fn config(&self) -> serde_json::Value {
        json!({
            "min_hz": self.min_hz,
            "max_hz": self.max_hz,
            "band_count": self.band_count,
            "normalize": self.normalize,
            "use_log": self.use_log,
        })
    }

    fn apply(&self, signal: &dyn SignalView) -> Result<Feature, FeatureError> {
        if signal.sample_count() == 0 {
            return Err(FeatureError::EmptySignal {
                extractor: self.name().to_string(),
            });
        }

        let (frequencies, power) = dc_free_power(&self.fft, signal);
        let (trimmed_freq, trimmed_power): (Vec<f64>, Vec<f64>) = frequencies
            .iter()
            .zip(&power)
            .filter(|(f, _)| (self.min_hz..=self.max_hz).contains(*f))
            .map(|(f, p)| (*f, *p))
            .unzip();

        let (freq, mut bands) = if trimmed_freq.is_empty() {
            let width = (self.max_hz - self.min_hz) / self.band_count as f64;
            (
                Vector::regular(self.min_hz, width, self.band_count),
                vec![0.0; self.band_count],
            )
        } else {
            (
                Vector::explicit(resample(&trimmed_freq, self.band_count)),
                resample(&trimmed_power, self.band_count),
            )
        };

        if self.normalize {
            normalize_in_place(&mut bands);
        }
        if self.use_log {
            for value in bands.iter_mut() {
                *value = value.max(LOG_FLOOR).log10();
            }
        }

        Ok(Feature::with_independent(
            signal.start_msec(),
            signal.end_msec(),
            bands,
            freq,
        ))
    }
}

/// Zero mean, unit standard deviation (mean removal only when the deviation is 0).
pub(crate) fn normalize_in_place(values: &mut [f64]) {
    if values.is_empty() {
        return;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    for value in values.iter_mut() {
        *value -= mean;
        if stddev > 0.0 {
            *value /= stddev;
        }
    }
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Mel filter bank energies
///
/// `band_count` triangular filters evenly spaced on the mel scale between
/// `min_hz` and `max_hz` (capped at the Nyquist frequency) are applied to the
/// power spectrum.
pub struct MelExtractor {
    fft: FftProcessor,
    min_hz: f64,
    max_hz: f64,
    band_count: usize,
    use_log: bool,
}

impl MelExtractor {
    pub fn new(min_hz: f64, max_hz: f64, band_count: usize, use_log: bool) -> Result<Self, FeatureError> {
        validate_range(min_hz, max_hz)?;
        if band_count == 0 {
            return Err(FeatureError::invalid_config("band count must be at least 1"));
        }
        Ok(Self {
            fft: FftProcessor::new(),
            min_hz,
            max_hz,
            band_count,
            use_log,
        })
    }
}

impl FeatureExtractor for MelExtractor {
    fn name(&self) -> &str {
        "mel"
    }

    fn config(&self) -> serde_json::Value {
        json!({
            "min_hz": self.min_hz,
            "max_hz": self.max_hz,
            "band_count": self.band_count,
            "use_log": self.use_log,
        })
    }

    fn apply(&self, signal: &dyn SignalView) -> Result<Feature, FeatureError> {
        if signal.sample_count() == 0 {
            return Err(FeatureError::EmptySignal {
                extractor: self.name().to_string(),
            });
        }

        let (frequencies, power) = dc_free_power(&self.fft, signal);
        let nyquist = signal.samples_per_second() / 2.0;
        let max_hz = self.max_hz.min(nyquist);
        let min_hz = self.min_hz.min(max_hz);

        let min_mel = hz_to_mel(min_hz);
        let mel_step = (hz_to_mel(max_hz) - min_mel) / (self.band_count + 1) as f64;
        let edges: Vec<f64> = (0..self.band_count + 2)
            .map(|i| mel_to_hz(min_mel + i as f64 * mel_step))
            .collect();

        let mut energies = Vec::with_capacity(self.band_count);
        for band in 0..self.band_count {
            let (lower, center, upper) = (edges[band], edges[band + 1], edges[band + 2]);
            let energy: f64 = frequencies
                .iter()
                .zip(&power)
                .map(|(&f, &p)| {
                    let weight = if f > lower && f <= center && center > lower {
                        (f - lower) / (center - lower)
                    } else if f > center && f < upper && upper > center {
                        (upper - f) / (upper - center)
                    } else {
                        0.0
                    };
                    weight * p
                })
                .sum();
            energies.push(if self.use_log {
                energy.max(LOG_FLOOR).log10()
            } else {
                energy
            });
        }

        let centers = Vector::explicit(edges[1..=self.band_count].to_vec());
        Ok(Feature::with_independent(
            signal.start_msec(),
            signal.end_msec(),
            energies,
            centers,
        ))
    }
}
