// Temporal module - Time-domain feature extraction

use crate::error::FeatureError;
use crate::vector::Vector;
use crate::window::SignalView;

use super::{Feature, FeatureExtractor};

fn require_samples(name: &str, signal: &dyn SignalView) -> Result<(), FeatureError> {
    if signal.sample_count() == 0 || signal.values().is_empty() {
        return Err(FeatureError::EmptySignal {
            extractor: name.to_string(),
        });
    }
    Ok(())
}

/// The window's values as the feature vector
///
/// For one-dimensional windows the feature carries the window's independent
/// values (timestamps) alongside.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityExtractor;

impl FeatureExtractor for IdentityExtractor {
    fn name(&self) -> &str {
        "identity"
    }

    fn apply(&self, signal: &dyn SignalView) -> Result<Feature, FeatureError> {
        require_samples(self.name(), signal)?;
        let values = signal.values().to_vec();
        let feature = if signal.dimensions() == 1 {
            Feature::with_independent(
                signal.start_msec(),
                signal.end_msec(),
                values,
                Vector::explicit(signal.independent_values().to_vec()),
            )
        } else {
            Feature::new(signal.start_msec(), signal.end_msec(), values)
        };
        Ok(feature)
    }
}

/// Root mean square energy, one value per interleaved dimension
#[derive(Debug, Default, Clone, Copy)]
pub struct RmsExtractor;

impl FeatureExtractor for RmsExtractor {
    fn name(&self) -> &str {
        "rms"
    }

    fn apply(&self, signal: &dyn SignalView) -> Result<Feature, FeatureError> {
        require_samples(self.name(), signal)?;
        let dims = signal.dimensions().max(1);
        let mut sums = vec![0.0; dims];
        let mut counts = vec![0usize; dims];
        for (i, &value) in signal.values().iter().enumerate() {
            sums[i % dims] += value * value;
            counts[i % dims] += 1;
        }
        let rms = sums
            .iter()
            .zip(&counts)
            .map(|(sum, &n)| if n == 0 { 0.0 } else { (sum / n as f64).sqrt() })
            .collect();
        Ok(Feature::new(signal.start_msec(), signal.end_msec(), rms))
    }
}

/// Amplitude statistics `[mean, min, max, stddev]` of `|x|`
#[derive(Debug, Default, Clone, Copy)]
pub struct StatsExtractor;

impl FeatureExtractor for StatsExtractor {
    fn name(&self) -> &str {
        "stats"
    }

    fn apply(&self, signal: &dyn SignalView) -> Result<Feature, FeatureError> {
        require_samples(self.name(), signal)?;
        let values = signal.values();
        let n = values.len() as f64;

        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values.iter().map(|v| v.abs()) {
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        let mean = sum / n;
        let variance = values
            .iter()
            .map(|v| (v.abs() - mean).powi(2))
            .sum::<f64>()
            / n;

        Ok(Feature::new(
            signal.start_msec(),
            signal.end_msec(),
            vec![mean, min, max, variance.sqrt()],
        ))
    }
}
