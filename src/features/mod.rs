// Features - feature vectors, feature grams and the extractor/processor plugins
//
// An extractor turns one window into one feature vector. A feature gram is the
// ordered sequence of feature vectors produced by sliding an extractor across
// a window. A processor maps a whole feature gram to a new one (normalization,
// deltas).
//
// Module organization:
// - fft: FFT power spectrum computation with windowing
// - spectral: frequency-domain extractors (FFT bands, mel filter bank)
// - temporal: time-domain extractors (identity, RMS, amplitude statistics)
// - processors: feature gram processors (normalizing, delta)
//
// Every extractor and processor reports a name and a JSON configuration. The
// hash of both is its signature, which is part of every feature cache key, so
// two differently configured extractors never share cached results.

mod fft;
mod processors;
mod spectral;
mod temporal;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::FeatureError;
use crate::identity::InstanceId;
use crate::vector::Vector;
use crate::window::SignalView;

pub use fft::FftProcessor;
pub use processors::{DeltaMode, DeltaProcessor, NormalizingProcessor};
pub use spectral::{FftExtractor, MelExtractor};
pub use temporal::{IdentityExtractor, RmsExtractor, StatsExtractor};

/// One feature vector extracted from the span `[start_msec, end_msec]`
#[derive(Debug, Clone)]
pub struct Feature {
    id: InstanceId,
    start_msec: f64,
    end_msec: f64,
    values: Vec<f64>,
    independent: Option<Vector>,
}

impl Feature {
    pub fn new(start_msec: f64, end_msec: f64, values: Vec<f64>) -> Self {
        Self {
            id: InstanceId::next(),
            start_msec,
            end_msec,
            values,
            independent: None,
        }
    }

    /// Feature whose values are indexed by `independent` (e.g. bin frequencies)
    pub fn with_independent(
        start_msec: f64,
        end_msec: f64,
        values: Vec<f64>,
        independent: Vector,
    ) -> Self {
        Self {
            independent: Some(independent),
            ..Self::new(start_msec, end_msec, values)
        }
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

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn independent(&self) -> Option<&Vector> {
        self.independent.as_ref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// New feature over the same span. The independent data is kept only
    /// when the new values have the same length.
    pub fn with_values(&self, values: Vec<f64>) -> Feature {
        let independent = self
            .independent
            .as_ref()
            .filter(|v| v.len() == values.len())
            .cloned();
        Feature {
            id: InstanceId::next(),
            start_msec: self.start_msec,
            end_msec: self.end_msec,
            values,
            independent,
        }
    }
}

/// Ordered sequence of feature vectors
#[derive(Debug, Clone)]
pub struct FeatureGram {
    id: InstanceId,
    features: Vec<Feature>,
}

impl FeatureGram {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            id: InstanceId::next(),
            features,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Length of each feature vector, 0 for an empty gram
    pub fn dimensions(&self) -> usize {
        self.features.first().map_or(0, Feature::len)
    }

    /// Feature vectors as rows; fails if they differ in length.
    pub fn matrix(&self) -> Result<Vec<&[f64]>, FeatureError> {
        let dims = self.dimensions();
        self.features
            .iter()
            .map(|f| {
                if f.len() == dims {
                    Ok(f.values())
                } else {
                    Err(FeatureError::DimensionMismatch {
                        expected: dims,
                        actual: f.len(),
                    })
                }
            })
            .collect()
    }
}

/// Hash of a plugin name and its canonical JSON configuration
pub fn signature_of(name: &str, config: &serde_json::Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    config.to_string().hash(&mut hasher);
    hasher.finish()
}

/// Computes one feature vector from a window
pub trait FeatureExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// Parameters that change the output; part of the signature
    fn config(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn apply(&self, signal: &dyn SignalView) -> Result<Feature, FeatureError>;

    fn signature(&self) -> u64 {
        signature_of(self.name(), &self.config())
    }
}

/// Maps a feature gram to a new feature gram
pub trait FeatureProcessor: Send + Sync {
    fn name(&self) -> &str;

    fn config(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn apply(&self, gram: &FeatureGram) -> Result<FeatureGram, FeatureError>;

    fn signature(&self) -> u64 {
        signature_of(self.name(), &self.config())
    }
}

/// Collapse interleaved multi-dimensional samples to their per-sample mean.
pub(crate) fn mean_per_sample(signal: &dyn SignalView) -> Vec<f64> {
    let dims = signal.dimensions().max(1);
    if dims == 1 {
        return signal.values().to_vec();
    }
    signal
        .values()
        .chunks_exact(dims)
        .map(|sample| sample.iter().sum::<f64>() / dims as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signature_depends_on_name_and_config() {
        let a = signature_of("fft", &json!({ "bands": 64 }));
        let b = signature_of("fft", &json!({ "bands": 32 }));
        let c = signature_of("mel", &json!({ "bands": 64 }));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, signature_of("fft", &json!({ "bands": 64 })));
    }

    #[test]
    fn test_feature_ids_are_unique() {
        let a = Feature::new(0.0, 10.0, vec![1.0]);
        let b = a.with_values(vec![2.0]);
        assert_ne!(a.id(), b.id());
        assert_eq!(b.start_msec(), 0.0);
        assert_eq!(b.end_msec(), 10.0);
    }

    #[test]
    fn test_with_values_drops_mismatched_independent() {
        let f = Feature::with_independent(0.0, 1.0, vec![1.0, 2.0], Vector::explicit(vec![10.0, 20.0]));
        assert!(f.with_values(vec![3.0, 4.0]).independent().is_some());
        assert!(f.with_values(vec![3.0]).independent().is_none());
    }

    #[test]
    fn test_gram_matrix_rejects_ragged_rows() {
        let gram = FeatureGram::new(vec![
            Feature::new(0.0, 1.0, vec![1.0, 2.0]),
            Feature::new(1.0, 2.0, vec![1.0]),
        ]);
        assert_eq!(gram.dimensions(), 2);
        assert!(matches!(
            gram.matrix().unwrap_err(),
            FeatureError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }
}
