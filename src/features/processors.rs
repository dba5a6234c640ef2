// Processors module - Whole feature gram transformations

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::FeatureError;

use super::{Feature, FeatureGram, FeatureProcessor};

fn mean_and_stddev<I: Iterator<Item = f64> + Clone>(values: I) -> (f64, f64) {
    let (sum, count) = values.clone().fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    (mean, variance.sqrt())
}

/// Zero-mean and/or unit-stddev normalization of a feature gram
///
/// `across_time` normalizes each feature dimension over all feature vectors,
/// `across_features` normalizes each feature vector over its own values, and
/// both together normalize the whole gram as one population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizingProcessor {
    pub zero_mean: bool,
    pub unit_stddev: bool,
    pub across_time: bool,
    pub across_features: bool,
}

impl Default for NormalizingProcessor {
    fn default() -> Self {
        Self {
            zero_mean: true,
            unit_stddev: true,
            across_time: true,
            across_features: false,
        }
    }
}

impl NormalizingProcessor {
    fn adjust(&self, value: f64, mean: f64, stddev: f64) -> f64 {
        let mut v = value;
        if self.zero_mean {
            v -= mean;
        }
        if self.unit_stddev && stddev > 0.0 {
            v = if self.zero_mean {
                v / stddev
            } else {
                // scale around the mean without removing it
                mean + (v - mean) / stddev
            };
        }
        v
    }
}

impl FeatureProcessor for NormalizingProcessor {
    fn name(&self) -> &str {
        "normalizing"
    }

    fn config(&self) -> serde_json::Value {
        json!(self)
    }

    fn apply(&self, gram: &FeatureGram) -> Result<FeatureGram, FeatureError> {
        let rows = gram.matrix()?;
        let dims = gram.dimensions();

        let normalized: Vec<Vec<f64>> = match (self.across_time, self.across_features) {
            (false, false) => rows.iter().map(|row| row.to_vec()).collect(),
            (true, false) => {
                let stats: Vec<(f64, f64)> = (0..dims)
                    .map(|d| mean_and_stddev(rows.iter().map(|row| row[d])))
                    .collect();
                rows.iter()
                    .map(|row| {
                        row.iter()
                            .zip(&stats)
                            .map(|(&v, &(mean, stddev))| self.adjust(v, mean, stddev))
                            .collect()
                    })
                    .collect()
            }
            (false, true) => rows
                .iter()
                .map(|row| {
                    let (mean, stddev) = mean_and_stddev(row.iter().copied());
                    row.iter().map(|&v| self.adjust(v, mean, stddev)).collect()
                })
                .collect(),
            (true, true) => {
                let (mean, stddev) = mean_and_stddev(rows.iter().flat_map(|row| row.iter().copied()));
                rows.iter()
                    .map(|row| row.iter().map(|&v| self.adjust(v, mean, stddev)).collect())
                    .collect()
            }
        };

        let features = gram
            .features()
            .iter()
            .zip(normalized)
            .map(|(feature, values)| feature.with_values(values))
            .collect();
        Ok(FeatureGram::new(features))
    }
}

/// Whether deltas are appended to each feature vector or replace it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaMode {
    Append,
    Replace,
}

/// First-order time differences of a feature gram
///
/// Uses the regression formula over `±half_window` neighbouring feature
/// vectors, with indices clamped at the edges of the gram:
/// `d[t] = Σ n (c[t+n] - c[t-n]) / (2 Σ n²)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaProcessor {
    half_window: usize,
    mode: DeltaMode,
}

impl DeltaProcessor {
    pub fn new(half_window: usize, mode: DeltaMode) -> Result<Self, FeatureError> {
        if half_window == 0 {
            return Err(FeatureError::invalid_config("delta half window must be at least 1"));
        }
        Ok(Self { half_window, mode })
    }

    pub fn half_window(&self) -> usize {
        self.half_window
    }

    pub fn mode(&self) -> DeltaMode {
        self.mode
    }
}

impl FeatureProcessor for DeltaProcessor {
    fn name(&self) -> &str {
        "delta"
    }

    fn config(&self) -> serde_json::Value {
        json!({ "half_window": self.half_window, "mode": self.mode })
    }

    fn apply(&self, gram: &FeatureGram) -> Result<FeatureGram, FeatureError> {
        let required = 2 * self.half_window + 1;
        if gram.len() < required {
            return Err(FeatureError::InsufficientFeatures {
                required,
                actual: gram.len(),
            });
        }
        let rows = gram.matrix()?;
        let dims = gram.dimensions();
        let last = rows.len() - 1;
        let denominator =
            2.0 * (1..=self.half_window).map(|n| (n * n) as f64).sum::<f64>();

        let features: Vec<Feature> = gram
            .features()
            .iter()
            .enumerate()
            .map(|(t, feature)| {
                let deltas = (0..dims).map(|d| {
                    (1..=self.half_window)
                        .map(|n| {
                            let ahead = rows[(t + n).min(last)][d];
                            let behind = rows[t.saturating_sub(n)][d];
                            n as f64 * (ahead - behind)
                        })
                        .sum::<f64>()
                        / denominator
                });
                let values = match self.mode {
                    DeltaMode::Replace => deltas.collect(),
                    DeltaMode::Append => feature.values().iter().copied().chain(deltas).collect(),
                };
                feature.with_values(values)
            })
            .collect();
        Ok(FeatureGram::new(features))
    }
}
