//! Configuration management for caching and feature extraction
//!
//! This module provides runtime configuration loading from JSON files so the
//! cache bounds and the feature-caching toggles can be adjusted without
//! recompilation. The process-wide configuration is read once, on first use.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable naming the JSON config file read by [`EngineConfig::load`]
pub const CONFIG_ENV_VAR: &str = "SIGNAL_WINDOWS_CONFIG";

static GLOBAL: Lazy<EngineConfig> = Lazy::new(EngineConfig::load);

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub features: FeatureConfig,
}

/// Memory cache parameters, applied to every cache a registry creates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Global caching switch; when false every cache misses and ignores puts
    pub enabled: bool,
    /// Maximum entries per cache before least-recently-used eviction
    pub capacity: usize,
    /// Number of independently locked shards per cache
    pub shards: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 100_000,
            shards: 16,
        }
    }
}

/// Feature extraction caching and scheduling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Cache feature grams per (window, descriptor)
    pub gram_caching_enabled: bool,
    /// Allow caching iterables over labeled feature grams
    pub labeled_caching_enabled: bool,
    /// Produce lazily evaluated (streamed) feature iterables
    pub streaming_enabled: bool,
    /// Sub-window count above which extraction runs in parallel; 0 = 2 x cores
    pub parallel_threshold: usize,
    /// Stripe count for per-window extraction locks
    pub window_locks: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            gram_caching_enabled: true,
            labeled_caching_enabled: true,
            streaming_enabled: true,
            parallel_threshold: 0,
            window_locks: 64,
        }
    }
}

impl FeatureConfig {
    /// Parallel threshold with the `0 = 2 x available cores` default resolved
    pub fn effective_parallel_threshold(&self) -> usize {
        if self.parallel_threshold > 0 {
            return self.parallel_threshold;
        }
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        2 * cores
    }
}

impl EngineConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file doesn't exist or
    /// its JSON is invalid. Missing fields take their default values.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load from the file named by `SIGNAL_WINDOWS_CONFIG`, or use defaults
    pub fn load() -> Self {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load_from_file(path),
            _ => {
                log::debug!(
                    "[Config] {} not set, using default configuration",
                    CONFIG_ENV_VAR
                );
                Self::default()
            }
        }
    }

    /// Process-wide configuration, loaded once on first access
    pub fn global() -> &'static EngineConfig {
        &GLOBAL
    }
}
