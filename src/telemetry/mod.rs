//! Cache and pipeline telemetry.
//!
//! Per-cache counters live inside each `MultiKeyCache`; process-wide counters
//! (windows derived, features extracted, advisories emitted) live in the
//! global hub. Both produce serde-serializable snapshots for reporting.

use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Hit/miss/insert/eviction counters for one cache.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self, name: &str, entries: usize) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            name: name.to_string(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries,
        }
    }
}

/// Point-in-time view of a cache's counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStatsSnapshot {
    /// Fraction of lookups that hit, 0.0 when nothing was looked up.
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Process-wide counters.
#[derive(Debug, Default)]
pub struct TelemetryHub {
    windows_created: AtomicU64,
    windows_derived: AtomicU64,
    features_extracted: AtomicU64,
    advisories_emitted: AtomicU64,
}

impl TelemetryHub {
    pub fn record_window_created(&self) {
        self.windows_created.fetch_add(1, Ordering::Relaxed);
    }

    /// A sub-window, resize or split produced a new (uncached) window.
    pub fn record_window_derived(&self) {
        self.windows_derived.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_features_extracted(&self, count: usize) {
        self.features_extracted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_advisory(&self) {
        self.advisories_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            windows_created: self.windows_created.load(Ordering::Relaxed),
            windows_derived: self.windows_derived.load(Ordering::Relaxed),
            features_extracted: self.features_extracted.load(Ordering::Relaxed),
            advisories_emitted: self.advisories_emitted.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of the process-wide counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub windows_created: u64,
    pub windows_derived: u64,
    pub features_extracted: u64,
    pub advisories_emitted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_snapshot() {
        let stats = CacheStats::default();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_insert();
        stats.record_evictions(3);

        let snap = stats.snapshot("windows", 7);
        assert_eq!(snap.name, "windows");
        assert_eq!(snap.hits, 2);
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.inserts, 1);
        assert_eq!(snap.evictions, 3);
        assert_eq!(snap.entries, 7);
        assert!((snap.hit_ratio() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_cache_stats_reset() {
        let stats = CacheStats::default();
        stats.record_hit();
        stats.reset();
        let snap = stats.snapshot("x", 0);
        assert_eq!(snap.hits, 0);
        assert_eq!(snap.hit_ratio(), 0.0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snap = CacheStats::default().snapshot("features", 0);
        let json = serde_json::to_string(&snap).unwrap();
        let parsed: CacheStatsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snap);
    }

    #[test]
    fn test_hub_counters_increase() {
        let before = hub().snapshot();
        hub().record_window_created();
        hub().record_features_extracted(4);
        let after = hub().snapshot();
        assert!(after.windows_created >= before.windows_created + 1);
        assert!(after.features_extracted >= before.features_extracted + 4);
    }
}
