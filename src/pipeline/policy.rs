// Policy module - caching strategy resolution and one-time advisories

use std::sync::atomic::{AtomicBool, Ordering};

use crate::telemetry;

/// Active caching strategy of a pipeline or iterable wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachingStrategy {
    Uncached,
    Memory,
    /// Disk cache requested; memory caching is also used when `with_memory`
    Disk { with_memory: bool },
}

impl CachingStrategy {
    /// Resolve the strategy from the global flag and the requested tiers.
    ///
    /// Requesting any tier while caching is globally disabled resolves to
    /// [`CachingStrategy::Uncached`] and emits the disabled advisory once.
    pub fn resolve(
        globally_enabled: bool,
        use_memory: bool,
        use_disk: bool,
        advisories: &AdvisoryLog,
    ) -> Self {
        if !use_memory && !use_disk {
            return CachingStrategy::Uncached;
        }
        if !globally_enabled {
            advisories.caching_disabled();
            return CachingStrategy::Uncached;
        }
        if use_disk {
            CachingStrategy::Disk {
                with_memory: use_memory,
            }
        } else {
            CachingStrategy::Memory
        }
    }

    /// Strategy to use when the disk tier turned out to be unavailable
    pub fn without_disk(self) -> Self {
        match self {
            CachingStrategy::Disk { with_memory: true } => CachingStrategy::Memory,
            CachingStrategy::Disk { with_memory: false } => CachingStrategy::Uncached,
            other => other,
        }
    }

    pub fn uses_memory(&self) -> bool {
        matches!(
            self,
            CachingStrategy::Memory | CachingStrategy::Disk { with_memory: true }
        )
    }
}

/// Soft-degradation notices, each logged at most once per context
#[derive(Debug, Default)]
pub struct AdvisoryLog {
    caching_disabled: AtomicBool,
    not_streamed: AtomicBool,
    disk_unavailable: AtomicBool,
}

impl AdvisoryLog {
    /// True the first time `flag` is raised
    fn first(flag: &AtomicBool) -> bool {
        let first = !flag.swap(true, Ordering::AcqRel);
        if first {
            telemetry::hub().record_advisory();
        }
        first
    }

    /// Caching was requested while globally disabled
    pub fn caching_disabled(&self) {
        if Self::first(&self.caching_disabled) {
            log::info!(
                "[FeatureCache] Caching requested but disabled by configuration; continuing uncached"
            );
        }
    }

    /// Caching was requested for a source that already holds all of its windows
    pub fn not_streamed(&self) {
        if Self::first(&self.not_streamed) {
            log::info!(
                "[FeatureCache] Source is not streamed; caching skipped and input returned unchanged"
            );
        }
    }

    /// The disk tier is unavailable; `fallback` is what is used instead
    pub fn disk_unavailable(&self, fallback: CachingStrategy) {
        if Self::first(&self.disk_unavailable) {
            log::warn!(
                "[FeatureCache] Disk caching unavailable, falling back to {:?}",
                fallback
            );
        }
    }

    /// Number of distinct advisories emitted so far
    pub fn emitted(&self) -> usize {
        [
            &self.caching_disabled,
            &self.not_streamed,
            &self.disk_unavailable,
        ]
        .iter()
        .filter(|flag| flag.load(Ordering::Acquire))
        .count()
    }
}
