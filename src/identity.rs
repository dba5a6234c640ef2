//! Process-unique instance identities.
//!
//! Every window, feature, feature gram and caching iterable receives an id at
//! construction. Cache keys are built from these ids, so two objects with equal
//! content but different ids never share a cache entry.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable integer identity assigned once and never reused within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Allocate the next id.
    pub fn next() -> Self {
        InstanceId(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
