pub mod key;
pub mod manager;
pub mod region;

pub use key::indicator_key;
pub use manager::{CacheManager, DATA_REGION, INDICATORS_REGION, STRATEGIES_REGION};
pub use region::{CacheRegion, CacheRegionConfig};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("Cache region '{0}' is already registered")]
    DuplicateRegion(String),
    #[error("Invalid cache region '{name}': {reason}")]
    InvalidRegion { name: String, reason: String },
}

//values memoized by strategies
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Scalar(f64),
    Series(Arc<Vec<f64>>),
    Text(String),
}

impl CacheValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            CacheValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            CacheValue::Series(values) => Some(values.as_slice()),
            _ => None,
        }
    }
}

impl From<f64> for CacheValue {
    fn from(value: f64) -> Self {
        CacheValue::Scalar(value)
    }
}

impl From<Vec<f64>> for CacheValue {
    fn from(values: Vec<f64>) -> Self {
        CacheValue::Series(Arc::new(values))
    }
}

//lock-free counters kept per region
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    computations: AtomicU64,
}

impl CacheStats {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_computation(&self) {
        self.computations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub computations: u64,
}

impl CacheStatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
