use crate::cache::{CacheError, CacheStats, CacheStatsSnapshot, CacheValue};
use dashmap::DashMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

//sizing and expiry for one named region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRegionConfig {
    pub name: String,
    pub max_size: usize,
    pub expire_after_write_ms: u64,
}

impl CacheRegionConfig {
    pub fn new(name: impl Into<String>, max_size: usize, expire_after_write: Duration) -> Self {
        CacheRegionConfig {
            name: name.into(),
            max_size,
            expire_after_write_ms: expire_after_write.as_millis() as u64,
        }
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        let invalid = |reason: &str| CacheError::InvalidRegion {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.max_size == 0 {
            return Err(invalid("max_size must be positive"));
        }
        if self.expire_after_write_ms == 0 {
            return Err(invalid("expire_after_write_ms must be positive"));
        }
        Ok(())
    }
}

struct CacheEntry {
    value: CacheValue,
    written_at: Instant,
    last_access: AtomicU64,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.written_at) >= ttl
    }
}

//bounded, write-expiring cache partition with lru eviction
//hits are served from the concurrent map without taking the region lock;
//computation on miss, insertion and eviction all happen under the region lock
pub struct CacheRegion {
    name: String,
    max_size: usize,
    expire_after_write: Duration,
    entries: DashMap<String, CacheEntry>,
    write_lock: Mutex<()>,
    access_clock: AtomicU64,
    stats: CacheStats,
}

impl fmt::Debug for CacheRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegion")
            .field("name", &self.name)
            .field("max_size", &self.max_size)
            .field("len", &self.entries.len())
            .finish()
    }
}

impl CacheRegion {
    pub fn new(config: &CacheRegionConfig) -> Result<Self, CacheError> {
        config.validate()?;

        Ok(CacheRegion {
            name: config.name.clone(),
            max_size: config.max_size,
            expire_after_write: Duration::from_millis(config.expire_after_write_ms),
            entries: DashMap::new(),
            write_lock: Mutex::new(()),
            access_clock: AtomicU64::new(0),
            stats: CacheStats::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn expire_after_write(&self) -> Duration {
        self.expire_after_write
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    //returns the cached value, counting a hit or a miss
    pub fn get(&self, key: &str) -> Option<CacheValue> {
        let found = self.lookup(key);
        if found.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        found
    }

    //returns the cached value or computes it at most once per key under contention
    pub fn get_or_compute<E, F>(&self, key: &str, compute: F) -> Result<CacheValue, E>
    where
        F: FnOnce() -> Result<CacheValue, E>,
    {
        if let Some(value) = self.lookup(key) {
            self.stats.record_hit();
            return Ok(value);
        }

        let _guard = self.lock();

        //another thread may have filled the key while we waited
        if let Some(value) = self.lookup(key) {
            self.stats.record_hit();
            return Ok(value);
        }

        self.stats.record_miss();
        let value = compute()?;
        self.stats.record_computation();
        self.insert_locked(key.to_string(), value.clone());

        Ok(value)
    }

    //stores a value, refreshing its write time
    pub fn put(&self, key: impl Into<String>, value: CacheValue) {
        let _guard = self.lock();
        self.insert_locked(key.into(), value);
    }

    pub fn invalidate(&self, key: &str) -> bool {
        let _guard = self.lock();
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        let _guard = self.lock();
        self.entries.clear();
    }

    //removes every entry past its write expiry and returns how many were dropped
    pub fn cleanup(&self) -> usize {
        let _guard = self.lock();
        let now = Instant::now();
        let before = self.entries.len();
        let ttl = self.expire_after_write;

        self.entries.retain(|_, entry| !entry.is_expired(ttl, now));

        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.stats.record_expirations(removed as u64);
            debug!("cache region '{}' expired {} entries", self.name, removed);
        }
        removed
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_tick(&self) -> u64 {
        self.access_clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    //reads without touching stats; expired entries are dropped lazily
    fn lookup(&self, key: &str) -> Option<CacheValue> {
        let ttl = self.expire_after_write;

        let expired = match self.entries.get(key) {
            Some(entry) if !entry.value().is_expired(ttl, Instant::now()) => {
                let entry = entry.value();
                entry.last_access.store(self.next_tick(), Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            let removed = self
                .entries
                .remove_if(key, |_, entry| entry.is_expired(ttl, Instant::now()));
            if removed.is_some() {
                self.stats.record_expirations(1);
            }
        }

        None
    }

    //caller must hold the region lock
    fn insert_locked(&self, key: String, value: CacheValue) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_size {
            self.evict_least_recently_used();
        }

        self.entries.insert(
            key,
            CacheEntry {
                value,
                written_at: Instant::now(),
                last_access: AtomicU64::new(self.next_tick()),
            },
        );
    }

    fn evict_least_recently_used(&self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().last_access.load(Ordering::Relaxed))
            .map(|entry| entry.key().clone());

        if let Some(key) = victim {
            self.entries.remove(&key);
            self.stats.record_eviction();
        }
    }
}
