//! Cache Statistics Module
//!
//! Tracks process-wide cache counters: hits, misses, per-tier hits, saves and errors.

use serde::Serialize;

use super::entry::StorageLevel;

// == Cache Stats ==
/// Running counters kept by the cache manager.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub db_hits: u64,
    pub saves: u64,
    pub updates: u64,
    pub errors: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Ratio ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    /// Increments the hit counter and the counter of the tier that served it.
    pub fn record_hit(&mut self, level: StorageLevel) {
        self.hits += 1;
        match level {
            StorageLevel::Memory => self.memory_hits += 1,
            StorageLevel::Disk => self.disk_hits += 1,
            StorageLevel::Database => self.db_hits += 1,
        }
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_save(&mut self) {
        self.saves += 1;
    }

    pub fn record_update(&mut self) {
        self.updates += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    // == Snapshot ==
    /// Copy of the counters with the derived hit ratio.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits,
            misses: self.misses,
            memory_hits: self.memory_hits,
            disk_hits: self.disk_hits,
            db_hits: self.db_hits,
            cache_saves: self.saves,
            cache_updates: self.updates,
            cache_errors: self.errors,
            hit_ratio: self.hit_ratio(),
        }
    }
}

// == Stats Snapshot ==
/// Point-in-time view of the counters, serialized in camelCase.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub db_hits: u64,
    pub cache_saves: u64,
    pub cache_updates: u64,
    pub cache_errors: u64,
    pub hit_ratio: f64,
}
