//! Cache Manager Module
//!
//! Orchestrates the memory and disk tiers: lookup with promotion, write-through,
//! deletion, scoped clearing, preloading, warmup and statistics.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use super::clock::{seconds_span, SharedClock, SystemClock};
use super::disk::{DiskStore, CACHE_KEY_FIELD};
use super::entry::{Entry, Policy, StorageLevel};
use super::freshness::Freshness;
use super::key::{Category, KeyCodec, Params, KEY_PREFIX};
use super::loaders::{default_policy, LoadedData, LoaderRegistry, DEFAULT_WARMUP};
use super::memory::{glob_match, FastStore, MemoryStore};
use super::stats::{CacheStats, StatsSnapshot};
use crate::config::Config;
use crate::error::{CacheError, Result};

/// Metadata flag set on entries written by `preload`.
pub const PRELOADED_FIELD: &str = "preloaded";

type NoRefresh = fn() -> std::future::Ready<anyhow::Result<Value>>;

// == Get Options ==
/// Optional arguments of [`CacheManager::get`].
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub params: Option<Params>,
    /// Overrides the stored entry's policy when judging freshness
    pub policy: Option<Policy>,
    /// Maximum accepted age in seconds
    pub max_age: Option<u64>,
    /// Drop any cached value before looking up
    pub force_refresh: bool,
    /// Returned when nothing (not even a stale value) is available
    pub default: Option<Value>,
    /// Pins the lookup to a single tier
    pub level: Option<StorageLevel>,
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn level(mut self, level: StorageLevel) -> Self {
        self.level = Some(level);
        self
    }
}

// == Set Options ==
/// Optional arguments of [`CacheManager::set`].
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub params: Option<Params>,
    pub policy: Policy,
    /// Explicit TTL in seconds; otherwise derived from the policy
    pub ttl: Option<u64>,
    pub source: Option<String>,
    /// Target tier; `None` writes both
    pub level: Option<StorageLevel>,
    pub metadata: Map<String, Value>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn ttl(mut self, seconds: u64) -> Self {
        self.ttl = Some(seconds);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn level(mut self, level: StorageLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn meta(mut self, field: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(field.into(), value);
        self
    }
}

// == Cache Manager ==
/// Two-tier cache front.
///
/// One instance per process, built by the composition root and shared as
/// `Arc<CacheManager>`. Tier calls happen outside the statistics lock.
///
/// Concurrent misses on the same key are not coalesced: every caller runs
/// its own refresh and the last write wins.
pub struct CacheManager {
    memory: Arc<dyn FastStore>,
    disk: DiskStore,
    stats: Mutex<CacheStats>,
    loaders: LoaderRegistry,
    clock: SharedClock,
    /// Volatile entries with a shorter TTL stay out of the disk tier
    disk_min_ttl: u64,
}

impl CacheManager {
    // == Constructor ==
    /// Creates a manager over the given tiers.
    pub fn new(memory: Arc<dyn FastStore>, disk: DiskStore, clock: SharedClock) -> Self {
        Self {
            memory,
            disk,
            stats: Mutex::new(CacheStats::new()),
            loaders: LoaderRegistry::new(),
            clock,
            disk_min_ttl: Config::default().disk_min_ttl,
        }
    }

    /// Creates a manager with a `MemoryStore` and a `DiskStore` from configuration.
    ///
    /// When `seed_dir` is set, its `<category>.json` files back warmup.
    pub fn from_config(config: &Config) -> Self {
        let clock: SharedClock = Arc::new(SystemClock);
        let memory = Arc::new(MemoryStore::new(config.memory_max_entries, clock.clone()));
        let disk = DiskStore::new(config.cache_dir.clone(), clock.clone());
        let loaders = config
            .seed_dir
            .as_ref()
            .map(LoaderRegistry::from_seed_dir)
            .unwrap_or_default();
        Self::new(memory, disk, clock)
            .with_disk_min_ttl(config.disk_min_ttl)
            .with_loaders(loaders)
    }

    pub fn with_loaders(mut self, loaders: LoaderRegistry) -> Self {
        self.loaders = loaders;
        self
    }

    pub fn with_disk_min_ttl(mut self, seconds: u64) -> Self {
        self.disk_min_ttl = seconds;
        self
    }

    pub fn disk(&self) -> &DiskStore {
        &self.disk
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    fn with_stats<R>(&self, f: impl FnOnce(&mut CacheStats) -> R) -> R {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut stats)
    }

    // == Get ==
    /// Looks up a value without any recompute callback.
    pub async fn get(&self, category: Category, identifier: &str, opts: GetOptions) -> Option<Value> {
        self.resolve(category, identifier, opts, None::<NoRefresh>)
            .await
    }

    /// Looks up a value, recomputing it with `refresh` on a miss or stale hit.
    ///
    /// A non-null refresh result is written back with the same key, policy
    /// and level. If `refresh` fails, any stale value is returned instead,
    /// then `opts.default`.
    pub async fn get_with<F, Fut>(
        &self,
        category: Category,
        identifier: &str,
        opts: GetOptions,
        refresh: F,
    ) -> Option<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Value>>,
    {
        self.resolve(category, identifier, opts, Some(refresh)).await
    }

    /// Typed [`get`](Self::get). A payload that does not fit `T` counts as an error and a miss.
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        category: Category,
        identifier: &str,
        opts: GetOptions,
    ) -> Option<T> {
        let value = self.get(category, identifier, opts).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!("{} ({})", CacheError::Serialization(e), identifier);
                self.with_stats(|s| s.record_error());
                None
            }
        }
    }

    async fn resolve<F, Fut>(
        &self,
        category: Category,
        identifier: &str,
        opts: GetOptions,
        refresh: Option<F>,
    ) -> Option<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Value>>,
    {
        let key = KeyCodec::build(category, identifier, opts.params.as_ref());

        if opts.force_refresh {
            self.remove_key(&key).await;
        }

        let found = self.lookup(&key, opts.level).await;
        if let Some((entry, level)) = &found {
            if Freshness::is_valid(entry, opts.policy, opts.max_age, self.clock.now()) {
                self.with_stats(|s| s.record_hit(*level));
                debug!("Cache hit ({:?}) for {}", level, key);
                return Some(entry.payload.clone());
            }
        }

        self.with_stats(|s| s.record_miss());
        debug!("Cache miss for {}", key);

        if let Some(refresh) = refresh {
            match refresh().await {
                Ok(value) if !value.is_null() => {
                    let policy = opts
                        .policy
                        .or(found.as_ref().map(|(entry, _)| entry.policy))
                        .unwrap_or_default();
                    let set_opts = SetOptions {
                        params: opts.params.clone(),
                        policy,
                        level: opts.level,
                        ..SetOptions::default()
                    };
                    if self.set(category, identifier, value.clone(), set_opts).await
                        && found.is_some()
                    {
                        self.with_stats(|s| s.record_update());
                    }
                    return Some(value);
                }
                Ok(_) => debug!("Refresh for {} produced no value", key),
                Err(e) => {
                    self.with_stats(|s| s.record_error());
                    let err = CacheError::RefreshFailure {
                        key: key.clone(),
                        reason: format!("{:#}", e),
                    };
                    error!("{}", err);
                }
            }
        }

        found.map(|(entry, _)| entry.payload).or(opts.default)
    }

    /// Finds the entry for `key`, memory first. Disk hits are promoted into memory
    /// unless the lookup is pinned to a tier.
    async fn lookup(&self, key: &str, level: Option<StorageLevel>) -> Option<(Entry, StorageLevel)> {
        match level {
            Some(StorageLevel::Memory) => self.memory.retrieve(key).map(|e| (e, StorageLevel::Memory)),
            Some(StorageLevel::Disk) => self.disk.get(key).await.map(|e| (e, StorageLevel::Disk)),
            Some(StorageLevel::Database) => {
                debug!("No database tier configured, {} not looked up", key);
                None
            }
            None => {
                if let Some(entry) = self.memory.retrieve(key) {
                    return Some((entry, StorageLevel::Memory));
                }
                let entry = self.disk.get(key).await?;
                let ttl = entry.ttl_remaining(self.clock.now());
                if self.memory.store(key, entry.at_level(StorageLevel::Memory), ttl) {
                    debug!("Promoted {} from disk to memory", key);
                }
                Some((entry, StorageLevel::Disk))
            }
        }
    }

    /// Stored entry for a key, without touching statistics or promoting.
    pub async fn peek(
        &self,
        category: Category,
        identifier: &str,
        params: Option<&Params>,
    ) -> Option<Entry> {
        let key = KeyCodec::build(category, identifier, params);
        match self.memory.retrieve(&key) {
            Some(entry) => Some(entry),
            None => self.disk.get(&key).await,
        }
    }

    // == Set ==
    /// Writes `value` to the memory tier and/or disk tier.
    ///
    /// Expiry comes from `opts.ttl`, else from the policy. With no pinned
    /// level, `AlwaysFresh` entries whose TTL is below the disk threshold
    /// are kept in memory only.
    pub async fn set(&self, category: Category, identifier: &str, value: Value, opts: SetOptions) -> bool {
        let key = KeyCodec::build(category, identifier, opts.params.as_ref());
        let ttl = opts.ttl.or_else(|| Freshness::ttl_for(opts.policy, None));
        let entry = Entry::new(value, category, opts.policy, self.clock.now(), ttl)
            .with_source(opts.source)
            .with_metadata(opts.metadata);

        let volatile = opts.policy == Policy::AlwaysFresh
            && ttl.map_or(false, |ttl| ttl < self.disk_min_ttl);
        let (to_memory, to_disk) = match opts.level {
            None => (true, !volatile),
            Some(StorageLevel::Memory) => (true, false),
            Some(StorageLevel::Disk) => (false, true),
            Some(StorageLevel::Database) => {
                warn!("No database tier configured, {} not stored", key);
                return false;
            }
        };

        let mut stored = false;
        if to_memory {
            if self.memory.store(&key, entry.at_level(StorageLevel::Memory), ttl) {
                stored = true;
            } else {
                self.with_stats(|s| s.record_error());
            }
        }
        if to_disk {
            if self.disk.set(&key, &entry.at_level(StorageLevel::Disk)).await {
                stored = true;
            } else {
                self.with_stats(|s| s.record_error());
            }
        } else if to_memory {
            debug!("Skipping disk tier for volatile entry {}", key);
        }

        if stored {
            self.with_stats(|s| s.record_save());
        }
        stored
    }

    /// Typed [`set`](Self::set). A value serde cannot represent counts as an error.
    pub async fn set_value<T: Serialize + ?Sized>(
        &self,
        category: Category,
        identifier: &str,
        value: &T,
        opts: SetOptions,
    ) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.set(category, identifier, value, opts).await,
            Err(e) => {
                warn!("{}", CacheError::Serialization(e));
                self.with_stats(|s| s.record_error());
                false
            }
        }
    }

    // == Delete ==
    /// Removes the entry from every tier; true if any tier held it.
    pub async fn delete(&self, category: Category, identifier: &str, params: Option<&Params>) -> bool {
        let key = KeyCodec::build(category, identifier, params);
        self.remove_key(&key).await
    }

    async fn remove_key(&self, key: &str) -> bool {
        let from_memory = self.memory.remove(key);
        let from_disk = self.disk.delete(key).await;
        from_memory || from_disk
    }

    // == Clear ==
    /// Removes entries of `category` (all categories if `None`) older than
    /// `older_than` seconds (any age if `None`). Returns the number of
    /// distinct keys removed.
    pub async fn clear(&self, category: Option<Category>, older_than: Option<u64>) -> usize {
        let now = self.clock.now();
        let pattern = match category {
            Some(category) => category.key_pattern(),
            None => format!("{}:*", KEY_PREFIX),
        };
        let old_enough = |entry: &Entry| match older_than {
            // Beyond the representable range nothing is old enough
            Some(seconds) => seconds_span(seconds).map_or(false, |limit| entry.age(now) > limit),
            None => true,
        };

        let mut removed: HashSet<String> = HashSet::new();

        if category.is_none() && older_than.is_none() {
            removed.extend(self.memory.list_keys(&pattern));
            self.memory.clear_all();
        } else {
            for key in self.memory.list_keys(&pattern) {
                let matches = self.memory.retrieve(&key).map_or(false, |e| old_enough(&e));
                if matches && self.memory.remove(&key) {
                    removed.insert(key);
                }
            }
        }

        match self.disk.entries().await {
            Ok(entries) => {
                for (path, entry) in entries {
                    let key = entry
                        .metadata
                        .get(CACHE_KEY_FIELD)
                        .and_then(|k| k.as_str())
                        .map(str::to_string);
                    let in_scope = match (&key, category) {
                        (Some(key), _) => glob_match(&pattern, key),
                        // Keyless files can only be attributed by their category field
                        (None, Some(category)) => entry.category == category,
                        (None, None) => true,
                    };
                    if in_scope && old_enough(&entry) && self.disk.remove_file(&path).await {
                        removed.insert(key.unwrap_or_else(|| path.display().to_string()));
                    }
                }
            }
            Err(e) => {
                warn!("Could not scan disk tier during clear: {}", e);
                self.with_stats(|s| s.record_error());
            }
        }

        info!(
            "Cleared {} entries (category={}, older_than={:?})",
            removed.len(),
            category.map_or("all", |c| c.as_str()),
            older_than
        );
        removed.len()
    }

    // == Preload ==
    /// Runs `loader` once and writes every returned pair under `category`,
    /// tagged `preloaded`. A failing loader yields 0.
    pub async fn preload<F, Fut>(&self, category: Category, loader: F, policy: Policy) -> usize
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<LoadedData>>,
    {
        let data = match loader().await {
            Ok(data) => data,
            Err(e) => {
                self.with_stats(|s| s.record_error());
                let err = CacheError::LoaderFailure {
                    category: category.to_string(),
                    reason: format!("{:#}", e),
                };
                error!("{}", err);
                return 0;
            }
        };

        let mut loaded = 0;
        for (identifier, value) in data {
            let opts = SetOptions::new()
                .policy(policy)
                .meta(PRELOADED_FIELD, Value::Bool(true));
            if self.set(category, &identifier, value, opts).await {
                loaded += 1;
            }
        }
        debug!("Preloaded {} entries into {}", loaded, category);
        loaded
    }

    // == Warmup ==
    /// Preloads each category through its registered loader. Categories
    /// without a loader are skipped. Defaults to the slow-changing set.
    pub async fn warmup(&self, categories: Option<&[Category]>) -> usize {
        let categories = categories.unwrap_or(&DEFAULT_WARMUP);
        let mut total = 0;
        for &category in categories {
            let Some(loader) = self.loaders.get(category) else {
                warn!("No loader registered for {}, skipping warmup", category);
                continue;
            };
            total += self.preload(category, || loader(), default_policy(category)).await;
        }
        info!("Cache warmup loaded {} entries", total);
        total
    }

    // == Sweep ==
    /// Removes expired entries from the disk tier.
    pub async fn sweep(&self) -> Result<usize> {
        self.disk.sweep_expired().await
    }

    // == Stats ==
    /// Snapshot of the counters with the derived hit ratio.
    pub fn stats(&self) -> StatsSnapshot {
        self.with_stats(|s| s.snapshot())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::cache::clock::ManualClock;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        clock: Arc<ManualClock>,
        memory: Arc<MemoryStore>,
        manager: CacheManager,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::default());
        let memory = Arc::new(MemoryStore::new(1000, clock.clone()));
        let disk = DiskStore::new(dir.path(), clock.clone());
        let manager = CacheManager::new(memory.clone(), disk, clock.clone());
        Fixture {
            _dir: dir,
            clock,
            memory,
            manager,
        }
    }

    #[tokio::test]
    async fn test_set_then_get_static() {
        let f = fixture();
        let opts = SetOptions::new().policy(Policy::Static);
        assert!(f.manager.set(Category::Generic, "a", json!(1), opts).await);

        let calls = AtomicUsize::new(0);
        let value = f
            .manager
            .get_with(Category::Generic, "a", GetOptions::new(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!(99))
            })
            .await;
        assert_eq!(value, Some(json!(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disk_hit_is_promoted() {
        let f = fixture();
        let opts = SetOptions::new().level(StorageLevel::Disk);
        f.manager.set(Category::Geodata, "13004", json!("Arles"), opts).await;
        assert!(f.memory.is_empty());

        let value = f.manager.get(Category::Geodata, "13004", GetOptions::new()).await;
        assert_eq!(value, Some(json!("Arles")));
        assert_eq!(f.memory.len(), 1);

        let stats = f.manager.stats();
        assert_eq!(stats.disk_hits, 1);

        f.manager.get(Category::Geodata, "13004", GetOptions::new()).await;
        let stats = f.manager.stats();
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.hits, 2);
    }

    #[tokio::test]
    async fn test_pinned_level_does_not_cross_tiers() {
        let f = fixture();
        let opts = SetOptions::new().level(StorageLevel::Disk);
        f.manager.set(Category::Geodata, "1", json!(1), opts).await;

        let pinned = GetOptions::new().level(StorageLevel::Memory);
        assert_eq!(f.manager.get(Category::Geodata, "1", pinned).await, None);

        let pinned = GetOptions::new().level(StorageLevel::Disk);
        assert_eq!(f.manager.get(Category::Geodata, "1", pinned).await, Some(json!(1)));
        assert!(f.memory.is_empty(), "pinned disk read must not promote");
    }

    #[tokio::test]
    async fn test_refresh_failure_falls_back_to_stale() {
        let f = fixture();
        // Custom policy with no TTL: freshness comes from max_age metadata
        let opts = SetOptions::new()
            .policy(Policy::Custom)
            .meta("max_age", json!(60));
        f.manager.set(Category::Climate, "p", json!("old"), opts).await;
        f.clock.advance(Duration::seconds(120));

        let value = f
            .manager
            .get_with(Category::Climate, "p", GetOptions::new(), || async {
                Err(anyhow::anyhow!("upstream down"))
            })
            .await;
        assert_eq!(value, Some(json!("old")));

        let stats = f.manager.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.cache_errors, 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_without_entry_returns_default() {
        let f = fixture();
        let opts = GetOptions::new().default_value(json!("fallback"));
        let value = f
            .manager
            .get_with(Category::Generic, "x", opts, || async { Err(anyhow::anyhow!("boom")) })
            .await;
        assert_eq!(value, Some(json!("fallback")));
    }

    #[tokio::test]
    async fn test_null_refresh_is_not_written() {
        let f = fixture();
        let value = f
            .manager
            .get_with(Category::Generic, "x", GetOptions::new(), || async { Ok(Value::Null) })
            .await;
        assert_eq!(value, None);
        assert!(f.manager.peek(Category::Generic, "x", None).await.is_none());
    }

    #[tokio::test]
    async fn test_volatile_entries_skip_disk() {
        let f = fixture();
        let opts = SetOptions::new().policy(Policy::AlwaysFresh).ttl(60);
        f.manager.set(Category::ExternalApi, "q", json!(1), opts).await;
        assert!(f.manager.disk().is_empty().await);
        assert_eq!(f.memory.len(), 1);

        // The default always-fresh window is not below the threshold
        let opts = SetOptions::new().policy(Policy::AlwaysFresh);
        f.manager.set(Category::ExternalApi, "r", json!(1), opts).await;
        assert_eq!(f.manager.disk().len().await, 1);
    }

    #[tokio::test]
    async fn test_max_age_on_static_entry() {
        let f = fixture();
        let opts = SetOptions::new().policy(Policy::Static);
        f.manager.set(Category::Generic, "a", json!(1), opts).await;
        f.clock.advance(Duration::seconds(30));

        let opts = GetOptions::new().max_age(10);
        let value = f
            .manager
            .get_with(Category::Generic, "a", opts, || async { Ok(json!(2)) })
            .await;
        assert_eq!(value, Some(json!(2)));
        assert_eq!(f.manager.stats().cache_updates, 1);
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let f = fixture();
        f.manager.set(Category::Generic, "a", json!(1), SetOptions::new()).await;
        assert!(f.manager.delete(Category::Generic, "a", None).await);
        assert!(!f.manager.delete(Category::Generic, "a", None).await);
        assert_eq!(f.manager.get(Category::Generic, "a", GetOptions::new()).await, None);
    }

    #[tokio::test]
    async fn test_clear_older_than() {
        let f = fixture();
        f.manager.set(Category::Regulation, "old", json!(1), SetOptions::new()).await;
        f.clock.advance(Duration::hours(2));
        f.manager.set(Category::Regulation, "new", json!(2), SetOptions::new()).await;

        assert_eq!(f.manager.clear(Some(Category::Regulation), Some(3600)).await, 1);
        assert!(f.manager.peek(Category::Regulation, "old", None).await.is_none());
        assert!(f.manager.peek(Category::Regulation, "new", None).await.is_some());
    }

    #[tokio::test]
    async fn test_clear_everything() {
        let f = fixture();
        f.manager.set(Category::Regulation, "a", json!(1), SetOptions::new()).await;
        f.manager.set(Category::Climate, "b", json!(2), SetOptions::new()).await;

        assert_eq!(f.manager.clear(None, None).await, 2);
        assert!(f.memory.is_empty());
        assert!(f.manager.disk().is_empty().await);
    }

    #[tokio::test]
    async fn test_preload_tags_and_counts() {
        let f = fixture();
        let loaded = f
            .manager
            .preload(
                Category::Subsidy,
                || async {
                    Ok(LoadedData::from([
                        ("pac-1".to_string(), json!(120.5)),
                        ("pac-2".to_string(), json!(80.0)),
                    ]))
                },
                Policy::Weekly,
            )
            .await;
        assert_eq!(loaded, 2);

        let entry = f.manager.peek(Category::Subsidy, "pac-1", None).await.unwrap();
        assert_eq!(entry.metadata[PRELOADED_FIELD], json!(true));
        assert_eq!(entry.policy, Policy::Weekly);
    }

    #[tokio::test]
    async fn test_preload_failure_yields_zero() {
        let f = fixture();
        let loaded = f
            .manager
            .preload(
                Category::Subsidy,
                || async { Err(anyhow::anyhow!("service unavailable")) },
                Policy::Weekly,
            )
            .await;
        assert_eq!(loaded, 0);
        assert_eq!(f.manager.stats().cache_errors, 1);
    }

    #[tokio::test]
    async fn test_warmup_skips_unregistered_and_failing() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::default());
        let memory = Arc::new(MemoryStore::new(1000, clock.clone()));
        let disk = DiskStore::new(dir.path(), clock.clone());

        let mut loaders = LoaderRegistry::new();
        loaders.register(Category::Regulation, || async {
            Ok(LoadedData::from([("zone-a".to_string(), json!({"nitrate": true}))]))
        });
        loaders.register(Category::Climate, || async { Err(anyhow::anyhow!("timeout")) });
        loaders.register(Category::Geodata, || async {
            Ok(LoadedData::from([
                ("13097".to_string(), json!({"name": "Saint-Martin-de-Crau"})),
                ("13004".to_string(), json!({"name": "Arles"})),
            ]))
        });

        let manager = CacheManager::new(memory, disk, clock).with_loaders(loaders);
        assert_eq!(manager.warmup(None).await, 3);

        let entry = manager.peek(Category::Geodata, "13097", None).await.unwrap();
        assert_eq!(entry.policy, Policy::Monthly);

        assert_eq!(manager.warmup(Some(&[Category::Regulation])).await, 1);
    }

    #[tokio::test]
    async fn test_from_config_warms_up_from_seed_dir() {
        let cache_dir = TempDir::new().unwrap();
        let seed_dir = TempDir::new().unwrap();
        tokio::fs::write(
            seed_dir.path().join("subsidy.json"),
            br#"{"eco-regime": {"amount": 80}}"#,
        )
        .await
        .unwrap();

        let config = Config {
            cache_dir: cache_dir.path().to_path_buf(),
            seed_dir: Some(seed_dir.path().to_path_buf()),
            ..Config::default()
        };
        let manager = CacheManager::from_config(&config);
        assert_eq!(manager.warmup(None).await, 1);

        let entry = manager.peek(Category::Subsidy, "eco-regime", None).await.unwrap();
        assert_eq!(entry.policy, Policy::Weekly);
        assert_eq!(entry.metadata[PRELOADED_FIELD], json!(true));
    }

    #[tokio::test]
    async fn test_get_as_type_mismatch_is_miss() {
        let f = fixture();
        f.manager.set(Category::Generic, "a", json!("text"), SetOptions::new()).await;
        let typed: Option<u32> = f.manager.get_as(Category::Generic, "a", GetOptions::new()).await;
        assert!(typed.is_none());
        assert_eq!(f.manager.stats().cache_errors, 1);

        f.manager.set_value(Category::Generic, "b", &vec![1, 2], SetOptions::new()).await;
        let typed: Option<Vec<u32>> = f.manager.get_as(Category::Generic, "b", GetOptions::new()).await;
        assert_eq!(typed, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_database_level_is_reserved() {
        let f = fixture();
        let opts = SetOptions::new().level(StorageLevel::Database);
        assert!(!f.manager.set(Category::Generic, "a", json!(1), opts).await);
        let opts = GetOptions::new().level(StorageLevel::Database);
        assert_eq!(f.manager.get(Category::Generic, "a", opts).await, None);
    }

    #[tokio::test]
    async fn test_ttl_beyond_calendar_means_no_expiry() {
        let f = fixture();
        let opts = SetOptions::new().ttl(10_000_000_000_000);
        assert!(f.manager.set(Category::Generic, "far", json!(1), opts).await);

        let entry = f.manager.peek(Category::Generic, "far", None).await.unwrap();
        assert_eq!(entry.expires_at, None);
        f.clock.advance(Duration::days(3650));
        let value = f
            .manager
            .get(Category::Generic, "far", GetOptions::new().policy(Policy::Static))
            .await;
        assert_eq!(value, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_clear_with_unrepresentable_age_removes_nothing() {
        let f = fixture();
        f.manager.set(Category::Climate, "a", json!(1), SetOptions::new()).await;

        assert_eq!(f.manager.clear(Some(Category::Climate), Some(i64::MAX as u64)).await, 0);
        assert_eq!(f.manager.clear(Some(Category::Climate), Some(u64::MAX)).await, 0);
        assert!(f.manager.peek(Category::Climate, "a", None).await.is_some());
    }

    #[tokio::test]
    async fn test_huge_max_age_keeps_entry_fresh() {
        let f = fixture();
        let opts = SetOptions::new().policy(Policy::Static);
        f.manager.set(Category::Generic, "s", json!("v"), opts).await;

        let opts = GetOptions::new().max_age(u64::MAX);
        assert_eq!(f.manager.get(Category::Generic, "s", opts).await, Some(json!("v")));
        assert_eq!(f.manager.stats().hits, 1);
    }
}
