//! Cache Module
//!
//! Two-tier caching: a volatile memory tier in front of a durable disk tier,
//! with freshness policies, stable key derivation and running statistics.

mod clock;
mod disk;
mod entry;
mod freshness;
mod key;
mod loaders;
mod manager;
mod memory;
mod stats;


// Re-export public types
pub use clock::{after_seconds, seconds_span, Clock, ManualClock, SharedClock, SystemClock};
pub use disk::{DiskStore, CACHE_KEY_FIELD};
pub use entry::{Entry, Policy, StorageLevel};
pub use freshness::{
    Freshness, ALWAYS_FRESH_TTL, DAILY_TTL, MAX_AGE_FIELD, MONTHLY_TTL, WEEKLY_TTL,
};
pub use key::{hex_digest, Category, KeyCodec, Params, ParsedKey, KEY_PREFIX, PARAM_HASH_LEN};
pub use loaders::{default_policy, LoadedData, Loader, LoaderFuture, LoaderRegistry, DEFAULT_WARMUP};
pub use manager::{CacheManager, GetOptions, SetOptions, PRELOADED_FIELD};
pub use memory::{glob_match, FastStore, MemoryStore};
pub use stats::{CacheStats, StatsSnapshot};
