//! Memoization Module
//!
//! Call-level caching on top of the cache manager: wrapped operations,
//! per-instance cached properties and chunked bulk loading.

mod batch;
mod property;
mod wrapper;

pub use batch::{BatchLoader, BATCH_LOADED_FIELD, DEFAULT_BATCH_SIZE};
pub use property::{CachedProperty, InstanceId};
pub use wrapper::{reduce_arg, CacheOptions, CallArg, CallArgs, IdentifierRule, Memoized, UNHASHABLE};
