//! Terroir Cache - two-tier caching for slow external data
//!
//! A memory tier in front of a durable disk tier, with per-category freshness
//! policies, deterministic key derivation, running statistics, call
//! memoization and a small admin HTTP API.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod memoize;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheManager, Category, GetOptions, KeyCodec, Policy, SetOptions, StorageLevel};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_sweep_task;
