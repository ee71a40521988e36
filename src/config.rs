//! Configuration Module
//!
//! Handles loading cache and server configuration from environment variables.

use std::env;
use std::path::PathBuf;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the disk tier
    pub cache_dir: PathBuf,
    /// Seconds between two sweeps of the disk tier
    pub sweep_interval: u64,
    /// Seconds to wait after a failed sweep before retrying
    pub sweep_backoff: u64,
    /// Upper bound on memory-tier entries
    pub memory_max_entries: usize,
    /// Volatile entries with less remaining TTL than this skip the disk tier
    pub disk_min_ttl: u64,
    /// Admin HTTP port
    pub server_port: u16,
    /// Run category warmup right after startup
    pub warmup_on_start: bool,
    /// Directory of `<category>.json` seed files used as warmup loaders
    pub seed_dir: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DIR` - Disk tier directory (default: .cache/terroir)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds (default: 900)
    /// - `SWEEP_BACKOFF` - Retry delay after a failed sweep (default: 60)
    /// - `MEMORY_MAX_ENTRIES` - Memory tier capacity (default: 10000)
    /// - `DISK_MIN_TTL` - Minimum remaining TTL for volatile disk writes (default: 300)
    /// - `SERVER_PORT` - Admin HTTP port (default: 3000)
    /// - `WARMUP_ON_START` - `true`/`1` to preload slow-changing categories (default: false)
    /// - `SEED_DIR` - Directory of per-category JSON seed files for warmup (default: none)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_dir: env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            sweep_interval: parse_var("SWEEP_INTERVAL").unwrap_or(defaults.sweep_interval),
            sweep_backoff: parse_var("SWEEP_BACKOFF").unwrap_or(defaults.sweep_backoff),
            memory_max_entries: parse_var("MEMORY_MAX_ENTRIES")
                .unwrap_or(defaults.memory_max_entries),
            disk_min_ttl: parse_var("DISK_MIN_TTL").unwrap_or(defaults.disk_min_ttl),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            warmup_on_start: env::var("WARMUP_ON_START")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.warmup_on_start),
            seed_dir: env::var("SEED_DIR").ok().map(PathBuf::from).or(defaults.seed_dir),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".cache/terroir"),
            sweep_interval: 900,
            sweep_backoff: 60,
            memory_max_entries: 10_000,
            disk_min_ttl: 300,
            server_port: 3000,
            warmup_on_start: false,
            seed_dir: None,
        }
    }
}
