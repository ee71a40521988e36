//! Batch Loader
//!
//! Bulk-seeds the cache from a large external source in fixed-size chunks.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheManager, Category, Policy, SetOptions};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Metadata flag set on entries written by a batch loader.
pub const BATCH_LOADED_FIELD: &str = "batch_loaded";

pub struct BatchLoader {
    manager: Arc<CacheManager>,
    category: Category,
    policy: Policy,
    batch_size: usize,
    total_loaded: usize,
}

impl BatchLoader {
    pub fn new(manager: Arc<CacheManager>, category: Category, policy: Policy) -> Self {
        Self {
            manager,
            category,
            policy,
            batch_size: DEFAULT_BATCH_SIZE,
            total_loaded: 0,
        }
    }

    /// Sets the chunk size (at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Entries written over the lifetime of this loader.
    pub fn total_loaded(&self) -> usize {
        self.total_loaded
    }

    /// Writes `(identifier, value)` pairs chunk by chunk; the source is only
    /// pulled one chunk ahead. Returns the number written by this call.
    pub async fn load<I, K, V>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: ToString,
        V: Serialize,
    {
        let mut items = items.into_iter();
        let mut loaded = 0;
        let mut chunk_no = 0;

        loop {
            let chunk: Vec<(K, V)> = items.by_ref().take(self.batch_size).collect();
            if chunk.is_empty() {
                break;
            }
            chunk_no += 1;
            let size = chunk.len();
            let written = self.write_chunk(chunk).await;
            if written < size {
                warn!(
                    "Batch {} for {}: {} of {} entries not written",
                    chunk_no,
                    self.category,
                    size - written,
                    size
                );
            }
            loaded += written;
            self.total_loaded += written;
            debug!(
                "Batch {} for {}: {} written, {} total",
                chunk_no, self.category, written, self.total_loaded
            );
            tokio::task::yield_now().await;
        }

        info!("Batch-loaded {} entries into {}", loaded, self.category);
        loaded
    }

    async fn write_chunk<K: ToString, V: Serialize>(&self, chunk: Vec<(K, V)>) -> usize {
        let mut written = 0;
        for (identifier, value) in chunk {
            let opts = SetOptions::new()
                .policy(self.policy)
                .meta(BATCH_LOADED_FIELD, Value::Bool(true));
            if self
                .manager
                .set_value(self.category, &identifier.to_string(), &value, opts)
                .await
            {
                written += 1;
            }
        }
        written
    }
}
