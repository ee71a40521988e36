//! Cache Entry Module
//!
//! Defines the value envelope stored in every tier, with its timing and provenance.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::clock::after_seconds;
use super::key::Category;

// == Policy ==
/// Freshness rule governing how long a value is trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Stale immediately, but still written with a short grace TTL
    AlwaysFresh,
    #[default]
    Daily,
    Weekly,
    Monthly,
    /// Never expires on its own
    Static,
    /// Max age read from the entry's `max_age` metadata
    Custom,
}

// == Storage Level ==
/// Tier an entry was last persisted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageLevel {
    Memory,
    Disk,
    /// Reserved; no database tier is wired in
    Database,
}

// == Cache Entry ==
/// A cached payload with creation time, optional absolute expiry and provenance.
///
/// Entries are never edited in place once stored; a new `set` replaces them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    /// None = no absolute expiry
    pub expires_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub category: Category,
    pub policy: Policy,
    pub storage_level: StorageLevel,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Entry {
    // == Constructor ==
    /// Creates an entry created at `now` expiring `ttl_seconds` later (if any).
    /// A TTL reaching past the representable range means no expiry.
    pub fn new(
        payload: Value,
        category: Category,
        policy: Policy,
        now: DateTime<Utc>,
        ttl_seconds: Option<u64>,
    ) -> Self {
        Self {
            payload,
            created_at: now,
            expires_at: ttl_seconds.and_then(|ttl| after_seconds(now, ttl)),
            source: None,
            category,
            policy,
            storage_level: StorageLevel::Memory,
            metadata: Map::new(),
        }
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Copy of this entry tagged with another storage level.
    pub fn at_level(&self, level: StorageLevel) -> Self {
        let mut copy = self.clone();
        copy.storage_level = level;
        copy
    }

    // == Is Expired ==
    /// True once `now` is strictly past `expires_at`. Entries without an
    /// absolute expiry never expire here, whatever their policy.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now > expires,
            None => false,
        }
    }

    /// Time elapsed since creation.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// Remaining whole seconds before expiry; `Some(0)` once expired, `None` without expiry.
    pub fn ttl_remaining(&self, now: DateTime<Utc>) -> Option<u64> {
        self.expires_at
            .map(|expires| (expires - now).num_seconds().max(0) as u64)
    }
}
