//! Memory Tier Module
//!
//! The fast, volatile tier: a `FastStore` contract plus a HashMap-backed implementation
//! with native TTL support.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::clock::{after_seconds, SharedClock};
use super::entry::Entry;

// == Fast Store Contract ==
/// Volatile key/value tier with per-key TTL.
///
/// Implementations must be safe for concurrent use; the manager never holds
/// its own lock while calling into a tier.
pub trait FastStore: Send + Sync {
    /// Stores `entry` under `key`, expiring after `ttl_seconds` if given.
    fn store(&self, key: &str, entry: Entry, ttl_seconds: Option<u64>) -> bool;

    /// Returns the live entry for `key`, if any.
    fn retrieve(&self, key: &str) -> Option<Entry>;

    /// Removes `key`; true if something was removed.
    fn remove(&self, key: &str) -> bool;

    /// Keys matching a glob pattern (`*` as trailing wildcard).
    fn list_keys(&self, pattern: &str) -> Vec<String>;

    /// Drops every key.
    fn clear_all(&self) -> bool;
}

/// Returns true if `key` matches `pattern`, where `*` is a trailing wildcard.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => pattern == key,
    }
}

#[derive(Debug, Clone)]
struct Slot {
    entry: Entry,
    expires_at: Option<DateTime<Utc>>,
}

impl Slot {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires) if now > expires)
    }
}

// == Memory Store ==
/// In-process `FastStore` backed by a HashMap.
///
/// No eviction policy: when full, expired slots are purged and, failing
/// that, new keys are refused.
pub struct MemoryStore {
    slots: RwLock<HashMap<String, Slot>>,
    max_entries: usize,
    clock: SharedClock,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a new MemoryStore holding at most `max_entries` keys.
    pub fn new(max_entries: usize, clock: SharedClock) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            max_entries,
            clock,
        }
    }

    // == Cleanup Expired ==
    /// Removes all expired slots. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        let before = slots.len();
        slots.retain(|_, slot| !slot.is_expired(now));
        before - slots.len()
    }

    // == Length ==
    /// Number of slots, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FastStore for MemoryStore {
    fn store(&self, key: &str, entry: Entry, ttl_seconds: Option<u64>) -> bool {
        let now = self.clock.now();
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());

        if !slots.contains_key(key) && slots.len() >= self.max_entries {
            slots.retain(|_, slot| !slot.is_expired(now));
            if slots.len() >= self.max_entries {
                warn!("Memory tier full ({} entries), not storing {}", slots.len(), key);
                return false;
            }
        }

        let expires_at = ttl_seconds.and_then(|ttl| after_seconds(now, ttl));
        slots.insert(key.to_string(), Slot { entry, expires_at });
        true
    }

    fn retrieve(&self, key: &str) -> Option<Entry> {
        let now = self.clock.now();
        {
            let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
            match slots.get(key) {
                None => return None,
                Some(slot) if !slot.is_expired(now) => return Some(slot.entry.clone()),
                Some(_) => {}
            }
        }
        // Expired: drop it
        self.slots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        None
    }

    fn remove(&self, key: &str) -> bool {
        self.slots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .is_some()
    }

    fn list_keys(&self, pattern: &str) -> Vec<String> {
        let now = self.clock.now();
        self.slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(key, slot)| !slot.is_expired(now) && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn clear_all(&self) -> bool {
        self.slots.write().unwrap_or_else(|e| e.into_inner()).clear();
        true
    }
}
