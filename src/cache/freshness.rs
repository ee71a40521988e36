//! Freshness Evaluator
//!
//! Decides whether an entry may still be served and maps policies to TTLs.

use chrono::{DateTime, Utc};

use super::clock::seconds_span;
use super::entry::{Entry, Policy};

/// Grace window written for `AlwaysFresh` entries.
pub const ALWAYS_FRESH_TTL: u64 = 300;
pub const DAILY_TTL: u64 = 86_400;
pub const WEEKLY_TTL: u64 = 604_800;
pub const MONTHLY_TTL: u64 = 2_592_000;

/// Metadata field read by the `Custom` policy, in seconds.
pub const MAX_AGE_FIELD: &str = "max_age";

pub struct Freshness;

impl Freshness {
    /// Returns whether `entry` is still valid at `now`.
    ///
    /// Resolution order:
    /// 1. an absolute `expires_at` decides alone;
    /// 2. otherwise an explicit `max_age` (seconds) bounds the age;
    /// 3. otherwise `policy`, falling back to the entry's own policy.
    pub fn is_valid(
        entry: &Entry,
        policy: Option<Policy>,
        max_age: Option<u64>,
        now: DateTime<Utc>,
    ) -> bool {
        if entry.expires_at.is_some() {
            return !entry.is_expired(now);
        }

        let age = entry.age(now);
        if let Some(max_age) = max_age {
            return seconds_span(max_age).map_or(true, |limit| age <= limit);
        }

        match policy.unwrap_or(entry.policy) {
            Policy::AlwaysFresh => false,
            Policy::Static => true,
            Policy::Custom => match entry.metadata.get(MAX_AGE_FIELD).and_then(|v| v.as_f64()) {
                Some(max_age) => age.num_milliseconds() as f64 <= max_age * 1000.0,
                None => true,
            },
            fixed => match Self::ttl_for(fixed, None) {
                Some(ttl) => seconds_span(ttl).map_or(true, |limit| age <= limit),
                None => true,
            },
        }
    }

    /// Time-to-live in seconds for `policy`; `None` means no expiry.
    pub fn ttl_for(policy: Policy, custom_ttl: Option<u64>) -> Option<u64> {
        match policy {
            Policy::AlwaysFresh => Some(ALWAYS_FRESH_TTL),
            Policy::Daily => Some(DAILY_TTL),
            Policy::Weekly => Some(WEEKLY_TTL),
            Policy::Monthly => Some(MONTHLY_TTL),
            Policy::Static => None,
            Policy::Custom => custom_ttl,
        }
    }
}
