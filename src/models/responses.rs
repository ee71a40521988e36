//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::Entry;

/// Response body of `GET /entries/:category/:identifier`
#[derive(Debug, Clone, Serialize)]
pub struct EntryResponse {
    /// The cache key the entry lives under
    pub key: String,
    /// The stored entry, payload and provenance
    pub entry: Entry,
}

impl EntryResponse {
    pub fn new(key: impl Into<String>, entry: Entry) -> Self {
        Self {
            key: key.into(),
            entry,
        }
    }
}

/// Response body of `DELETE /entries/:category/:identifier`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body of the clear endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    /// Cleared category, or "all"
    pub scope: String,
    /// Number of keys removed
    pub removed: usize,
}

/// Response body of `POST /warmup`
#[derive(Debug, Clone, Serialize)]
pub struct WarmupResponse {
    /// Number of entries preloaded
    pub loaded: usize,
}

/// Response body of `POST /sweep`
#[derive(Debug, Clone, Serialize)]
pub struct SweepResponse {
    /// Number of expired disk entries removed
    pub removed: usize,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
