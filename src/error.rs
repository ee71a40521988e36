//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the caching layer.
///
/// Only `MalformedKey` ever reaches a library caller; the other variants are
/// produced inside the tiers, logged, and turned into a miss or a no-op.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key does not follow the `cache:<category>:<identifier>[:<hash>]` layout
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// Entry could not be (de)serialized
    #[error("Serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Disk tier I/O failed
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Caller-supplied recompute callback failed
    #[error("Refresh failed for {key}: {reason}")]
    RefreshFailure { key: String, reason: String },

    /// Bulk loader failed
    #[error("Loader failed for category {category}: {reason}")]
    LoaderFailure { category: String, reason: String },

    /// Nothing cached under the requested key (admin API only)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data (admin API only)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::MalformedKey(_) | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Serialization(_)
            | CacheError::Io(_)
            | CacheError::RefreshFailure { .. }
            | CacheError::LoaderFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
