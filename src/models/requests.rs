//! Request DTOs for the admin API
//!
//! Defines the structure of incoming query strings and request bodies.

use serde::Deserialize;

use crate::cache::Category;

/// Query string of `DELETE /categories/:category`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearQuery {
    /// Only remove entries older than this many seconds
    #[serde(default)]
    pub older_than: Option<u64>,
}

/// Request body of `POST /warmup`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WarmupRequest {
    /// Categories to warm up; the default slow-changing set if absent
    #[serde(default)]
    pub categories: Option<Vec<Category>>,
}
