//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::cache::{CacheManager, Category, KeyCodec, StatsSnapshot};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearQuery, ClearResponse, DeleteResponse, EntryResponse, HealthResponse, SweepResponse,
    WarmupRequest, WarmupResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The process-wide cache manager
    pub manager: Arc<CacheManager>,
}

impl AppState {
    pub fn new(manager: Arc<CacheManager>) -> Self {
        Self { manager }
    }

    /// Creates state with a manager built from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(CacheManager::from_config(config)))
    }
}

fn parse_category(raw: &str) -> Result<Category> {
    raw.parse()
}

/// Handler for GET /entries/:category/:identifier
///
/// Returns the stored entry without counting a hit or miss.
pub async fn get_entry_handler(
    State(state): State<AppState>,
    Path((category, identifier)): Path<(String, String)>,
) -> Result<Json<EntryResponse>> {
    let category = parse_category(&category)?;
    let key = KeyCodec::build(category, &identifier, None);
    let entry = state
        .manager
        .peek(category, &identifier, None)
        .await
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(EntryResponse::new(key, entry)))
}

/// Handler for DELETE /entries/:category/:identifier
pub async fn delete_entry_handler(
    State(state): State<AppState>,
    Path((category, identifier)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    let category = parse_category(&category)?;
    let key = KeyCodec::build(category, &identifier, None);
    if !state.manager.delete(category, &identifier, None).await {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /entries
///
/// Clears every tier.
pub async fn clear_all_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.manager.clear(None, None).await;
    Json(ClearResponse {
        scope: "all".to_string(),
        removed,
    })
}

/// Handler for DELETE /categories/:category
///
/// Clears one category, optionally only entries older than `older_than` seconds.
pub async fn clear_category_handler(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<ClearQuery>,
) -> Result<Json<ClearResponse>> {
    let category = parse_category(&category)?;
    let removed = state.manager.clear(Some(category), query.older_than).await;

    Ok(Json(ClearResponse {
        scope: category.to_string(),
        removed,
    }))
}

/// Handler for POST /warmup
pub async fn warmup_handler(
    State(state): State<AppState>,
    body: Option<Json<WarmupRequest>>,
) -> Json<WarmupResponse> {
    let categories = body.and_then(|Json(req)| req.categories);
    let loaded = state.manager.warmup(categories.as_deref()).await;
    Json(WarmupResponse { loaded })
}

/// Handler for POST /sweep
pub async fn sweep_handler(State(state): State<AppState>) -> Result<Json<SweepResponse>> {
    let removed = state.manager.sweep().await?;
    Ok(Json(SweepResponse { removed }))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.manager.stats())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DiskStore, ManualClock, MemoryStore, SetOptions};
    use serde_json::json;
    use tempfile::TempDir;

    fn state() -> (TempDir, AppState) {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::default());
        let manager = CacheManager::new(
            Arc::new(MemoryStore::new(100, clock.clone())),
            DiskStore::new(dir.path(), clock.clone()),
            clock,
        );
        (dir, AppState::new(Arc::new(manager)))
    }

    fn path(category: &str, identifier: &str) -> Path<(String, String)> {
        Path((category.to_string(), identifier.to_string()))
    }

    #[tokio::test]
    async fn test_get_entry_handler() {
        let (_dir, state) = state();
        state
            .manager
            .set(Category::Geodata, "13097", json!({"name": "Saint-Martin-de-Crau"}), SetOptions::new())
            .await;

        let response = get_entry_handler(State(state.clone()), path("geodata", "13097"))
            .await
            .unwrap();
        assert_eq!(response.key, "cache:geodata:13097");
        assert_eq!(response.entry.payload["name"], "Saint-Martin-de-Crau");

        // Inspection does not count as a lookup
        assert_eq!(state.manager.stats().hits, 0);
    }

    #[tokio::test]
    async fn test_get_entry_not_found() {
        let (_dir, state) = state();
        let result = get_entry_handler(State(state), path("geodata", "nope")).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_category() {
        let (_dir, state) = state();
        let result = get_entry_handler(State(state), path("weather", "1")).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_delete_entry_handler() {
        let (_dir, state) = state();
        state
            .manager
            .set(Category::Climate, "p1", json!(1), SetOptions::new())
            .await;

        assert!(delete_entry_handler(State(state.clone()), path("climate", "p1")).await.is_ok());
        let again = delete_entry_handler(State(state), path("climate", "p1")).await;
        assert!(matches!(again, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_clear_category_handler() {
        let (_dir, state) = state();
        state.manager.set(Category::Climate, "a", json!(1), SetOptions::new()).await;
        state.manager.set(Category::Geodata, "b", json!(2), SetOptions::new()).await;

        let response = clear_category_handler(
            State(state.clone()),
            Path("climate".to_string()),
            Query(ClearQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(response.removed, 1);
        assert_eq!(response.scope, "climate");
    }

    #[tokio::test]
    async fn test_warmup_without_loaders() {
        let (_dir, state) = state();
        let response = warmup_handler(State(state), None).await;
        assert_eq!(response.loaded, 0);
    }

    #[tokio::test]
    async fn test_sweep_handler() {
        let (_dir, state) = state();
        let response = sweep_handler(State(state)).await.unwrap();
        assert_eq!(response.removed, 0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
