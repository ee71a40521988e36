//! API Routes
//!
//! Configures the Axum router with all admin endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_all_handler, clear_category_handler, delete_entry_handler, get_entry_handler,
    health_handler, stats_handler, sweep_handler, warmup_handler, AppState,
};

/// Creates the admin router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check
/// - `GET /stats` - Cache statistics snapshot
/// - `GET /entries/:category/:identifier` - Inspect a stored entry
/// - `DELETE /entries/:category/:identifier` - Delete an entry from every tier
/// - `DELETE /entries` - Clear every tier
/// - `DELETE /categories/:category` - Clear a category (`?older_than=SECS`)
/// - `POST /warmup` - Preload categories through registered loaders
/// - `POST /sweep` - Remove expired disk entries now
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/entries", delete(clear_all_handler))
        .route(
            "/entries/:category/:identifier",
            get(get_entry_handler).delete(delete_entry_handler),
        )
        .route("/categories/:category", delete(clear_category_handler))
        .route("/warmup", post(warmup_handler))
        .route("/sweep", post(sweep_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
