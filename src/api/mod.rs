//! API Module
//!
//! Admin HTTP surface over the cache manager: inspection, invalidation,
//! warmup, sweep and statistics.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
