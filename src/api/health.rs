//! Health check endpoint

use axum::{Router, routing::get};

/// Liveness probe for load balancers and container orchestration
async fn health() -> &'static str {
    "OK"
}

/// Build health router (no state, never authenticated)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}
