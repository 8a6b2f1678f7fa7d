//! Router configuration - centralized route definitions
//!
//! Routes are split into public (health, metrics) and protected (insight
//! API). Protected handlers authenticate through the `Educator` extractor
//! in their signatures, so a route is protected exactly when its handler
//! names the caller.

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use super::state::ServiceState;
use super::{health, insights, students};

/// Application state type alias
pub type AppState = Arc<ServiceState>;

/// Build the public routes (no authentication required)
///
/// These must always be accessible for health checks (Kubernetes probes)
/// and metrics (Prometheus scraping).
pub fn build_public_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::health_live))
        .route("/health/ready", get(health::health_ready))
        .route("/metrics", get(health::metrics_endpoint))
        .with_state(state)
}

/// Build the protected API routes (bearer token required)
pub fn build_protected_routes(state: AppState) -> Router {
    Router::new()
        // =================================================================
        // INSIGHTS
        // =================================================================
        .route(
            "/api/insights/{student_id}",
            get(insights::list_insights),
        )
        .route(
            "/api/insights/{student_id}",
            post(insights::generate_insight),
        )
        // =================================================================
        // STUDENT DIRECTORY (INGEST SEAM)
        // =================================================================
        .route(
            "/api/students/{student_id}",
            put(students::upsert_student),
        )
        .with_state(state)
}

/// Build the complete router with both public and protected routes
pub fn build_router(state: AppState) -> Router {
    let public = build_public_routes(state.clone());
    let protected = build_protected_routes(state);

    Router::new().merge(public).merge(protected)
}
