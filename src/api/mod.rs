//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - News list, search, detail and editing
//! - Category catalogue, listings and subscriptions
//! - Registration, login and sessions
//! - Health check

pub mod auth;
pub mod categories;
pub mod middleware;
pub mod news;

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (need a session)
    let protected_routes = Router::new()
        .nest("/news", news::protected_router())
        .nest("/categories", categories::protected_router())
        .nest("/auth", auth::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes (identity attached when present)
    Router::new()
        .nest("/news", news::public_router())
        .nest("/categories", categories::public_router())
        .nest("/auth", auth::public_router())
        .route("/health", get(health))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ))
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;

    // cookie sessions need an explicit origin with credentials
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.pool.ping().await.map_err(|e| {
        tracing::error!(error = %e, "Health check failed");
        ApiError::unavailable("Database unavailable")
    })?;
    Ok(Json(json!({ "status": "ok" })))
}
