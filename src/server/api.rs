//! API route definitions

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::warn;

use super::{handlers, state::AppState};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "message": "Not found. POST an image to /api or check /health.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": true,
            "message": "Method not allowed.",
        })),
    )
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.map(str::trim) {
        Some(origin) if !origin.is_empty() && origin != "*" => match origin.parse::<HeaderValue>() {
            Ok(value) => layer.allow_origin(value),
            Err(_) => {
                warn!(origin = %origin, "Invalid CORS_ORIGIN, allowing all origins");
                layer.allow_origin(Any)
            }
        },
        _ => layer.allow_origin(Any),
    }
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_upload_size = state.config.max_upload_size;
    let cors = cors_layer(state.config.cors_origin.as_deref());

    Router::new()
        .route("/api", post(handlers::classify))
        .route("/api/stats", get(handlers::get_stats))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
