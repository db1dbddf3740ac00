//! Request handlers

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::inference::ClassificationResponse;
use crate::monitoring::InferenceStats;
use crate::preprocessing::RawImage;

use super::error::{Result, ServerError};
use super::state::AppState;

const FILE_FIELD: &str = "file";

fn upload_error(err: MultipartError) -> ServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge(err.body_text())
    } else {
        ServerError::BadRequest(err.body_text())
    }
}

/// Classify one uploaded image
pub async fn classify(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ClassificationResponse>> {
    state.metrics().record_request();

    let Some(pipeline) = state.pipeline() else {
        return Err(ServerError::Unavailable(
            state.load_error().unwrap_or("model not loaded").to_string(),
        ));
    };

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(FILE_FIELD) && field.file_name().is_none() {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(upload_error)?;

        info!(
            file_name = file_name.as_deref().unwrap_or("unknown"),
            content_type = %content_type,
            size_bytes = data.len(),
            "Received image"
        );

        let mut raw = RawImage::new(data.to_vec(), content_type);
        if let Some(name) = file_name {
            raw = raw.with_filename(name);
        }

        let result = pipeline.classify_upload(raw).await?;
        return Ok(Json(result.to_response()));
    }

    Err(ServerError::BadRequest("No file uploaded".to_string()))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "model_loaded": state.is_ready(),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
    }))
}

/// 200 once the model is loaded, 503 otherwise
pub async fn readiness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.is_ready() {
        (StatusCode::OK, Json(json!({ "ready": true })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "ready": false,
                "reason": state.load_error().unwrap_or("model not loaded"),
            })),
        )
    }
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<InferenceStats> {
    Json(state.metrics().snapshot())
}
