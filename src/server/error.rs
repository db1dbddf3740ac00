//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::ClassifierError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ClassifierError> for ServerError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::InvalidInput(msg) => ServerError::BadRequest(msg),
            ClassifierError::ModelUnavailable(msg) => ServerError::Unavailable(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            ServerError::Unavailable(msg) => {
                tracing::warn!(detail = %msg, "Classification requested while model unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "Model not loaded".to_string())
            }
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Error processing image".to_string())
            }
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ClassifierError::InvalidInput("not an image".into()), StatusCode::BAD_REQUEST),
            (ClassifierError::ModelUnavailable("missing".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ClassifierError::InferenceError("shape".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ClassifierError::LoggingFailure("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_internal_detail_not_leaked() {
        let response =
            ServerError::from(ClassifierError::InferenceError("tensor [1,8,8,3] vs secret".into()))
                .into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["error"], true);
        assert_eq!(json["message"], "Error processing image");
    }
}
