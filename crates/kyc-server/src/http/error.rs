//! Error mapping for the axum surface.
//!
//! Missing required parameters are 400, unknown codes are 404, downstream
//! failures are 500. Bodies are always `{error, message}` JSON.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use kyc_rag::RagError;

pub struct AppError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "bad_request",
            message: message.into(),
        }
    }
}

impl From<RagError> for AppError {
    fn from(e: RagError) -> Self {
        let (status, kind) = match &e {
            RagError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            RagError::NoEmbedding(_) => (StatusCode::NOT_FOUND, "no_embedding"),
            RagError::MissingFeedbackTarget => (StatusCode::BAD_REQUEST, "bad_request"),
            RagError::Embedding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "embedding_error"),
            RagError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        Self {
            status,
            kind,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("request failed: {}", self.message);
        } else {
            warn!("client error: {}", self.message);
        }
        let body = json!({
            "error": self.kind,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}
