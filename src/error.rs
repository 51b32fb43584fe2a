use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },

    #[error("Storage read error: {0}")]
    StorageRead(String),

    #[error("Storage write error: {0}")]
    StorageWrite(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::StorageRead(_) | AppError::StorageWrite(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            AppError::Validation { field, reason } => {
                tracing::warn!("Validation error: {} {}", field, reason);
                json!({ "error": format!("{} {}", field, reason), "field": field })
            }
            AppError::StorageRead(msg) => {
                tracing::error!("Storage read error: {}", msg);
                json!({ "error": "Failed to read stored records" })
            }
            AppError::StorageWrite(msg) => {
                tracing::error!("Storage write error: {}", msg);
                json!({ "error": "Failed to save record" })
            }
            AppError::NotFound(msg) => json!({ "error": msg }),
            AppError::PayloadTooLarge(msg) => {
                tracing::warn!("Payload too large: {}", msg);
                json!({ "error": msg })
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                json!({ "error": msg })
            }
        };

        (status, Json(body)).into_response()
    }
}

// Malformed bodies are reported like any other validation failure
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(rejection.body_text())
        } else {
            AppError::validation("body", rejection.body_text())
        }
    }
}
