//! Error handling
//!
//! `ServiceError` is what the pipeline returns; `AppError` is what the
//! transport sends back. Every `ServiceError` maps to exactly one `AppError`.

use axum::{
    extract::multipart::MultipartError,
    extract::{multipart::MultipartRejection, rejection::JsonRejection},
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::classifier::{DecodeError, InferenceError};

pub type AppResult<T> = Result<T, AppError>;

/// Errors produced by the classification and recommendation pipelines
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The classifier failed to initialize
    #[error("{0}")]
    ModelUnavailable(String),

    /// The knowledge store failed to open at startup
    #[error("knowledge store not connected: {0}")]
    StoreDegraded(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Carries the normalized name that was searched
    #[error("No information found for pest: {0}")]
    NotFound(String),

    #[error("knowledge store query failed: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
}

#[derive(Debug)]
pub enum AppError {
    // Degraded service
    ModelUnavailable(String),
    StoreDegraded(String),

    // Client input errors
    InvalidImage(String),
    BadRequest(String),
    PayloadTooLarge(String),

    // Resource errors
    NotFound(String),

    // Server-side failures
    StoreUnavailable(String),
    InferenceFailed(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ModelUnavailable(_) | AppError::StoreDegraded(_) => "model_unavailable",
            AppError::InvalidImage(_) => "invalid_image",
            AppError::BadRequest(_) => "bad_request",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::NotFound(_) => "not_found",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::InferenceFailed(_) => "inference_failed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidImage(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ModelUnavailable(_)
            | AppError::StoreDegraded(_)
            | AppError::StoreUnavailable(_)
            | AppError::InferenceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            AppError::InvalidImage(msg) => format!("Invalid image file: {}", msg),
            AppError::BadRequest(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::NotFound(msg) => msg.clone(),
            AppError::ModelUnavailable(msg) => {
                tracing::error!("Service unavailable: {}", msg);
                "Model is not loaded.".to_string()
            }
            AppError::StoreDegraded(msg) => {
                tracing::error!("Knowledge store not connected: {}", msg);
                "Database connection not available.".to_string()
            }
            AppError::StoreUnavailable(msg) => {
                tracing::error!("Knowledge store error: {}", msg);
                "Database connection not available.".to_string()
            }
            AppError::InferenceFailed(msg) => {
                tracing::error!("Inference error: {}", msg);
                "Inference failed".to_string()
            }
        };

        let body = Json(json!({
            "error": error_message,
            "kind": self.kind(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::ModelUnavailable(reason) => AppError::ModelUnavailable(reason),
            ServiceError::StoreDegraded(reason) => AppError::StoreDegraded(reason),
            ServiceError::Decode(e) => AppError::InvalidImage(e.to_string()),
            ServiceError::NotFound(_) => AppError::NotFound(message),
            ServiceError::StoreUnavailable(e) => AppError::StoreUnavailable(e.to_string()),
            ServiceError::Inference(e) => AppError::InferenceFailed(e.to_string()),
        }
    }
}

/// Rejections keep their own status only for oversized bodies
fn rejection(status: StatusCode, what: &str, detail: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("{} exceeds the upload limit", what))
    } else {
        AppError::BadRequest(format!("Malformed {}: {}", what, detail))
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        rejection(err.status(), "upload", err.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(err: MultipartRejection) -> Self {
        rejection(err.status(), "upload", err.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        rejection(err.status(), "request body", err.body_text())
    }
}
