//! Error handling

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::inference::InferenceError;
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

/// Boundary error. Only validation messages reach the caller; every
/// server-side cause is logged and replaced with a generic message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("model unavailable")]
    ModelUnavailable,

    #[error(transparent)]
    Inference(InferenceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::ModelUnavailable => {
                tracing::error!("Scoring requested while model is not loaded");
                (StatusCode::SERVICE_UNAVAILABLE, "Model unavailable")
            }
            AppError::Inference(err) => {
                tracing::error!(error = %err, "Inference error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::Store(err) => {
                tracing::error!(error = %err, "Persistence error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<InferenceError> for AppError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::NotLoaded => AppError::ModelUnavailable,
            other => AppError::Inference(other),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect::<Vec<_>>()
            .join("; ");
        AppError::ValidationError(message)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}
