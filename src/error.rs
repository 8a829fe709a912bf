use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::credentials::CredentialError;
use crate::services::helm::HelmError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Helm error: {0}")]
    Helm(#[from] HelmError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Credential(e) => {
                tracing::error!("Credential error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Credential error: {}", e),
                )
            }
            AppError::Helm(HelmError::Failed { stderr, .. })
                if stderr.contains("release: not found") =>
            {
                (StatusCode::NOT_FOUND, stderr.trim().to_string())
            }
            AppError::Helm(e) => {
                tracing::error!("Helm error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Helm error: {}", e),
                )
            }
            AppError::Yaml(e) => (StatusCode::BAD_REQUEST, format!("YAML error: {}", e)),
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("IO error: {}", e))
            }
            AppError::Multipart(e) => {
                (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e))
            }
        };

        (status, Json(ErrorResponse { detail: message })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
