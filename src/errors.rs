use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("token not found")]
    TokenNotFound,

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::Validation(reason) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "validation_failed",
                reason.clone(),
            ),
            AppError::TokenNotFound => (
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "not_found",
                "token not found".to_string(),
            ),
            AppError::InvalidDocument(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_request_error",
                "invalid_document",
                reason.clone(),
            ),
            AppError::Upstream(e) => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                "upstream_failed",
                e.clone(),
            ),
            AppError::Store(e) => {
                tracing::error!("Token store error: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "storage_error",
                    "store_unavailable",
                    "token store unavailable".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Validation("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::TokenNotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Store(StoreError::Unavailable("down".into()))
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
