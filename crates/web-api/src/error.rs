//! HTTP 错误响应：把应用层错误映射为状态码与统一的 JSON 结构。

use application::{ApplicationError, RepositoryError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

impl From<ApplicationError> for ApiError {
    fn from(err: ApplicationError) -> Self {
        match err {
            ApplicationError::Domain(err) => ApiError::BadRequest(err.to_string()),
            ApplicationError::Forbidden(message) => ApiError::Forbidden(message),
            ApplicationError::NotFound(message) => ApiError::NotFound(message),
            ApplicationError::Repository(RepositoryError::NotFound) => {
                ApiError::NotFound("resource not found".to_string())
            }
            ApplicationError::Repository(err) => ApiError::Internal(err.to_string()),
            ApplicationError::Cache(err) => ApiError::Internal(err.to_string()),
            ApplicationError::Broadcast(err) => ApiError::Internal(err.to_string()),
        }
    }
}
