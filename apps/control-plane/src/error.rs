//! The one place a `CoreError` (or a `DbError` that converts into one)
//! becomes an HTTP response. Every handler returns `Result<_, ApiError>`
//! and lets `?` do the conversion; no handler matches on status codes
//! itself (§7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use control_core::CoreError;
use control_db::DbError;
use serde::Serialize;

pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError(err.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CoreError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "authentication required".to_string(),
            ),
            CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            CoreError::NotFound(msg) => (StatusCode::NOT_FOUND, format!("{msg} not found")),
            CoreError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            CoreError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            CoreError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
