//! Route handlers

pub mod alerts;
pub mod rooms;
pub mod sessions;
pub mod signal;
pub mod stream;

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Handler result carrying a status and JSON error on failure
pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorBody>)>;

pub fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}
