//! JSON error responses.

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

/// Body of every error the API returns.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}
