use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use vitrine_core::CatalogError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) enum ApiErrorCode {
    ValidationFailed,
    Conflict,
    NotFound,
    Unauthorized,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Value,
}

#[must_use]
pub(crate) fn api_error_status(code: ApiErrorCode) -> StatusCode {
    match code {
        // Duplicate categories and destination collisions are 400s on the
        // wire, not 409; the admin frontend only distinguishes 4xx from 5xx.
        ApiErrorCode::ValidationFailed | ApiErrorCode::Conflict => StatusCode::BAD_REQUEST,
        ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
        ApiErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ApiErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[must_use]
pub(crate) fn api_error(code: ApiErrorCode, message: &str, details: Value) -> ApiError {
    ApiError {
        code,
        message: message.to_string(),
        details,
    }
}

#[must_use]
pub(crate) fn api_error_response(err: ApiError) -> Response {
    let status = api_error_status(err.code);
    (status, Json(json!({"error": err}))).into_response()
}

/// Maps a domain failure to its wire representation.
#[must_use]
pub(crate) fn catalog_error_response(err: &CatalogError) -> Response {
    let api = match err {
        CatalogError::NotFound(what) => api_error(
            ApiErrorCode::NotFound,
            "referenced file does not exist",
            json!({"path": what}),
        ),
        CatalogError::Conflict(what) => api_error(
            ApiErrorCode::Conflict,
            "destination already exists",
            json!({"path": what}),
        ),
        CatalogError::InvalidName(what) => api_error(
            ApiErrorCode::ValidationFailed,
            "invalid name",
            json!({"name": what}),
        ),
        CatalogError::Thumbnail(e) => api_error(
            ApiErrorCode::Internal,
            "image processing failed",
            json!({"message": e.to_string()}),
        ),
        CatalogError::Io(e) => api_error(
            ApiErrorCode::Internal,
            "filesystem operation failed",
            json!({"message": e.to_string()}),
        ),
    };
    api_error_response(api)
}
