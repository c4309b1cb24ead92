//! HTTP error responses for the linkpeek server.
//!
//! Only invalid input and "nothing found" are reported as such; anything
//! else is logged and answered with a generic 500.

use std::any::Any;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use linkpeek_core::Error;

pub const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed `url` parameter.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Neither extraction stage found anything.
    #[error("no metadata found for {0}")]
    NotFound(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error(transparent)]
    Internal(Error),

    /// A handler panicked; carries the panic message.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Turn a caught handler panic into the generic 500 response.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };

    ApiError::Panicked(message).into_response()
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidUrl(msg) => ApiError::InvalidUrl(msg),
            Error::NoMetadataFound(url) => ApiError::NotFound(url),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::InvalidUrl(_) => (StatusCode::BAD_REQUEST, json!({ "error": "Invalid URL" })),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "metadata": null })),
            ApiError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, json!({ "error": "Rate limit exceeded" })),
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": INTERNAL_MESSAGE }))
            }
            ApiError::Panicked(message) => {
                tracing::error!(panic = %message, "request handler panicked");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": INTERNAL_MESSAGE }))
            }
        };

        (status, Json(body)).into_response()
    }
}
