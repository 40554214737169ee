//! Error handling for the API server
//!
//! Responses carry a `kind` so calling systems can tell "your input was
//! invalid" apart from "the system is temporarily unavailable" and decide
//! whether to retry.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use promptforge::EngineError;
use promptforge_registry::RegistryError;
use serde_json::json;
use thiserror::Error;

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn bad_request(msg: &str) -> Self {
        Self::BadRequest(msg.to_string())
    }

    /// Status code plus error kind for the response body.
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            ApiError::Serialization(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            ApiError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            ApiError::Registry(e) => match e {
                RegistryError::TemplateNotFound(_)
                | RegistryError::VersionNotFound { .. }
                | RegistryError::NoVersionsAvailable(_) => (StatusCode::NOT_FOUND, "not_found"),
                // Broken template source: report the offending position
                RegistryError::Engine(EngineError::MalformedTemplate { .. }) => {
                    (StatusCode::BAD_REQUEST, "invalid_input")
                }
                // Bindings did not satisfy the template
                RegistryError::Engine(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_input"),
                RegistryError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "unavailable"),
                RegistryError::Storage(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.classify();
        let retryable = kind == "unavailable";

        let mut body = json!({
            "error": self.to_string(),
            "kind": kind,
            "retryable": retryable,
            "status": status.as_u16()
        });

        // Engine errors carry the byte offset of the offending tag
        if let ApiError::Registry(RegistryError::Engine(ref e)) = self {
            body["offset"] = json!(e.offset());
        }

        (status, Json(body)).into_response()
    }
}
