//! Error types for ccx-cache
//!
//! A refresh or deletion either commits completely or returns one of these
//! errors with the prior cache state intact.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Why an external source could not be used
#[derive(Debug, Clone, PartialEq)]
pub enum SourceFailure {
    /// No response within the configured timeout
    Timeout,
    /// Response with a non-success HTTP status
    Status(u16),
    /// Connection or protocol failure
    Transport(String),
    /// Response body did not have the expected shape
    Malformed(String),
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFailure::Timeout => write!(f, "timed out"),
            SourceFailure::Status(code) => write!(f, "returned HTTP {}", code),
            SourceFailure::Transport(msg) => write!(f, "transport error: {}", msg),
            SourceFailure::Malformed(msg) => write!(f, "malformed payload: {}", msg),
        }
    }
}

/// Cache service error type
#[derive(Debug, Error)]
pub enum CacheError {
    /// External fetch failed (503)
    #[error("Could not fetch data from {source_name}: {cause}")]
    SourceUnavailable {
        source_name: String,
        cause: SourceFailure,
    },

    /// Lookup or deletion target absent (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request parameter (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Another refresh is running in this process (409)
    #[error("A refresh is already in progress")]
    RefreshInProgress,

    /// Transaction-level failure; the transaction has been rolled back (500)
    #[error("Storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// Summary artifact could not be rendered or encoded (500)
    #[error("Render failure: {0}")]
    Render(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ccx-common error
    #[error("Common error: {0}")]
    Common(#[from] ccx_common::Error),
}

impl CacheError {
    pub fn source_unavailable(source_name: impl Into<String>, cause: SourceFailure) -> Self {
        CacheError::SourceUnavailable {
            source_name: source_name.into(),
            cause,
        }
    }
}

impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            CacheError::SourceUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "SOURCE_UNAVAILABLE")
            }
            CacheError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            CacheError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            CacheError::RefreshInProgress => (StatusCode::CONFLICT, "REFRESH_IN_PROGRESS"),
            CacheError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            CacheError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RENDER_ERROR"),
            CacheError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            CacheError::Common(ccx_common::Error::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            CacheError::Common(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", self);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
