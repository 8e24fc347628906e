//! Error types for Annex.
//!
//! Uses thiserror for ergonomic error definitions that integrate
//! with axum's response system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Resource errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    // Validation errors
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported media type: {0}")]
    BadMediaType(String),

    #[error("File too large: max {max_size} bytes")]
    FileTooLarge { max_size: usize },

    #[error("Cannot read file: {0}")]
    Unreadable(String),

    // Backing store errors
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 404
            Self::NotFound(_) | Self::FileNotFound(_) => StatusCode::NOT_FOUND,

            // 400
            Self::InvalidIdentifier(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,

            // 405
            Self::Unsupported(_) => StatusCode::METHOD_NOT_ALLOWED,

            // 413
            Self::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 415
            Self::BadMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,

            // 422
            Self::Unreadable(_) => StatusCode::UNPROCESSABLE_ENTITY,

            // 500
            Self::StorageUnavailable(_)
            | Self::InvariantViolation(_)
            | Self::Database(_)
            | Self::Internal(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::BadMediaType(_) => "BAD_MEDIA_TYPE",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::Unreadable(_) => "UNREADABLE",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            Self::InvariantViolation(_) => "INVARIANT_VIOLATION",
            Self::Unsupported(_) => "UNSUPPORTED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Other(_) => "UNKNOWN_ERROR",
        }
    }

    /// Whether the failure lies with the caller rather than the server.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(code, %message, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

// Convenience conversions
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<annex_storage::Error> for Error {
    fn from(err: annex_storage::Error) -> Self {
        use annex_storage::Error as StorageError;

        match err {
            StorageError::InvalidIdentifier(msg) => Self::InvalidIdentifier(msg),
            StorageError::FileNotFound(path) => Self::FileNotFound(path),
            StorageError::Unreadable(msg) => Self::Unreadable(msg),
            StorageError::StorageUnavailable(msg) => Self::StorageUnavailable(msg),
            StorageError::Io(e) => Self::StorageUnavailable(e.to_string()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::StorageUnavailable("record store did not answer in time".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::NotFound("ws".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::BadMediaType("text/plain".into()).status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            Error::InvariantViolation("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(Error::InvalidIdentifier("x".into()).is_client_error());
        assert!(!Error::StorageUnavailable("x".into()).is_client_error());
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: Error = annex_storage::Error::FileNotFound("a/b.png".into()).into();
        assert!(matches!(err, Error::FileNotFound(p) if p == "a/b.png"));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = annex_storage::Error::Io(io).into();
        assert_eq!(err.error_code(), "STORAGE_UNAVAILABLE");
    }
}
