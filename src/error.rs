use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Detail returned for `RouteNotFound`.
pub const NO_MAPPING_DETAIL: &str = "No mapping found for this GET endpoint";

/// Detail returned whenever an internal failure is hidden from the caller.
pub const INTERNAL_ERROR_DETAIL: &str = "An internal server error occurred.";

/// Application-wide error types with appropriate HTTP status codes.
///
/// # Startup vs. Per-Request
///
/// `ConfigError` is only produced while the process starts; `main` turns it
/// into an `EX_CONFIG` exit. Every other variant is produced while serving a
/// request and is rendered into a `{"detail": ...}` response instead of
/// escaping the handler.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A credential referenced by an endpoint is not set in the environment.
    #[error("{0}")]
    CredentialMissing(String),

    #[error("No mapping found for GET endpoint: {0}")]
    RouteNotFound(String),

    /// Network-level failure talking to the backend. The message is surfaced
    /// to the caller verbatim.
    #[error("{0}")]
    Transport(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Invalid request: {message}")]
    BadRequest { status: StatusCode, message: String },

    #[error("Method not allowed")]
    MethodNotAllowed,
}

/// Error envelope shared by every locally synthesized error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest { status, .. } => *status,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::ConfigError(_)
            | AppError::CredentialMissing(_)
            | AppError::Transport(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing detail message.
    ///
    /// Internal and configuration failures collapse to a generic message;
    /// their real cause only reaches the logs.
    pub fn detail(&self) -> String {
        match self {
            AppError::RouteNotFound(_) => NO_MAPPING_DETAIL.to_string(),
            AppError::CredentialMissing(msg) | AppError::Transport(msg) => msg.clone(),
            AppError::BadRequest { message, .. } => message.clone(),
            AppError::MethodNotAllowed => "Method Not Allowed".to_string(),
            AppError::ConfigError(_) | AppError::Internal(_) => INTERNAL_ERROR_DETAIL.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::RouteNotFound(path) => {
                tracing::warn!(path = %path, "No mapping found for GET endpoint");
            }
            AppError::BadRequest { message, .. } => {
                tracing::debug!(error = %message, "Rejected malformed request");
            }
            AppError::MethodNotAllowed => {}
            _ => tracing::error!(error = %self, "Request failed"),
        }

        (self.status_code(), axum::Json(ErrorBody::new(self.detail()))).into_response()
    }
}

/// Sanitize serde error messages to avoid leaking internal type information.
pub fn sanitize_serde_error(msg: &str) -> String {
    if msg.contains("invalid type") {
        return "Request body must be a JSON object".to_string();
    }

    if msg.contains("EOF while parsing") || msg.contains("expected") {
        return "Malformed JSON in request body".to_string();
    }

    "Invalid request format".to_string()
}

/// Render an error together with its whole `source()` chain.
///
/// `reqwest` keeps the useful part of a connection failure ("Connection
/// refused") in the source chain rather than in its own `Display`.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
