//! Common error types shared across crates.

use thiserror::Error;

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::NotFound`] → 404
/// - [`ServiceError::RateLimited`] → 429
/// - [`ServiceError::Internal`] → 500
/// - [`ServiceError::Unavailable`] → 503
/// - [`ServiceError::Upstream`] → the upstream status (502 if it is not an error status)
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed — invalid id, missing field, or empty text after sanitising.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The addressed conversation or message does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller exceeded the request budget for the current window.
    #[error("too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The document store is temporarily unavailable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),

    /// The language-model provider answered with an error status.
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::NotFound(_) => 404,
            ServiceError::RateLimited { .. } => 429,
            ServiceError::Unavailable(_) => 503,
            ServiceError::Internal(_) => 500,
            ServiceError::Upstream { status, .. } if (400..=599).contains(status) => *status,
            ServiceError::Upstream { .. } => 502,
        }
    }

    /// Short machine-readable code used in [`crate::protocol::ErrorResponse`].
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::RateLimited { .. } => "rate_limited",
            ServiceError::Unavailable(_) => "service_unavailable",
            ServiceError::Internal(_) => "internal_error",
            ServiceError::Upstream { .. } => "upstream_error",
        }
    }
}
