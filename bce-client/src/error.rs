//! Remote API error types.

use thiserror::Error;

/// Errors returned by the remote resource APIs.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connect, TLS, timeout).
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("status {status}: {code}: {message} (request {request_id})")]
    Status {
        status: u16,
        code: String,
        message: String,
        request_id: String,
    },

    /// The response body could not be decoded.
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),

    /// Rejected client-side before sending.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ApiError {
    /// HTTP status of a `Status` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for remote API calls.
pub type Result<T> = std::result::Result<T, ApiError>;
