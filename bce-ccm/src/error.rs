//! Error types for the reconciliation engine.

use bce_client::ApiError;
use thiserror::Error;

/// Errors returned by convergence operations.
///
/// `Transport` and `Validation` abort immediately and are never retried
/// here; `NotReady` is terminal for the current call. The caller retries the
/// whole operation, which re-reads remote state from scratch.
#[derive(Debug, Error)]
pub enum CcmError {
    /// Resource absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A wait ran out of attempts (or deadline) before the target state.
    #[error("{what} not ready after {attempts} attempts")]
    NotReady { what: String, attempts: u32 },

    /// Protocol or feature not implemented.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Malformed desired state.
    #[error("invalid desired state: {0}")]
    Validation(String),

    /// Remote API call failed.
    #[error("remote API: {0}")]
    Transport(#[from] ApiError),

    /// A wait was aborted through its cancellation token.
    #[error("cancelled while waiting for {0}")]
    Cancelled(String),
}

impl CcmError {
    /// The resource is gone, either observed by a wait or reported by the API.
    pub fn is_not_found(&self) -> bool {
        match self {
            CcmError::NotFound(_) => true,
            CcmError::Transport(e) => e.status() == Some(404),
            _ => false,
        }
    }
}

/// Result type for convergence operations.
pub type Result<T> = std::result::Result<T, CcmError>;
