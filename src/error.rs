//! Gateway error taxonomy.

use std::time::Duration;
use thiserror::Error;

use crate::upload::UploadRejection;

/// Errors produced by gateway checks.
///
/// Every variant except `Internal` is an expected, handled outcome with a
/// defined wire response. `Internal` is fatal to the request and terminates
/// with a 500-equivalent.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Identifier unknown or secret mismatch. The message never reveals
    /// which of the two it was.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No active session for a request that requires one.
    #[error("authentication required")]
    NotAuthenticated,

    /// Session exists but the role does not grant the permission.
    #[error("permission denied")]
    PermissionDenied,

    /// State-changing request arrived without an anti-forgery token.
    #[error("security token missing")]
    CsrfMissing,

    /// Token unknown, aged past expiry, or bound to another session.
    #[error("security token invalid or expired")]
    CsrfInvalid,

    /// Attempt cap reached for this (client, category) window.
    #[error("too many attempts, retry after {} seconds", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Upload failed one or more validation stages.
    #[error("upload rejected")]
    UploadRejected { reasons: Vec<UploadRejection> },

    /// Unexpected fault. Logged with full context; shown to users only as a
    /// generic failure unless development mode exposes detail.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Whether this error is fatal to the request (500-equivalent).
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::Internal(_))
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::Internal(e.to_string())
    }
}
