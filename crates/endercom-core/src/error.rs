use std::time::Duration;

use thiserror::Error;

/// Unified error type for the Endercom runtime.
#[derive(Error, Debug)]
pub enum EndercomError {
    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Transport errors ───────────────────────────────────────
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid frequency: {0}")]
    InvalidFrequency(String),

    #[error("transport timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("transport error: {status}: {reason}")]
    Transport { status: u16, reason: String },

    // ── Handler errors ─────────────────────────────────────────
    #[error(transparent)]
    Handler(#[from] HandlerError),

    // ── Server errors ──────────────────────────────────────────
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("server error: {0}")]
    Server(String),

    #[error("run task failed: {0}")]
    Join(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl EndercomError {
    /// Errors that must abort startup or the run loop and are never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EndercomError::Unauthorized(_)
                | EndercomError::InvalidFrequency(_)
                | EndercomError::Config(_)
                | EndercomError::ConfigValidation { .. }
                | EndercomError::Bind { .. }
        )
    }

    /// Errors worth another attempt after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EndercomError::Timeout(_)
                | EndercomError::Unavailable(_)
                | EndercomError::RateLimited { .. }
                | EndercomError::MalformedResponse(_)
                | EndercomError::Transport { .. }
        )
    }

    /// Server-suggested wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            EndercomError::RateLimited { retry_after_secs } => {
                Some(Duration::from_secs(*retry_after_secs))
            }
            _ => None,
        }
    }
}

/// Failure of a single handler invocation. Always scoped to one message or request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),

    #[error("handler timed out after {0:?}")]
    TimedOut(Duration),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, EndercomError>;
