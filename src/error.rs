//! Error types for the agent evaluation service
//!
//! This module provides error handling using thiserror for structured error
//! definitions and anyhow for error propagation at the binary edge.

use thiserror::Error;

/// Main error type for evaluation operations
#[derive(Error, Debug)]
pub enum EvalError {
    /// One or more required ingestion fields were absent or empty
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingField(Vec<&'static str>),

    /// Score outside the closed interval [0, 1]
    #[error("Score must be between 0 and 1")]
    InvalidScore,

    /// Negative latency reported by the caller
    #[error("latency_ms must not be negative")]
    InvalidLatency,

    /// Settings document rejected before write
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Request body could not be decoded
    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    /// No owner could be resolved for the request
    #[error("Unauthorized")]
    Unauthorized,

    /// Record not found (or not owned by the caller)
    #[error("Evaluation not found: {0}")]
    NotFound(String),

    /// Underlying persistence failure
    #[error("{0}")]
    Store(String),

    /// Schema migration failure
    #[error("Migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl EvalError {
    /// True for errors caused by the caller's input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EvalError::MissingField(_)
                | EvalError::InvalidScore
                | EvalError::InvalidLatency
                | EvalError::InvalidSettings(_)
                | EvalError::InvalidRequest(_)
        )
    }
}

/// Result type alias for evaluation operations
pub type Result<T> = std::result::Result<T, EvalError>;

impl From<libsql::Error> for EvalError {
    fn from(err: libsql::Error) -> Self {
        EvalError::Store(err.to_string())
    }
}

/// Convert anyhow::Error to EvalError
impl From<anyhow::Error> for EvalError {
    fn from(err: anyhow::Error) -> Self {
        EvalError::Other(err.to_string())
    }
}
