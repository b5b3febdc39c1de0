//! Error types for daybook

use thiserror::Error;

/// Result type alias for daybook operations
pub type Result<T> = std::result::Result<T, DaybookError>;

/// Main error type for daybook
#[derive(Error, Debug)]
pub enum DaybookError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid field: {0}")]
    Validation(String),

    /// Raised by the input screen when the message looks like a prompt
    /// injection attempt. Always aborts the turn.
    #[error("Potential prompt injection detected")]
    InjectionDetected,

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Document sync error: {0}")]
    Sync(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DaybookError {
    /// Check if the operation that produced this error is worth retrying.
    ///
    /// Only transient transport-level failures qualify; validation and
    /// injection errors are final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DaybookError::Http(_) | DaybookError::Extraction(_) | DaybookError::Sync(_)
        )
    }
}
