//! Backend driver error types

use thiserror::Error;

/// Errors produced by backend storage drivers
#[derive(Error, Debug)]
pub enum BackendError {
    /// HTTP transport failure talking to the backend
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered but the body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// The backend reported a query-level failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// No driver is registered for the requested storage type
    #[error("Unsupported storage type: {0}")]
    UnsupportedStorage(String),
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}

/// Result type alias for backend driver operations
pub type BackendResult<T> = Result<T, BackendError>;
