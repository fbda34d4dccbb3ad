//! Scroll engine error types

use thiserror::Error;

use crate::backend::BackendError;
use crate::query::QueryError;
use crate::store::StoreError;

/// Errors surfaced by the scroll engine
///
/// Transient per-slice backend failures are absorbed into the slice retry
/// state and never appear here; these variants cover structural problems
/// only.
#[derive(Error, Debug)]
pub enum ScrollError {
    /// Status store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Request failed validation or interpretation
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// No driver registered for a routed storage type
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Session state could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ScrollError {
    fn from(err: serde_json::Error) -> Self {
        ScrollError::Serialization(err.to_string())
    }
}

/// Result type alias for scroll engine operations
pub type ScrollResult<T> = Result<T, ScrollError>;
