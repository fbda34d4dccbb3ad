//! Query model error types
//!
//! Defines all errors that can occur while validating or interpreting
//! a `QueryTs` request.

use thiserror::Error;

/// Errors produced by the query request model
#[derive(Error, Debug)]
pub enum QueryError {
    /// Request failed structural validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// A start/end timestamp could not be parsed
    #[error("Cannot parse timestamp: {0}")]
    Timestamp(String),

    /// The scroll window string could not be parsed
    #[error("Cannot parse scroll window: {0}")]
    Window(String),

    /// Invalid time range (start >= end)
    #[error("Invalid time range: start must be less than end")]
    InvalidTimeRange,
}

/// Result type alias for query-model operations
pub type QueryResult<T> = Result<T, QueryError>;
