//! Status store error types

use thiserror::Error;

/// Errors that can occur in the status store layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store backend is unreachable
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Serialization/deserialization of a stored value failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored value was present but malformed
    #[error("Corrupt record at {key}: {message}")]
    Corruption {
        /// Key of the malformed record
        key: String,
        /// What was wrong with it
        message: String,
    },

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::Unavailable("connection refused".to_string());
        assert_eq!(err.to_string(), "Store unavailable: connection refused");
    }

    #[test]
    fn test_serde_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let store_err: StoreError = json_err.into();
        assert!(matches!(store_err, StoreError::Serialization(_)));
    }
}
