//! Error types for processed-set and cache persistence.

use thiserror::Error;

/// Errors from the processed set and the record cache.
#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    /// Database operation failed.
    #[error("state database error: {message}")]
    Database { message: String },

    /// A stored result could not be encoded or decoded.
    #[error("stored result is not valid JSON: {0}\n  Suggestion: Delete the state database to rebuild it")]
    Serialization(String),
}

impl From<sqlx::Error> for TrackerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
