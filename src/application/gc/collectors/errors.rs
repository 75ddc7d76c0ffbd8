use thiserror::Error;

use crate::application::ports::{RepositoryError, StorageError};

/// Errors that abort a whole collector pass
#[derive(Debug, Error)]
pub enum GcError {
    /// Error occurred while querying for sweep candidates
    #[error("Failed to query for sweep candidates: {source}")]
    Query {
        #[from]
        source: RepositoryError,
    },

    /// Error occurred while enumerating stored objects
    #[error("Failed to list stored objects: {source}")]
    Listing {
        #[from]
        source: StorageError,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type for sweep operations
pub type GcResult<T> = Result<T, GcError>;

/// Failure while removing one retired record and its object
#[derive(Debug, Error)]
pub enum ObjectDeletionError {
    /// Conditional record delete failed; nothing was removed
    #[error("Failed to delete image record {content_hash}: {source}")]
    Record {
        content_hash: String,
        #[source]
        source: RepositoryError,
    },

    /// Record is gone but its object is still stored
    #[error("Failed to delete stored object {path}: {source}")]
    Object {
        path: String,
        #[source]
        source: StorageError,
    },
}

impl ObjectDeletionError {
    pub fn record(content_hash: impl Into<String>, source: RepositoryError) -> Self {
        Self::Record {
            content_hash: content_hash.into(),
            source,
        }
    }

    pub fn object(path: impl Into<String>, source: StorageError) -> Self {
        Self::Object {
            path: path.into(),
            source,
        }
    }

    /// Whether the record row was removed despite the failure
    pub fn record_deleted(&self) -> bool {
        matches!(self, Self::Object { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gc_error_display() {
        let error = GcError::Config {
            message: "batch size must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration error: batch size must be positive"
        );
    }

    #[test]
    fn test_object_deletion_error() {
        let error = ObjectDeletionError::object(
            "posts/a.jpg",
            StorageError::Backend("connection reset".to_string()),
        );
        assert!(error.record_deleted());
        assert!(error
            .to_string()
            .contains("Failed to delete stored object posts/a.jpg"));

        let error = ObjectDeletionError::record(
            "abc",
            RepositoryError::Internal("pool closed".to_string()),
        );
        assert!(!error.record_deleted());
    }
}
