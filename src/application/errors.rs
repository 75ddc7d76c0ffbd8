//! Error type for the deduplication service

use thiserror::Error;

use crate::application::gc::collectors::{GcError, ObjectDeletionError};
use crate::application::ports::{RepositoryError, StorageError};
use crate::domain::errors::DomainError;

/// Message shown to end users for any failure in this subsystem
pub const USER_FACING_UPLOAD_ERROR: &str = "Upload failed, please retry";

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Image record not found: {0}")]
    NotFound(String),

    #[error("Concurrent writers kept conflicting on {0}")]
    Conflict(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Sweep failed: {0}")]
    Sweep(#[from] GcError),
}

impl From<ObjectDeletionError> for DedupError {
    fn from(err: ObjectDeletionError) -> Self {
        match err {
            ObjectDeletionError::Record { source, .. } => DedupError::Repository(source),
            ObjectDeletionError::Object { source, .. } => DedupError::Storage(source),
        }
    }
}

impl DedupError {
    /// Sanitized text for user-facing responses. Never carries hashes,
    /// paths or backend details.
    pub fn user_message(&self) -> &'static str {
        USER_FACING_UPLOAD_ERROR
    }

    /// Whether retrying the whole operation can help
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DedupError::Storage(_)
                | DedupError::Repository(RepositoryError::Database(_))
                | DedupError::Conflict(_)
        )
    }
}
