use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::application::dto::DuplicateStatistics;
use crate::domain::entities::ImageRecord;
use crate::domain::value_objects::{CanonicalPath, ContentHash};
#[cfg(test)]
use mockall::{automock, predicate::*};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Image record not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result of a unique-constraint-backed insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another writer holds the content hash already
    AlreadyExists,
}

/// Port for image record persistence.
///
/// Every mutating method is a single atomic statement so concurrent writers
/// in other processes cannot interleave between a read and the write.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ImageRecordRepository: Send + Sync {
    /// Find record by content hash, active or retired
    async fn find_by_hash(
        &self,
        content_hash: &ContentHash,
    ) -> Result<Option<ImageRecord>, RepositoryError>;

    /// Find record by content hash, only if it is still referenced
    async fn find_active_by_hash(
        &self,
        content_hash: &ContentHash,
    ) -> Result<Option<ImageRecord>, RepositoryError>;

    /// Insert a new record unless the content hash is taken
    async fn insert(&self, record: &ImageRecord) -> Result<InsertOutcome, RepositoryError>;

    /// Add one reference to an active record. `None` if missing or retired.
    async fn increment_ref(
        &self,
        content_hash: &ContentHash,
    ) -> Result<Option<ImageRecord>, RepositoryError>;

    /// Remove one reference if the count is positive, retiring the record at
    /// zero. `None` if missing or already at zero.
    async fn decrement_ref(
        &self,
        content_hash: &ContentHash,
    ) -> Result<Option<ImageRecord>, RepositoryError>;

    /// Persist a reactivated record, only if the stored row is still retired
    async fn reactivate(&self, record: &ImageRecord) -> Result<bool, RepositoryError>;

    /// Active records carrying a perceptual hash
    async fn find_with_perceptual_hash(&self) -> Result<Vec<ImageRecord>, RepositoryError>;

    /// Retired records whose grace window ended before `retired_before`
    async fn find_orphaned(
        &self,
        retired_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ImageRecord>, RepositoryError>;

    /// Delete the record if it is still retired and, when `retired_before` is
    /// given, retired no later than it. Returns the deleted record.
    async fn delete_if_orphaned(
        &self,
        content_hash: &ContentHash,
        retired_before: Option<DateTime<Utc>>,
    ) -> Result<Option<ImageRecord>, RepositoryError>;

    /// Whether any record, active or retired, points at `path`
    async fn is_path_referenced(&self, path: &CanonicalPath) -> Result<bool, RepositoryError>;

    /// Aggregate duplicate counts
    async fn statistics(&self) -> Result<DuplicateStatistics, RepositoryError>;
}
