use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::batch_processor::{BatchConfig, BatchProcessor};
use super::errors::ObjectDeletionError;
use crate::application::locks::HashLocks;
use crate::application::ports::{ImageRecordRepository, StorageBackend};
use crate::domain::entities::ImageRecord;
use crate::domain::value_objects::ContentHash;

/// What happened to one retired record
#[derive(Debug, Clone)]
pub struct RecordDeletionAttempt {
    pub content_hash: ContentHash,
    /// The removed record. `None` when it was referenced again (or already
    /// removed) by the time the conditional delete ran.
    pub record: Option<ImageRecord>,
    pub object_deleted: bool,
}

impl RecordDeletionAttempt {
    fn skipped(content_hash: ContentHash) -> Self {
        Self {
            content_hash,
            record: None,
            object_deleted: false,
        }
    }

    pub fn record_deleted(&self) -> bool {
        self.record.is_some()
    }

    /// Record removed, but its object had already disappeared
    pub fn object_missing(&self) -> bool {
        self.record.is_some() && !self.object_deleted
    }
}

/// Removes a retired record and then its stored object.
///
/// The row goes first, through a conditional delete that re-checks the
/// retired state inside the database. A record reactivated a moment earlier
/// therefore survives, and its object is never touched. Per-hash locking
/// matches the mutation paths of the deduplication service.
#[derive(Clone)]
pub struct RecordDeletionCoordinator {
    repo: Arc<dyn ImageRecordRepository>,
    storage: Arc<dyn StorageBackend>,
    locks: HashLocks,
}

impl RecordDeletionCoordinator {
    pub fn new(
        repo: Arc<dyn ImageRecordRepository>,
        storage: Arc<dyn StorageBackend>,
        locks: HashLocks,
    ) -> Self {
        Self {
            repo,
            storage,
            locks,
        }
    }

    /// Delete under the per-hash lock
    pub async fn delete_record(
        &self,
        content_hash: &ContentHash,
        retired_before: Option<DateTime<Utc>>,
    ) -> Result<RecordDeletionAttempt, ObjectDeletionError> {
        let _guard = self.locks.lock(content_hash).await;
        self.delete_record_locked(content_hash, retired_before).await
    }

    /// Delete assuming the caller already holds the lock for `content_hash`
    pub async fn delete_record_locked(
        &self,
        content_hash: &ContentHash,
        retired_before: Option<DateTime<Utc>>,
    ) -> Result<RecordDeletionAttempt, ObjectDeletionError> {
        let deleted = self
            .repo
            .delete_if_orphaned(content_hash, retired_before)
            .await
            .map_err(|e| ObjectDeletionError::record(content_hash.as_hex(), e))?;

        let Some(record) = deleted else {
            debug!(
                content_hash = %content_hash.short(),
                "Record no longer sweepable, skipping"
            );
            return Ok(RecordDeletionAttempt::skipped(content_hash.clone()));
        };

        let object_deleted = self.remove_object(&record).await?;

        Ok(RecordDeletionAttempt {
            content_hash: content_hash.clone(),
            record: Some(record),
            object_deleted,
        })
    }

    /// Delete many records with bounded concurrency, each under its own lock
    pub async fn delete_records(
        &self,
        content_hashes: Vec<ContentHash>,
        retired_before: Option<DateTime<Utc>>,
        config: &BatchConfig,
    ) -> Vec<Result<RecordDeletionAttempt, ObjectDeletionError>> {
        BatchProcessor::process_concurrent(content_hashes, config, |content_hash| async move {
            self.delete_record(&content_hash, retired_before).await
        })
        .await
        .into_iter()
        .map(|batch_result| batch_result.result)
        .collect()
    }

    async fn remove_object(&self, record: &ImageRecord) -> Result<bool, ObjectDeletionError> {
        let path = record.canonical_path();

        // Another record may have been written under the same path by a caller
        // supplying its own hint; never pull bytes out from under it.
        let shared = self
            .repo
            .is_path_referenced(path)
            .await
            .map_err(|e| ObjectDeletionError::record(record.content_hash().as_hex(), e))?;
        if shared {
            debug!(path = %path, "Object still referenced by another record, keeping it");
            return Ok(false);
        }

        match self.storage.delete(path.as_str()).await {
            Ok(true) => Ok(true),
            Ok(false) => {
                debug!(
                    path = %path,
                    content_hash = %record.content_hash().short(),
                    "Stored object already missing, treating as clean"
                );
                Ok(false)
            }
            Err(e) => {
                warn!(
                    path = %path,
                    content_hash = %record.content_hash().short(),
                    error = %e,
                    "Record deleted but object removal failed"
                );
                Err(ObjectDeletionError::object(path.as_str(), e))
            }
        }
    }
}
