use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::application::dto::DuplicateStatistics;
use crate::application::ports::{ImageRecordRepository, InsertOutcome, RepositoryError};
use crate::domain::entities::ImageRecord;
use crate::domain::value_objects::{CanonicalPath, ContentHash};

/// Process-local record store for tests, development and single-node use.
///
/// Each mutation runs under the shard lock of its key, which gives the same
/// per-statement atomicity as the Postgres implementation.
#[derive(Default)]
pub struct InMemoryImageRecordRepository {
    records: DashMap<String, ImageRecord>,
}

impl InMemoryImageRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Snapshot of every record, ordered by content hash
    pub fn all(&self) -> Vec<ImageRecord> {
        let mut records: Vec<ImageRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| a.content_hash().cmp(b.content_hash()));
        records
    }
}

#[async_trait]
impl ImageRecordRepository for InMemoryImageRecordRepository {
    async fn find_by_hash(
        &self,
        content_hash: &ContentHash,
    ) -> Result<Option<ImageRecord>, RepositoryError> {
        Ok(self
            .records
            .get(content_hash.as_hex())
            .map(|entry| entry.value().clone()))
    }

    async fn find_active_by_hash(
        &self,
        content_hash: &ContentHash,
    ) -> Result<Option<ImageRecord>, RepositoryError> {
        Ok(self
            .records
            .get(content_hash.as_hex())
            .filter(|entry| entry.is_active() && entry.reference_count() > 0)
            .map(|entry| entry.value().clone()))
    }

    async fn insert(&self, record: &ImageRecord) -> Result<InsertOutcome, RepositoryError> {
        match self.records.entry(record.content_hash().as_hex().to_string()) {
            Entry::Occupied(_) => Ok(InsertOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn increment_ref(
        &self,
        content_hash: &ContentHash,
    ) -> Result<Option<ImageRecord>, RepositoryError> {
        let Some(mut entry) = self.records.get_mut(content_hash.as_hex()) else {
            return Ok(None);
        };
        if !entry.is_active() {
            return Ok(None);
        }
        entry
            .increment_ref()
            .map_err(|e| RepositoryError::Internal(e.to_string()))?;
        Ok(Some(entry.value().clone()))
    }

    async fn decrement_ref(
        &self,
        content_hash: &ContentHash,
    ) -> Result<Option<ImageRecord>, RepositoryError> {
        let Some(mut entry) = self.records.get_mut(content_hash.as_hex()) else {
            return Ok(None);
        };
        if entry.reference_count() == 0 {
            return Ok(None);
        }
        entry.decrement_ref();
        Ok(Some(entry.value().clone()))
    }

    async fn reactivate(&self, record: &ImageRecord) -> Result<bool, RepositoryError> {
        let Some(mut entry) = self.records.get_mut(record.content_hash().as_hex()) else {
            return Ok(false);
        };
        if entry.is_active() || entry.reference_count() != 0 {
            return Ok(false);
        }
        *entry = record.clone();
        Ok(true)
    }

    async fn find_with_perceptual_hash(&self) -> Result<Vec<ImageRecord>, RepositoryError> {
        Ok(self
            .all()
            .into_iter()
            .filter(|r| r.is_active() && r.perceptual_hash().is_some())
            .collect())
    }

    async fn find_orphaned(
        &self,
        retired_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ImageRecord>, RepositoryError> {
        let mut orphans: Vec<ImageRecord> = self
            .records
            .iter()
            .filter(|entry| entry.is_sweepable(retired_before))
            .map(|entry| entry.value().clone())
            .collect();
        orphans.sort_by_key(|r| r.retired_at());
        orphans.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(orphans)
    }

    async fn delete_if_orphaned(
        &self,
        content_hash: &ContentHash,
        retired_before: Option<DateTime<Utc>>,
    ) -> Result<Option<ImageRecord>, RepositoryError> {
        Ok(self
            .records
            .remove_if(content_hash.as_hex(), |_, record| match retired_before {
                Some(cutoff) => record.is_sweepable(cutoff),
                None => record.reference_count() == 0 && !record.is_active(),
            })
            .map(|(_, record)| record))
    }

    async fn is_path_referenced(&self, path: &CanonicalPath) -> Result<bool, RepositoryError> {
        Ok(self
            .records
            .iter()
            .any(|entry| entry.canonical_path() == path))
    }

    async fn statistics(&self) -> Result<DuplicateStatistics, RepositoryError> {
        let (mut unique, mut duplicates, mut references, mut retired) = (0, 0, 0, 0);
        for entry in self.records.iter() {
            if entry.is_active() {
                unique += 1;
                references += entry.reference_count();
                if entry.reference_count() > 1 {
                    duplicates += 1;
                }
            } else {
                retired += 1;
            }
        }
        Ok(DuplicateStatistics::from_counts(
            unique, duplicates, references, retired,
        ))
    }
}
