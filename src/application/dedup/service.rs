use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::config::{DedupConfig, LifecyclePolicy};
use super::similarity::{LinearScanSearch, SimilaritySearch};
use crate::application::dto::{
    DuplicateStatistics, IngestRequest, SimilarImage, StoreOutcome, StoreRequest, StoredImage,
};
use crate::application::errors::DedupError;
use crate::application::gc::{OrphanSweeper, RecordDeletionCoordinator};
use crate::application::hashing::{ContentHasher, RasterAnalysis};
use crate::application::locks::HashLocks;
use crate::application::ports::{ImageRecordRepository, InsertOutcome, StorageBackend};
use crate::domain::entities::ImageRecord;
use crate::domain::value_objects::{
    unique_filename, CanonicalPath, ContentHash, PerceptualHash, UploadDescriptor,
};

/// Orchestrates exact and near-duplicate detection, reference counting and
/// reclamation of stored images.
///
/// Every read-then-write sequence on a record runs under the per-hash lock
/// shared with the [`OrphanSweeper`], and every repository write is a single
/// atomic statement. Concurrent uploads of identical bytes therefore end in
/// one record with the right count, in this process or across processes.
pub struct DeduplicationService {
    repo: Arc<dyn ImageRecordRepository>,
    storage: Arc<dyn StorageBackend>,
    hasher: Arc<ContentHasher>,
    similarity: Arc<dyn SimilaritySearch>,
    locks: HashLocks,
    coordinator: RecordDeletionCoordinator,
    sweeper: Arc<OrphanSweeper>,
    config: DedupConfig,
}

impl DeduplicationService {
    pub fn new(
        repo: Arc<dyn ImageRecordRepository>,
        storage: Arc<dyn StorageBackend>,
        hasher: Arc<ContentHasher>,
        config: DedupConfig,
    ) -> Self {
        let locks = HashLocks::new();
        let coordinator =
            RecordDeletionCoordinator::new(Arc::clone(&repo), Arc::clone(&storage), locks.clone());
        let sweeper = Arc::new(OrphanSweeper::with_coordinator(
            Arc::clone(&repo),
            Arc::clone(&storage),
            coordinator.clone(),
            config.sweeper_config(),
        ));
        let similarity = Arc::new(LinearScanSearch::new(Arc::clone(&repo)));

        Self {
            repo,
            storage,
            hasher,
            similarity,
            locks,
            coordinator,
            sweeper,
            config,
        }
    }

    /// Replace the default linear scan
    pub fn with_similarity_search(mut self, similarity: Arc<dyn SimilaritySearch>) -> Self {
        self.similarity = similarity;
        self
    }

    /// The sweeper sharing this service's locks, for periodic runs
    pub fn sweeper(&self) -> Arc<OrphanSweeper> {
        Arc::clone(&self.sweeper)
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Record bytes the caller has already written to `canonical_path_hint`.
    ///
    /// When identical content is already referenced the hint is not adopted
    /// and the caller's copy is redundant; see [`StoredImage::hint_adopted`].
    pub async fn store(&self, request: StoreRequest) -> Result<StoredImage, DedupError> {
        validate_filename(&request.original_filename)?;
        let hint = self.storage.normalize(&request.canonical_path_hint);
        if hint.is_empty() {
            return Err(DedupError::Validation(
                "canonical path hint resolves to an empty path".to_string(),
            ));
        }

        let content_hash = self.exact_digest(&request.bytes).await?;
        let descriptor = descriptor_for(
            &request.bytes,
            &request.original_filename,
            &request.mime_type,
            &request.context,
            request.uploader_id,
        );

        let _guard = self.locks.lock(&content_hash).await;
        self.store_locked(&content_hash, hint, &request.bytes, descriptor)
            .await
    }

    /// Upload-and-record in one step. Identical content already referenced is
    /// never written again.
    pub async fn ingest(&self, request: IngestRequest) -> Result<StoredImage, DedupError> {
        validate_filename(&request.original_filename)?;
        let content_hash = self.exact_digest(&request.bytes).await?;
        let descriptor = descriptor_for(
            &request.bytes,
            &request.original_filename,
            &request.mime_type,
            &request.context,
            request.uploader_id,
        );

        let _guard = self.locks.lock(&content_hash).await;

        // 1. Active duplicate: count the new owner, write nothing
        if let Some(record) = self.repo.increment_ref(&content_hash).await? {
            debug!(
                content_hash = %content_hash.short(),
                reference_count = record.reference_count(),
                "Duplicate upload, skipped storage write"
            );
            return Ok(StoredImage {
                record,
                outcome: StoreOutcome::Referenced,
            });
        }

        // 2. Write bytes; a failure here leaves no trace
        let filename = unique_filename(&request.original_filename);
        let path = self
            .storage
            .upload(
                request.bytes.clone(),
                &request.folder,
                &filename,
                &request.mime_type,
            )
            .await?;

        // 3. Record it, dropping our copy if it did not become the record's
        match self
            .store_locked(&content_hash, path.clone(), &request.bytes, descriptor)
            .await
        {
            Ok(stored) => {
                if !stored.hint_adopted() {
                    self.discard_object(&path).await;
                }
                Ok(stored)
            }
            Err(e) => {
                self.discard_object(&path).await;
                Err(e)
            }
        }
    }

    /// Add one logical owner to an active record
    pub async fn increment(&self, record: &ImageRecord) -> Result<ImageRecord, DedupError> {
        let content_hash = record.content_hash();
        let _guard = self.locks.lock(content_hash).await;

        self.repo
            .increment_ref(content_hash)
            .await?
            .ok_or_else(|| DedupError::NotFound(content_hash.short().to_string()))
    }

    /// Remove one logical owner. Returns true when this removed the last one.
    ///
    /// With [`LifecyclePolicy::Immediate`] the record and its object are gone
    /// when this returns; otherwise the record is retired and left for the
    /// sweeper.
    pub async fn decrement(&self, record: &ImageRecord) -> Result<bool, DedupError> {
        let content_hash = record.content_hash();
        let _guard = self.locks.lock(content_hash).await;

        let Some(updated) = self.repo.decrement_ref(content_hash).await? else {
            debug!(
                content_hash = %content_hash.short(),
                "Decrement on missing or zero-referenced record ignored"
            );
            return Ok(false);
        };

        if updated.reference_count() > 0 {
            return Ok(false);
        }

        info!(
            content_hash = %content_hash.short(),
            path = %updated.canonical_path(),
            "Last reference removed, image retired"
        );

        if self.config.lifecycle == LifecyclePolicy::Immediate {
            match self
                .coordinator
                .delete_record_locked(content_hash, None)
                .await
            {
                Ok(_) => {}
                // The record is gone; the object is left for the stray sweep
                Err(e) if e.record_deleted() => {
                    warn!(
                        content_hash = %content_hash.short(),
                        error = %e,
                        "Record deleted but its object could not be removed"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(true)
    }

    /// Active records within `threshold` bits of `query`, closest first
    pub async fn find_similar(
        &self,
        query: &PerceptualHash,
        threshold: u32,
    ) -> Result<Vec<SimilarImage>, DedupError> {
        Ok(self.similarity.find_similar(query, threshold).await?)
    }

    /// Like [`Self::find_similar`] for raw bytes; undecodable bytes match nothing
    pub async fn find_similar_to_bytes(
        &self,
        bytes: Bytes,
        threshold: Option<u32>,
    ) -> Result<Vec<SimilarImage>, DedupError> {
        let threshold = threshold.unwrap_or(self.config.default_similarity_threshold);
        match self.analyze(&bytes).await?.perceptual_hash {
            Some(query) => self.find_similar(&query, threshold).await,
            None => Ok(Vec::new()),
        }
    }

    /// One sweep pass, draining every sweepable record. Returns the number of
    /// records removed, or zero when a sweep was already running.
    pub async fn cleanup_orphans(&self) -> Result<usize, DedupError> {
        let result = self.sweeper.sweep_once().await?;
        for error in &result.errors {
            warn!("Sweep error: {}", error);
        }
        Ok(result.retired_records_deleted)
    }

    pub async fn duplicate_statistics(&self) -> Result<DuplicateStatistics, DedupError> {
        Ok(self.repo.statistics().await?)
    }

    /// Lookup-then-write under the already held lock for `content_hash`.
    ///
    /// Each branch ends in one conditional write; when a writer in another
    /// process got there first the write reports it and the loop re-reads.
    async fn store_locked(
        &self,
        content_hash: &ContentHash,
        hint: CanonicalPath,
        bytes: &Bytes,
        descriptor: UploadDescriptor,
    ) -> Result<StoredImage, DedupError> {
        let mut analysis = None;

        for attempt in 0..=self.config.max_insert_retries {
            match self.repo.find_by_hash(content_hash).await? {
                Some(existing) if existing.is_active() => {
                    if let Some(record) = self.repo.increment_ref(content_hash).await? {
                        debug!(
                            content_hash = %content_hash.short(),
                            reference_count = record.reference_count(),
                            "Exact duplicate, reference added"
                        );
                        return Ok(StoredImage {
                            record,
                            outcome: StoreOutcome::Referenced,
                        });
                    }
                }
                Some(mut retired) => {
                    let raster = self.analysis_once(&mut analysis, bytes).await?;
                    let superseded = retired.reactivate(
                        hint.clone(),
                        descriptor.clone(),
                        raster.metadata.clone(),
                        raster.perceptual_hash.clone(),
                    )?;

                    if self.repo.reactivate(&retired).await? {
                        info!(
                            content_hash = %content_hash.short(),
                            path = %retired.canonical_path(),
                            "Retired image reactivated"
                        );
                        if let Some(previous) = superseded {
                            self.discard_superseded(&previous).await;
                        }
                        return Ok(StoredImage {
                            record: retired,
                            outcome: StoreOutcome::Reactivated,
                        });
                    }
                }
                None => {
                    let raster = self.analysis_once(&mut analysis, bytes).await?;
                    let record = ImageRecord::new(
                        content_hash.clone(),
                        raster.perceptual_hash.clone(),
                        hint.clone(),
                        descriptor.clone(),
                        raster.metadata.clone(),
                    );

                    if self.repo.insert(&record).await? == InsertOutcome::Inserted {
                        info!(
                            content_hash = %content_hash.short(),
                            path = %record.canonical_path(),
                            perceptual = record.perceptual_hash().is_some(),
                            "New image recorded"
                        );
                        return Ok(StoredImage {
                            record,
                            outcome: StoreOutcome::Created,
                        });
                    }
                }
            }

            debug!(
                content_hash = %content_hash.short(),
                attempt,
                "Record changed by a concurrent writer, retrying"
            );
        }

        warn!(
            content_hash = %content_hash.short(),
            retries = self.config.max_insert_retries,
            "Giving up after repeated write conflicts"
        );
        Err(DedupError::Conflict(content_hash.short().to_string()))
    }

    async fn exact_digest(&self, bytes: &Bytes) -> Result<ContentHash, DedupError> {
        let bytes = bytes.clone();
        Ok(tokio::task::spawn_blocking(move || ContentHasher::exact_digest(&bytes)).await?)
    }

    async fn analyze(&self, bytes: &Bytes) -> Result<RasterAnalysis, DedupError> {
        let hasher = Arc::clone(&self.hasher);
        let bytes = bytes.clone();
        Ok(tokio::task::spawn_blocking(move || hasher.analyze(&bytes)).await?)
    }

    /// Decode at most once per store, and only when a record is written
    async fn analysis_once<'a>(
        &self,
        cache: &'a mut Option<RasterAnalysis>,
        bytes: &Bytes,
    ) -> Result<&'a RasterAnalysis, DedupError> {
        if cache.is_none() {
            *cache = Some(self.analyze(bytes).await?);
        }
        Ok(cache.get_or_insert_with(RasterAnalysis::default))
    }

    /// Best-effort removal of an object this service wrote but did not keep
    async fn discard_object(&self, path: &CanonicalPath) {
        match self.storage.delete(path.as_str()).await {
            Ok(_) => debug!(path = %path, "Discarded redundant upload"),
            Err(e) => warn!(
                path = %path,
                error = %e,
                "Failed to discard redundant upload, left for the stray sweep"
            ),
        }
    }

    /// Best-effort removal of the path a reactivated record moved away from
    async fn discard_superseded(&self, path: &CanonicalPath) {
        match self.repo.is_path_referenced(path).await {
            Ok(false) => self.discard_object(path).await,
            Ok(true) => debug!(path = %path, "Superseded path still referenced, keeping it"),
            Err(e) => warn!(
                path = %path,
                error = %e,
                "Could not check superseded path, left for the stray sweep"
            ),
        }
    }
}

fn validate_filename(original_filename: &str) -> Result<(), DedupError> {
    if original_filename.trim().is_empty() {
        return Err(DedupError::Validation(
            "original filename must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn descriptor_for(
    bytes: &Bytes,
    original_filename: &str,
    mime_type: &str,
    context: &str,
    uploader_id: i64,
) -> UploadDescriptor {
    UploadDescriptor {
        original_filename: original_filename.to_string(),
        mime_type: mime_type.to_string(),
        byte_size: bytes.len() as u64,
        upload_context: context.to_string(),
        uploader_id,
    }
}
