use std::sync::Arc;

use async_trait::async_trait;

use crate::application::dto::SimilarImage;
use crate::application::ports::{ImageRecordRepository, RepositoryError};
use crate::domain::value_objects::PerceptualHash;

/// Near-duplicate lookup over active records.
///
/// Results are ordered by ascending Hamming distance, ties broken by content
/// hash, and never include a record farther than `threshold`.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    async fn find_similar(
        &self,
        query: &PerceptualHash,
        threshold: u32,
    ) -> Result<Vec<SimilarImage>, RepositoryError>;
}

/// Compares the query against every active record. O(active records) per
/// call; swap for an indexed implementation when the table grows.
pub struct LinearScanSearch {
    repo: Arc<dyn ImageRecordRepository>,
}

impl LinearScanSearch {
    pub fn new(repo: Arc<dyn ImageRecordRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl SimilaritySearch for LinearScanSearch {
    async fn find_similar(
        &self,
        query: &PerceptualHash,
        threshold: u32,
    ) -> Result<Vec<SimilarImage>, RepositoryError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = self.repo.find_with_perceptual_hash().await?;

        let mut matches: Vec<SimilarImage> = candidates
            .into_iter()
            .filter(|record| record.is_active())
            .filter_map(|record| {
                let distance = query.distance(record.perceptual_hash()?);
                (distance <= threshold).then_some(SimilarImage { record, distance })
            })
            .collect();

        matches.sort_by(|a, b| {
            a.distance
                .cmp(&b.distance)
                .then_with(|| a.record.content_hash().cmp(b.record.content_hash()))
        });

        Ok(matches)
    }
}
