use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::collector::{CollectionResult, Collector};
use super::errors::{GcError, GcResult};
use crate::application::ports::{ImageRecordRepository, StorageBackend, StoredObject};

/// Collector for stored objects that no record points at.
///
/// These are left behind when a process dies between an upload and the
/// record write, or when a caller's redundant copy was never cleaned up.
/// Objects younger than `min_age` are ignored so in-flight uploads are never
/// mistaken for strays; objects without a modification time are ignored too.
pub struct StrayObjectCollector {
    repo: Arc<dyn ImageRecordRepository>,
    storage: Arc<dyn StorageBackend>,
    min_age: Duration,
}

#[async_trait]
impl Collector for StrayObjectCollector {
    fn name(&self) -> &'static str {
        "stray_object_collector"
    }

    async fn collect(&self) -> GcResult<CollectionResult> {
        let min_age = chrono::Duration::from_std(self.min_age).map_err(|e| GcError::Config {
            message: format!("stray object age out of range: {}", e),
        })?;
        let cutoff = Utc::now() - min_age;

        let objects = self.storage.list("").await?;
        let candidates: Vec<StoredObject> = objects
            .into_iter()
            .filter(|object| object.last_modified.is_some_and(|at| at <= cutoff))
            .collect();

        let mut result = CollectionResult::new(self.name());
        debug!(candidates = candidates.len(), "Checking stored objects for strays");

        for object in candidates {
            if self.repo.is_path_referenced(&object.path).await? {
                continue;
            }

            match self.storage.delete(object.path.as_str()).await {
                Ok(true) => {
                    debug!(path = %object.path, size_bytes = object.size_bytes, "Deleted stray object");
                    result.items_cleaned += 1;
                }
                Ok(false) => result.items_missing += 1,
                Err(e) => {
                    warn!(path = %object.path, error = %e, "Failed to delete stray object");
                    result
                        .errors
                        .push(format!("Failed to delete stray object {}: {}", object.path, e));
                }
            }
        }

        if result.has_cleaned_items() {
            info!(deleted = result.items_cleaned, "Removed stray stored objects");
        }
        Ok(result)
    }
}

impl StrayObjectCollector {
    pub fn new(
        repo: Arc<dyn ImageRecordRepository>,
        storage: Arc<dyn StorageBackend>,
        min_age: Duration,
    ) -> Self {
        Self {
            repo,
            storage,
            min_age,
        }
    }
}
