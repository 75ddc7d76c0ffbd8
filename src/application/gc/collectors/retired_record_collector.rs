use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use super::batch_processor::BatchConfig;
use super::collector::{CollectionResult, Collector};
use super::errors::{GcError, GcResult};
use super::record_deletion_coordinator::RecordDeletionCoordinator;
use crate::application::ports::ImageRecordRepository;

/// Collector for retired records (reference count zero, grace window over).
///
/// Each candidate is deleted through the [`RecordDeletionCoordinator`], which
/// re-checks the retired state atomically, so a record reactivated between
/// the query and the delete is skipped rather than swept.
pub struct RetiredRecordCollector {
    repo: Arc<dyn ImageRecordRepository>,
    coordinator: RecordDeletionCoordinator,
    batch_size: i64,
    grace_period: Duration,
    batch_config: BatchConfig,
}

#[async_trait]
impl Collector for RetiredRecordCollector {
    fn name(&self) -> &'static str {
        "retired_record_collector"
    }

    async fn collect(&self) -> GcResult<CollectionResult> {
        let grace = chrono::Duration::from_std(self.grace_period).map_err(|e| GcError::Config {
            message: format!("grace period out of range: {}", e),
        })?;
        let retired_before = Utc::now() - grace;

        let mut result = CollectionResult::new(self.name());

        // Drain page by page; stop on a short page or a pass that made no progress
        loop {
            let candidates = self
                .repo
                .find_orphaned(retired_before, self.batch_size)
                .await?;
            if candidates.is_empty() {
                break;
            }

            let page_len = candidates.len();
            debug!(count = page_len, "Found retired records to sweep");

            let hashes = candidates
                .into_iter()
                .map(|record| record.content_hash().clone())
                .collect();

            let attempts = self
                .coordinator
                .delete_records(hashes, Some(retired_before), &self.batch_config)
                .await;

            let mut deleted_this_page = 0;
            for attempt in attempts {
                match attempt {
                    Ok(attempt) if attempt.record_deleted() => {
                        deleted_this_page += 1;
                        if attempt.object_missing() {
                            result.items_missing += 1;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if e.record_deleted() {
                            deleted_this_page += 1;
                        }
                        result.errors.push(e.to_string());
                    }
                }
            }
            result.items_cleaned += deleted_this_page;

            if deleted_this_page == 0 || (page_len as i64) < self.batch_size {
                break;
            }
        }

        if result.has_cleaned_items() {
            info!(
                deleted = result.items_cleaned,
                missing_objects = result.items_missing,
                "Swept retired image records"
            );
        }
        Ok(result)
    }
}

impl RetiredRecordCollector {
    pub fn new(
        repo: Arc<dyn ImageRecordRepository>,
        coordinator: RecordDeletionCoordinator,
        batch_size: i64,
        grace_period: Duration,
    ) -> Self {
        Self {
            repo,
            coordinator,
            batch_size,
            grace_period,
            batch_config: BatchConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::gc::collectors::test_utils::{hash, retired_record};
    use crate::application::locks::HashLocks;
    use crate::application::ports::{
        MockImageRecordRepository, MockStorageBackend, RepositoryError, StorageError,
    };

    fn collector(repo: MockImageRecordRepository, storage: MockStorageBackend) -> RetiredRecordCollector {
        let repo: Arc<dyn ImageRecordRepository> = Arc::new(repo);
        let coordinator =
            RecordDeletionCoordinator::new(Arc::clone(&repo), Arc::new(storage), HashLocks::new());
        RetiredRecordCollector::new(repo, coordinator, 100, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_collect_nothing_retired() {
        let mut repo = MockImageRecordRepository::new();
        repo.expect_find_orphaned().returning(|_, _| Ok(vec![]));
        repo.expect_delete_if_orphaned().never();

        let result = collector(repo, MockStorageBackend::new())
            .collect()
            .await
            .unwrap();
        assert_eq!(result.items_cleaned, 0);
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_collect_uses_grace_cutoff() {
        let mut repo = MockImageRecordRepository::new();
        repo.expect_find_orphaned()
            .withf(|retired_before, limit| {
                *limit == 100 && *retired_before <= Utc::now() - chrono::Duration::seconds(59)
            })
            .returning(|_, _| Ok(vec![retired_record('a', "posts/a.jpg")]));
        repo.expect_delete_if_orphaned()
            .withf(|_, retired_before| retired_before.is_some())
            .returning(|_, _| Ok(Some(retired_record('a', "posts/a.jpg"))));
        repo.expect_is_path_referenced().returning(|_| Ok(false));

        let mut storage = MockStorageBackend::new();
        storage.expect_delete().times(1).returning(|_| Ok(true));

        let result = collector(repo, storage).collect().await.unwrap();
        assert_eq!(result.items_cleaned, 1);
        assert_eq!(result.items_missing, 0);
    }

    #[tokio::test]
    async fn test_collect_skips_reactivated_and_reports_errors() {
        let mut repo = MockImageRecordRepository::new();
        repo.expect_find_orphaned().returning(|_, _| {
            Ok(vec![
                retired_record('a', "posts/a.jpg"),
                retired_record('b', "posts/b.jpg"),
                retired_record('c', "posts/c.jpg"),
            ])
        });
        repo.expect_delete_if_orphaned().returning(|content_hash, _| {
            if *content_hash == hash('a') {
                // Reactivated after the query
                Ok(None)
            } else {
                let c = content_hash.as_hex().chars().next().unwrap_or('0');
                Ok(Some(retired_record(c, &format!("posts/{}.jpg", c))))
            }
        });
        repo.expect_is_path_referenced().returning(|_| Ok(false));

        let mut storage = MockStorageBackend::new();
        storage.expect_delete().returning(|path| {
            if path == "posts/b.jpg" {
                Ok(false)
            } else {
                Err(StorageError::Backend("503".to_string()))
            }
        });

        let result = collector(repo, storage).collect().await.unwrap();
        assert_eq!(result.items_cleaned, 2);
        assert_eq!(result.items_missing, 1);
        assert_eq!(result.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_collect_drains_every_page() {
        let mut repo = MockImageRecordRepository::new();
        let mut pages = vec![
            vec![retired_record('5', "posts/5.jpg")],
            vec![retired_record('3', "posts/3.jpg"), retired_record('4', "posts/4.jpg")],
            vec![retired_record('1', "posts/1.jpg"), retired_record('2', "posts/2.jpg")],
        ];
        repo.expect_find_orphaned()
            .withf(|_, limit| *limit == 2)
            .times(3)
            .returning(move |_, _| Ok(pages.pop().unwrap_or_default()));
        repo.expect_delete_if_orphaned().returning(|content_hash, _| {
            let c = content_hash.as_hex().chars().next().unwrap_or('0');
            Ok(Some(retired_record(c, &format!("posts/{}.jpg", c))))
        });
        repo.expect_is_path_referenced().returning(|_| Ok(false));

        let mut storage = MockStorageBackend::new();
        storage.expect_delete().times(5).returning(|_| Ok(true));

        let repo: Arc<dyn ImageRecordRepository> = Arc::new(repo);
        let coordinator =
            RecordDeletionCoordinator::new(Arc::clone(&repo), Arc::new(storage), HashLocks::new());
        let collector = RetiredRecordCollector::new(repo, coordinator, 2, Duration::from_secs(60));

        let result = collector.collect().await.unwrap();
        assert_eq!(result.items_cleaned, 5);
    }

    #[tokio::test]
    async fn test_collect_stops_when_no_progress() {
        let mut repo = MockImageRecordRepository::new();
        repo.expect_find_orphaned().times(1).returning(|_, _| {
            Ok(vec![
                retired_record('a', "posts/a.jpg"),
                retired_record('b', "posts/b.jpg"),
            ])
        });
        repo.expect_delete_if_orphaned()
            .returning(|_, _| Err(RepositoryError::Internal("locked".to_string())));

        let repo: Arc<dyn ImageRecordRepository> = Arc::new(repo);
        let coordinator = RecordDeletionCoordinator::new(
            Arc::clone(&repo),
            Arc::new(MockStorageBackend::new()),
            HashLocks::new(),
        );
        let collector = RetiredRecordCollector::new(repo, coordinator, 2, Duration::from_secs(60));

        let result = collector.collect().await.unwrap();
        assert_eq!(result.items_cleaned, 0);
        assert_eq!(result.errors.len(), 2);
    }

    #[tokio::test]
    async fn test_query_failure_aborts_pass() {
        let mut repo = MockImageRecordRepository::new();
        repo.expect_find_orphaned()
            .returning(|_, _| Err(RepositoryError::Internal("down".to_string())));

        let err = collector(repo, MockStorageBackend::new())
            .collect()
            .await
            .unwrap_err();
        assert!(matches!(err, GcError::Query { .. }));
    }
}
