use std::future::Future;

use futures_util::stream::{self, StreamExt};

/// Configuration for batch processing operations
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Items processed concurrently.
    ///
    /// Each in-flight item holds a per-hash lock and a storage request, so
    /// this also bounds the sweeper's load on the backends.
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrency: 10 }
    }
}

/// Result of processing a single item in a batch
#[derive(Debug)]
pub struct BatchItemResult<T, R = ()> {
    pub item: T,
    pub result: R,
}

/// Processes a collection of items with bounded concurrency.
///
/// ```rust,ignore
/// let results = BatchProcessor::process_concurrent(
///     records,
///     &BatchConfig::default(),
///     |record| async move { coordinator.delete(&record).await },
/// )
/// .await;
/// ```
pub struct BatchProcessor;

impl BatchProcessor {
    /// Results come back in completion order, not input order
    pub async fn process_concurrent<F, Fut, T, R>(
        items: Vec<T>,
        config: &BatchConfig,
        processor: F,
    ) -> Vec<BatchItemResult<T, R>>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = R>,
        T: Clone,
    {
        stream::iter(items)
            .map(|item| {
                let fut = processor(item.clone());
                async move {
                    let result = fut.await;
                    BatchItemResult { item, result }
                }
            })
            .buffer_unordered(config.max_concurrency.max(1))
            .collect()
            .await
    }
}
