use async_trait::async_trait;

use super::errors::GcResult;

/// One reconciliation step of a sweep.
///
/// Implementations must be idempotent: running a collector twice in a row
/// removes nothing the first pass did not already consider.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Unique snake_case name used for logging and result routing
    fn name(&self) -> &'static str;

    /// Run one pass. Per-item failures go into the returned result; `Err` is
    /// reserved for failures that stop the pass altogether.
    async fn collect(&self) -> GcResult<CollectionResult>;
}

/// Outcome of a single collector pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionResult {
    pub collector_name: String,
    pub items_cleaned: usize,
    /// Cleaned items whose storage object was already gone
    pub items_missing: usize,
    pub errors: Vec<String>,
}

impl CollectionResult {
    pub fn new(collector_name: impl Into<String>) -> Self {
        Self {
            collector_name: collector_name.into(),
            ..Self::default()
        }
    }

    pub fn success(collector_name: impl Into<String>, items_cleaned: usize) -> Self {
        Self {
            collector_name: collector_name.into(),
            items_cleaned,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_cleaned_items(&self) -> bool {
        self.items_cleaned > 0
    }
}
