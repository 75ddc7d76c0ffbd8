pub mod batch_processor;
pub mod collector;
pub mod errors;
pub mod record_deletion_coordinator;
pub mod retired_record_collector;
pub mod stray_object_collector;
#[cfg(test)]
pub mod test_utils;

pub use batch_processor::{BatchConfig, BatchItemResult, BatchProcessor};
pub use collector::{CollectionResult, Collector};
pub use errors::{GcError, GcResult, ObjectDeletionError};
pub use record_deletion_coordinator::{RecordDeletionAttempt, RecordDeletionCoordinator};
pub use retired_record_collector::RetiredRecordCollector;
pub use stray_object_collector::StrayObjectCollector;
