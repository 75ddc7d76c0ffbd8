mod config;
mod service;
mod similarity;

pub use config::{DedupConfig, LifecyclePolicy};
pub use service::DeduplicationService;
pub use similarity::{LinearScanSearch, SimilaritySearch};
