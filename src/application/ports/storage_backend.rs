use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::{automock, predicate::*};
use thiserror::Error;

use crate::domain::value_objects::CanonicalPath;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Object store error: {0}")]
    Backend(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    ObjectStore,
}

/// Listing entry for reconciliation sweeps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: CanonicalPath,
    pub size_bytes: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Port for physical image storage.
///
/// Every method accepting a `path` normalizes it first, so legacy locations
/// from old rows resolve the same as canonical ones.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Write bytes under `folder/filename` and return the canonical path
    async fn upload(
        &self,
        bytes: Bytes,
        folder: &str,
        filename: &str,
        content_type: &str,
    ) -> Result<CanonicalPath, StorageError>;

    async fn read(&self, path: &str) -> Result<Bytes, StorageError>;

    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// `Ok(false)` when nothing was stored at `path`
    async fn delete(&self, path: &str) -> Result<bool, StorageError>;

    /// Objects stored under `prefix` (empty prefix lists everything)
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError>;

    /// Collapse any historical representation into the canonical path
    fn normalize(&self, path: &str) -> CanonicalPath;

    /// Externally consumable location of `path`
    fn url_for(&self, path: &str) -> String;
}
