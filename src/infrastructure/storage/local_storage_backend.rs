use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::ports::{BackendKind, StorageBackend, StorageError, StoredObject};
use crate::domain::value_objects::CanonicalPath;
use crate::infrastructure::storage::path_normalizer::{PathNormalizer, LOCAL_MOUNT};

const TEMP_DIR: &str = ".tmp";

/// Filesystem backend rooted at the directory served under `/uploads`
pub struct LocalStorageBackend {
    root: PathBuf,
    normalizer: PathNormalizer,
    durable_writes: bool,
}

impl LocalStorageBackend {
    pub fn new(root: PathBuf) -> Self {
        Self::with_durability(root, true)
    }

    pub fn with_durability(root: PathBuf, durable_writes: bool) -> Self {
        Self {
            root,
            normalizer: PathNormalizer::new(),
            durable_writes,
        }
    }

    /// Create the root and temp directories
    pub async fn init(&self) -> Result<(), StorageError> {
        fs::create_dir_all(self.root.join(TEMP_DIR)).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<(CanonicalPath, PathBuf), StorageError> {
        let canonical = self.normalizer.normalize(path);
        if canonical.is_empty() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        let full = canonical
            .as_str()
            .split('/')
            .fold(self.root.clone(), |acc, segment| acc.join(segment));
        Ok((canonical, full))
    }

    async fn write_temp(&self, temp_path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let mut file = File::create(temp_path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        if self.durable_writes {
            file.sync_all().await?;
        }
        Ok(())
    }

    async fn sync_parent(&self, final_path: &Path) {
        let Some(parent) = final_path.parent() else {
            return;
        };
        match File::open(parent).await {
            Ok(dir) => {
                if let Err(e) = dir.sync_all().await {
                    warn!("Failed to sync parent directory after rename: {}", e);
                }
            }
            Err(e) => warn!("Failed to open parent directory for sync: {}", e),
        }
    }

    /// Walk `start` depth-first, skipping dot entries such as the temp dir
    async fn collect_files(&self, start: PathBuf) -> Result<Vec<StoredObject>, StorageError> {
        let mut objects = Vec::new();
        let mut pending = vec![start];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Io(e)),
            };

            while let Some(entry) = entries.next_entry().await? {
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }

                let path = entry.path();
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                objects.push(StoredObject {
                    path: CanonicalPath::from_relative(&relative.to_string_lossy()),
                    size_bytes: metadata.len(),
                    last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                });
            }
        }

        Ok(objects)
    }
}

fn not_found_or_io(path: &CanonicalPath, e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(path.to_string())
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn upload(
        &self,
        bytes: Bytes,
        folder: &str,
        filename: &str,
        _content_type: &str,
    ) -> Result<CanonicalPath, StorageError> {
        if filename.is_empty() || filename.contains(['/', '\\']) {
            return Err(StorageError::InvalidPath(filename.to_string()));
        }

        let folder = self.normalizer.normalize(folder);
        let (canonical, final_path) =
            self.resolve(CanonicalPath::join(folder.as_str(), filename).as_str())?;

        let temp_path = self.root.join(TEMP_DIR).join(Uuid::new_v4().to_string());
        debug!(path = %canonical, "Writing image to temp file: {:?}", temp_path);

        if let Err(e) = self.write_temp(&temp_path, &bytes).await {
            warn!("Failed to write temp file {:?}: {}", temp_path, e);
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        if let Some(parent) = final_path.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                let _ = fs::remove_file(&temp_path).await;
                return Err(StorageError::Io(e));
            }
        }

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }

        if self.durable_writes {
            self.sync_parent(&final_path).await;
        }

        debug!(path = %canonical, size = bytes.len(), "Image stored");
        Ok(canonical)
    }

    async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        let (canonical, full) = self.resolve(path)?;
        let data = fs::read(&full)
            .await
            .map_err(|e| not_found_or_io(&canonical, e))?;
        Ok(Bytes::from(data))
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let (_, full) = self.resolve(path)?;
        Ok(fs::metadata(&full).await.is_ok())
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        let (canonical, full) = self.resolve(path)?;
        match fs::remove_file(&full).await {
            Ok(()) => {
                debug!(path = %canonical, "Image file deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let prefix = self.normalizer.normalize(prefix);
        let start = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.resolve(prefix.as_str())?.1
        };

        let mut objects = self.collect_files(start).await?;
        objects.retain(|object| object.path.starts_with(&prefix));
        objects.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(objects)
    }

    fn normalize(&self, path: &str) -> CanonicalPath {
        self.normalizer.normalize(path)
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", LOCAL_MOUNT, self.normalizer.normalize(path))
    }
}
