use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::Region;
use tracing::{debug, warn};

use crate::application::ports::{BackendKind, StorageBackend, StorageError, StoredObject};
use crate::domain::value_objects::CanonicalPath;
use crate::infrastructure::storage::path_normalizer::PathNormalizer;

/// Connection settings for an S3-compatible object store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    /// Base URL objects are publicly served from, when it differs from
    /// `endpoint/bucket`
    pub public_base_url: Option<String>,
}

/// Object store backend. Keys are canonical paths, unprefixed.
pub struct S3StorageBackend {
    bucket: Box<Bucket>,
    normalizer: PathNormalizer,
    settings: S3Settings,
}

impl S3StorageBackend {
    pub fn new(settings: S3Settings) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: settings.region.clone(),
            endpoint: settings.endpoint.clone(),
        };
        let credentials = Credentials::new(
            Some(&settings.access_key),
            Some(&settings.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("invalid credentials: {}", e)))?;

        let bucket = Bucket::new(&settings.bucket, region, credentials)
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .with_path_style();

        let mut normalizer = PathNormalizer::new()
            .with_bucket(settings.bucket.clone())
            .with_endpoint(settings.endpoint.clone());
        if let Some(base) = &settings.public_base_url {
            normalizer = normalizer.with_public_base(base.clone());
        }

        Ok(Self {
            bucket,
            normalizer,
            settings,
        })
    }

    pub fn settings(&self) -> &S3Settings {
        &self.settings
    }

    fn key(&self, path: &str) -> Result<CanonicalPath, StorageError> {
        let canonical = self.normalizer.normalize(path);
        if canonical.is_empty() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(canonical)
    }
}

fn backend_error(op: &str, key: &CanonicalPath, e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(format!("{} {} failed: {}", op, key, e))
}

fn status_error(op: &str, key: &CanonicalPath, status: u16) -> StorageError {
    StorageError::Backend(format!("{} {} returned HTTP {}", op, key, status))
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[async_trait]
impl StorageBackend for S3StorageBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    async fn upload(
        &self,
        bytes: Bytes,
        folder: &str,
        filename: &str,
        content_type: &str,
    ) -> Result<CanonicalPath, StorageError> {
        if filename.is_empty() || filename.contains(['/', '\\']) {
            return Err(StorageError::InvalidPath(filename.to_string()));
        }

        let folder = self.normalizer.normalize(folder);
        let key = self.key(CanonicalPath::join(folder.as_str(), filename).as_str())?;

        let response = self
            .bucket
            .put_object_with_content_type(key.as_str(), &bytes, content_type)
            .await
            .map_err(|e| backend_error("PUT", &key, e))?;

        if !is_success(response.status_code()) {
            return Err(status_error("PUT", &key, response.status_code()));
        }

        debug!(key = %key, size = bytes.len(), "Object uploaded");
        Ok(key)
    }

    async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        let key = self.key(path)?;
        let response = self
            .bucket
            .get_object(key.as_str())
            .await
            .map_err(|e| backend_error("GET", &key, e))?;

        match response.status_code() {
            404 => Err(StorageError::NotFound(key.to_string())),
            status if is_success(status) => Ok(Bytes::copy_from_slice(response.bytes())),
            status => Err(status_error("GET", &key, status)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let key = self.key(path)?;
        match self.bucket.head_object(key.as_str()).await {
            Ok((_, status)) if is_success(status) => Ok(true),
            Ok((_, 404)) => Ok(false),
            Ok((_, status)) => Err(status_error("HEAD", &key, status)),
            Err(e) => Err(backend_error("HEAD", &key, e)),
        }
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        let key = self.key(path)?;

        // DELETE succeeds for absent keys, so check with HEAD first to report absence
        if !self.exists(key.as_str()).await? {
            return Ok(false);
        }

        let response = self
            .bucket
            .delete_object(key.as_str())
            .await
            .map_err(|e| backend_error("DELETE", &key, e))?;

        match response.status_code() {
            404 => Ok(false),
            status if is_success(status) => {
                debug!(key = %key, "Object deleted");
                Ok(true)
            }
            status => Err(status_error("DELETE", &key, status)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        let prefix = self.normalizer.normalize(prefix);
        let pages = self
            .bucket
            .list(prefix.to_string(), None)
            .await
            .map_err(|e| backend_error("LIST", &prefix, e))?;

        let mut objects = Vec::new();
        for page in pages {
            for entry in page.contents {
                let path = CanonicalPath::from_relative(&entry.key);
                if path.is_empty() || !path.starts_with(&prefix) {
                    continue;
                }
                let last_modified = match DateTime::parse_from_rfc3339(&entry.last_modified) {
                    Ok(t) => Some(t.with_timezone(&Utc)),
                    Err(e) => {
                        warn!(key = %entry.key, error = %e, "Unparseable LastModified");
                        None
                    }
                };
                objects.push(StoredObject {
                    path,
                    size_bytes: entry.size,
                    last_modified,
                });
            }
        }

        objects.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(objects)
    }

    fn normalize(&self, path: &str) -> CanonicalPath {
        self.normalizer.normalize(path)
    }

    fn url_for(&self, path: &str) -> String {
        let canonical = self.normalizer.normalize(path);
        match self.normalizer.public_base() {
            Some(base) => format!("{}/{}", base, canonical),
            None => format!(
                "{}/{}/{}",
                self.settings.endpoint.trim_end_matches('/'),
                self.settings.bucket,
                canonical
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(public_base_url: Option<&str>) -> S3Settings {
        S3Settings {
            endpoint: "http://localhost:9000".to_string(),
            region: "us-east-1".to_string(),
            bucket: "media".to_string(),
            access_key: "minio".to_string(),
            secret_key: "minio-secret".to_string(),
            public_base_url: public_base_url.map(str::to_string),
        }
    }

    #[test]
    fn test_url_for_falls_back_to_endpoint_and_bucket() {
        let backend = S3StorageBackend::new(settings(None)).unwrap();
        assert_eq!(
            backend.url_for("/uploads/posts/a.jpg"),
            "http://localhost:9000/media/posts/a.jpg"
        );
        assert_eq!(backend.kind(), BackendKind::ObjectStore);
    }

    #[test]
    fn test_url_for_prefers_public_base() {
        let backend = S3StorageBackend::new(settings(Some("https://cdn.example.com/"))).unwrap();
        assert_eq!(
            backend.url_for("posts/a.jpg"),
            "https://cdn.example.com/posts/a.jpg"
        );
    }

    #[test]
    fn test_urls_normalize_back() {
        for public in [None, Some("https://cdn.example.com/media-public")] {
            let backend = S3StorageBackend::new(settings(public)).unwrap();
            for path in ["posts/a.jpg", "profiles/7/b.png", "media/c.gif"] {
                let url = backend.url_for(path);
                assert_eq!(backend.normalize(&url).as_str(), path, "url: {}", url);
            }
        }
    }

    #[test]
    fn test_key_rejects_empty_paths() {
        let backend = S3StorageBackend::new(settings(None)).unwrap();
        assert!(matches!(backend.key("/uploads/"), Err(StorageError::InvalidPath(_))));
        assert!(matches!(
            backend.key("http://localhost:9000/media"),
            Err(StorageError::InvalidPath(_))
        ));
    }
}
