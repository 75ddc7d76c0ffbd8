//! Shared test fixtures and utilities for all test types

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use tempfile::TempDir;

use pixeldedup::application::dedup::{DedupConfig, DeduplicationService, LifecyclePolicy};
use pixeldedup::application::dto::{IngestRequest, StoreRequest};
use pixeldedup::application::hashing::ContentHasher;
use pixeldedup::application::ports::{ImageRecordRepository, StorageBackend};
use pixeldedup::infrastructure::{
    imaging::ImageCrateDecoder, persistence::InMemoryImageRecordRepository,
    storage::LocalStorageBackend,
};

/// Service wired to an in-memory record store and a temp upload directory
pub struct TestEnvironment {
    pub service: DeduplicationService,
    pub repo: Arc<InMemoryImageRecordRepository>,
    pub storage: Arc<LocalStorageBackend>,
    pub upload_dir: TempDir,
}

impl TestEnvironment {
    pub async fn new(lifecycle: LifecyclePolicy) -> Self {
        let repo = Arc::new(InMemoryImageRecordRepository::new());
        let upload_dir = TempDir::new().expect("Failed to create temp upload dir");
        let storage = Arc::new(LocalStorageBackend::with_durability(
            upload_dir.path().to_path_buf(),
            false,
        ));
        storage.init().await.expect("Failed to init storage");

        let service = DeduplicationService::new(
            Arc::clone(&repo) as Arc<dyn ImageRecordRepository>,
            Arc::clone(&storage) as Arc<dyn StorageBackend>,
            Arc::new(ContentHasher::new(Arc::new(ImageCrateDecoder::new()))),
            DedupConfig::default().with_lifecycle(lifecycle),
        );

        Self {
            service,
            repo,
            storage,
            upload_dir,
        }
    }

    /// Deferred policy whose grace window has always elapsed
    pub async fn deferred_without_grace() -> Self {
        Self::new(LifecyclePolicy::Deferred {
            grace_period: Duration::ZERO,
        })
        .await
    }

    /// Write `bytes` to a fresh path the way a caller would before `store`
    pub async fn write_upload(&self, folder: &str, name: &str, bytes: &Bytes) -> String {
        self.storage
            .upload(bytes.clone(), folder, name, "image/png")
            .await
            .expect("Failed to write upload")
            .to_string()
    }

    /// Number of files under the upload root, temp files excluded
    pub async fn stored_object_count(&self) -> usize {
        self.storage.list("").await.expect("Failed to list").len()
    }
}

/// Test data factories
pub mod factories {
    use super::*;

    /// Horizontal gradient; `invert` flips its direction
    pub fn gradient_png(width: u32, height: u32, invert: bool) -> Bytes {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, _| {
            let v = (x * 255 / width.max(1)) as u8;
            let v = if invert { 255 - v } else { v };
            Rgb([v, v, v])
        }));
        encode_png(&img)
    }

    /// Solid color image, distinct bytes per color
    pub fn solid_png(color: [u8; 3]) -> Bytes {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(16, 16, Rgb(color)));
        encode_png(&img)
    }

    pub fn encode_png(img: &DynamicImage) -> Bytes {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png)
            .expect("Failed to encode PNG");
        Bytes::from(out.into_inner())
    }

    pub fn ingest_request(bytes: Bytes, folder: &str, context: &str, uploader_id: i64) -> IngestRequest {
        IngestRequest {
            bytes,
            original_filename: "photo.png".to_string(),
            folder: folder.to_string(),
            mime_type: "image/png".to_string(),
            context: context.to_string(),
            uploader_id,
        }
    }

    pub fn store_request(bytes: Bytes, hint: &str, context: &str, uploader_id: i64) -> StoreRequest {
        StoreRequest {
            bytes,
            original_filename: "photo.png".to_string(),
            canonical_path_hint: hint.to_string(),
            mime_type: "image/png".to_string(),
            context: context.to_string(),
            uploader_id,
        }
    }
}
