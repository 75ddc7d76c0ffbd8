//! # pixeldedup - Image deduplication and reference-counted storage
//!
//! Every user-supplied image passes through this subsystem before it is
//! persisted. Byte-identical uploads share one stored object, near-identical
//! images can be found by perceptual hash, and storage is reclaimed once the
//! last owner of an image goes away.
//!
//! ## Architecture Layers
//!
//! - **Domain**: records, content and perceptual hashes, canonical paths
//! - **Application**: the deduplication service, the orphan sweeper and ports
//! - **Infrastructure**: local and S3 storage, Postgres and in-memory records,
//!   `image` crate decoding
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use pixeldedup::application::{
//!     dedup::{DedupConfig, DeduplicationService},
//!     dto::IngestRequest,
//!     hashing::ContentHasher,
//! };
//! use pixeldedup::infrastructure::{
//!     imaging::ImageCrateDecoder,
//!     persistence::InMemoryImageRecordRepository,
//!     storage::LocalStorageBackend,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = LocalStorageBackend::new("./uploads".into());
//! storage.init().await?;
//!
//! let service = DeduplicationService::new(
//!     Arc::new(InMemoryImageRecordRepository::new()),
//!     Arc::new(storage),
//!     Arc::new(ContentHasher::new(Arc::new(ImageCrateDecoder::new()))),
//!     DedupConfig::default(),
//! );
//!
//! let stored = service
//!     .ingest(IngestRequest {
//!         bytes: std::fs::read("photo.jpg")?.into(),
//!         original_filename: "photo.jpg".to_string(),
//!         folder: "posts".to_string(),
//!         mime_type: "image/jpeg".to_string(),
//!         context: "post".to_string(),
//!         uploader_id: 7,
//!     })
//!     .await?;
//! println!("stored at {}", stored.record.canonical_path());
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{dedup, dto, gc, ports};
pub use config::Config;
pub use domain::errors as domain_errors;
pub use domain::{entities, value_objects};
