use std::any::Any;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::domain::value_objects::{ImageMetadata, PerceptualHash};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unrecognized image format")]
    UnknownFormat,

    #[error("Image decoding failed: {0}")]
    Malformed(String),
}

/// Decoded raster plus its metadata. The pixel data is opaque to the
/// application layer; only the decoder that produced it reads it back.
#[derive(Clone)]
pub struct RasterHandle {
    metadata: ImageMetadata,
    raster: Arc<dyn Any + Send + Sync>,
}

impl RasterHandle {
    pub fn new(metadata: ImageMetadata, raster: Arc<dyn Any + Send + Sync>) -> Self {
        Self { metadata, raster }
    }

    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    pub fn raster<T: Any>(&self) -> Option<&T> {
        self.raster.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for RasterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterHandle")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Port for raster decoding and perceptual hashing
#[cfg_attr(test, automock)]
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<RasterHandle, DecodeError>;

    fn perceptual_hash(&self, raster: &RasterHandle) -> PerceptualHash;
}
