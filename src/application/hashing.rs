use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::application::ports::ImageDecoder;
use crate::domain::value_objects::{ContentHash, ImageMetadata, PerceptualHash};

/// Everything the orchestrator needs to know about a byte buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFingerprint {
    pub content_hash: ContentHash,
    /// `None` when the bytes are not a decodable raster
    pub perceptual_hash: Option<PerceptualHash>,
    pub metadata: Option<ImageMetadata>,
}

/// Result of decoding a buffer once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RasterAnalysis {
    pub perceptual_hash: Option<PerceptualHash>,
    pub metadata: Option<ImageMetadata>,
}

/// Computes the exact-match and similarity keys for raw image bytes.
///
/// The exact key is SHA-256 over the raw bytes, so any single-bit change
/// produces a different hash. The similarity key comes from the injected
/// [`ImageDecoder`]; bytes it cannot decode simply have no perceptual hash.
///
/// All methods are CPU-bound and synchronous. Async callers run them on the
/// blocking pool.
pub struct ContentHasher {
    decoder: Arc<dyn ImageDecoder>,
}

impl ContentHasher {
    pub fn new(decoder: Arc<dyn ImageDecoder>) -> Self {
        Self { decoder }
    }

    /// SHA-256 of the raw bytes
    pub fn exact_digest(bytes: &[u8]) -> ContentHash {
        let digest: [u8; 32] = Sha256::digest(bytes).into();
        ContentHash::from_sha256(digest)
    }

    pub fn perceptual_digest(&self, bytes: &[u8]) -> Option<PerceptualHash> {
        let raster = self.decoder.decode(bytes).ok()?;
        Some(self.decoder.perceptual_hash(&raster)).filter(|h| !h.is_empty())
    }

    pub fn metadata(&self, bytes: &[u8]) -> Option<ImageMetadata> {
        self.decoder
            .decode(bytes)
            .ok()
            .map(|raster| raster.metadata().clone())
    }

    /// Perceptual digest and metadata from a single decode
    pub fn analyze(&self, bytes: &[u8]) -> RasterAnalysis {
        match self.decoder.decode(bytes) {
            Ok(raster) => RasterAnalysis {
                perceptual_hash: Some(self.decoder.perceptual_hash(&raster))
                    .filter(|h| !h.is_empty()),
                metadata: Some(raster.metadata().clone()),
            },
            Err(e) => {
                debug!(
                    error = %e,
                    byte_size = bytes.len(),
                    "Bytes are not a decodable raster, skipping perceptual hash"
                );
                RasterAnalysis::default()
            }
        }
    }

    /// Exact digest plus [`ContentHasher::analyze`]
    pub fn fingerprint(&self, bytes: &[u8]) -> ImageFingerprint {
        let RasterAnalysis {
            perceptual_hash,
            metadata,
        } = self.analyze(bytes);

        ImageFingerprint {
            content_hash: Self::exact_digest(bytes),
            perceptual_hash,
            metadata,
        }
    }
}
