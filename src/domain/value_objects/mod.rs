mod canonical_path;
mod content_hash;
mod image_metadata;
mod perceptual_hash;
mod stored_filename;

pub use canonical_path::{CanonicalPath, LEGACY_UPLOADS_SEGMENT};
pub use content_hash::ContentHash;
pub use image_metadata::{ImageMetadata, UploadDescriptor};
pub use perceptual_hash::PerceptualHash;
pub use stored_filename::{file_extension, unique_filename};
