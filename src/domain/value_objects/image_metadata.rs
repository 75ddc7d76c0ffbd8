use serde::{Deserialize, Serialize};

/// Raster properties extracted from decodable image bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    /// Lowercase container format, e.g. `png`, `jpeg`
    pub format: String,
    /// Pixel layout as reported by the decoder, e.g. `rgb8`, `rgba8`, `l8`
    pub color_mode: String,
}

/// Descriptive fields captured when a record is created or reactivated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDescriptor {
    pub original_filename: String,
    pub mime_type: String,
    pub byte_size: u64,
    /// Free-form tag describing the use, e.g. `profile` or `post`
    pub upload_context: String,
    pub uploader_id: i64,
}
