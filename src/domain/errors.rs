use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Content hash mismatch: expected {expected}, got {actual}")]
    ContentHashMismatch { expected: String, actual: String },

    #[error("Invalid perceptual hash: {0}")]
    InvalidPerceptualHash(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Image record is retired: {0}")]
    RecordRetired(String),

    #[error("Image record is still referenced: {0}")]
    RecordActive(String),

    #[error("Reference count cannot be negative: {0}")]
    NegativeReferenceCount(i64),
}
