mod image_decoder;
mod image_record_repository;
mod storage_backend;

pub use image_decoder::{DecodeError, ImageDecoder, RasterHandle};
pub use image_record_repository::{ImageRecordRepository, InsertOutcome, RepositoryError};
pub use storage_backend::{BackendKind, StorageBackend, StorageError, StoredObject};

#[cfg(test)]
pub use image_decoder::MockImageDecoder;
#[cfg(test)]
pub use image_record_repository::MockImageRecordRepository;
#[cfg(test)]
pub use storage_backend::MockStorageBackend;
