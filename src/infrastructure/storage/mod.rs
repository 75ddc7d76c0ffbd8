mod local_storage_backend;
mod path_normalizer;
mod s3_storage_backend;

pub use local_storage_backend::LocalStorageBackend;
pub use path_normalizer::{PathNormalizer, LOCAL_MOUNT};
pub use s3_storage_backend::{S3Settings, S3StorageBackend};
