mod in_memory_image_record_repository;
mod postgres_image_record_repository;
mod query_builder;

pub use in_memory_image_record_repository::InMemoryImageRecordRepository;
pub use postgres_image_record_repository::PostgresImageRecordRepository;
pub use query_builder::QueryBuilder;
