use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::info;

use crate::application::dedup::DeduplicationService;
use crate::application::hashing::ContentHasher;
use crate::application::ports::{ImageDecoder, ImageRecordRepository, StorageBackend, StorageError};
use crate::config::{Config, ConfigError, StorageConfig};
use crate::infrastructure::{
    imaging::ImageCrateDecoder,
    persistence::{InMemoryImageRecordRepository, PostgresImageRecordRepository},
    storage::{LocalStorageBackend, S3StorageBackend},
};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Storage setup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("{0} not initialized")]
    Missing(&'static str),
}

/// Wired-up subsystem
#[derive(Clone)]
pub struct Application {
    pub service: Arc<DeduplicationService>,
    pub repository: Arc<dyn ImageRecordRepository>,
    pub storage: Arc<dyn StorageBackend>,
    pub pool: Option<sqlx::PgPool>,
}

/// Application builder for clean dependency injection and setup
pub struct ApplicationBuilder {
    config: Config,
    pool: Option<sqlx::PgPool>,
    repository: Option<Arc<dyn ImageRecordRepository>>,
    storage: Option<Arc<dyn StorageBackend>>,
    decoder: Option<Arc<dyn ImageDecoder>>,
}

impl ApplicationBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            pool: None,
            repository: None,
            storage: None,
            decoder: None,
        }
    }

    /// Connect to Postgres with retry and run migrations. Without a
    /// `DATABASE_URL` the in-memory repository is used instead.
    pub async fn with_database(mut self) -> Result<Self, BuildError> {
        let Some(database_url) = self.config.database_url.clone() else {
            info!("DATABASE_URL not set, using in-memory image records");
            self.repository = Some(Arc::new(InMemoryImageRecordRepository::new()));
            return Ok(self);
        };

        info!(
            max_connections = self.config.db_max_connections,
            "Connecting to database"
        );

        let mut retries = 3;
        let mut delay = Duration::from_secs(1);
        let pool = loop {
            match PgPoolOptions::new()
                .max_connections(self.config.db_max_connections)
                .connect(&database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) if retries > 0 => {
                    retries -= 1;
                    tracing::warn!(
                        "Database connection failed, retrying in {:?} ({} retries left): {}",
                        delay,
                        retries,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    tracing::error!("Failed to connect to database after retries: {}", e);
                    return Err(BuildError::Database(e));
                }
            }
        };

        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            e
        })?;

        self.repository = Some(Arc::new(PostgresImageRecordRepository::new(pool.clone())));
        self.pool = Some(pool);
        Ok(self)
    }

    /// Construct the storage backend selected by the environment
    pub async fn with_storage(mut self) -> Result<Self, BuildError> {
        let storage: Arc<dyn StorageBackend> = match self.config.storage_config() {
            StorageConfig::Local { root } => {
                info!(root = %root.display(), "Using local image storage");
                let backend = LocalStorageBackend::new(root);
                backend.init().await?;
                Arc::new(backend)
            }
            StorageConfig::ObjectStore(settings) => {
                info!(
                    endpoint = %settings.endpoint,
                    bucket = %settings.bucket,
                    "Using object storage"
                );
                Arc::new(S3StorageBackend::new(settings)?)
            }
        };

        self.storage = Some(storage);
        Ok(self)
    }

    pub fn with_repository(mut self, repository: Arc<dyn ImageRecordRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_storage_backend(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Replace the default `image` crate decoder
    pub fn with_decoder(mut self, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn build(self) -> Result<Application, BuildError> {
        let repository = self.repository.ok_or(BuildError::Missing("Image record repository"))?;
        let storage = self.storage.ok_or(BuildError::Missing("Storage backend"))?;
        let decoder = self
            .decoder
            .unwrap_or_else(|| Arc::new(ImageCrateDecoder::new()));

        let service = Arc::new(DeduplicationService::new(
            Arc::clone(&repository),
            Arc::clone(&storage),
            Arc::new(ContentHasher::new(decoder)),
            self.config.dedup_config(),
        ));

        info!(
            lifecycle = ?self.config.lifecycle_policy(),
            "Deduplication service initialized"
        );

        Ok(Application {
            service,
            repository,
            storage,
            pool: self.pool,
        })
    }

    /// Get configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
