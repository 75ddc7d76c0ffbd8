use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::application::dedup::{DedupConfig, LifecyclePolicy};
use crate::application::gc::SweeperConfig;
use crate::infrastructure::storage::S3Settings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which physical store holds image bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Local { root: PathBuf },
    ObjectStore(S3Settings),
}

/// Process configuration. Field names mirror the environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: String,
    pub upload_path: PathBuf,
    pub s3_endpoint_url: Option<String>,
    pub s3_region: String,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_public_url: Option<String>,
    /// In-memory records when unset
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// `immediate` or `deferred`
    pub retirement_policy: String,
    pub retirement_grace_secs: u64,
    pub sweep_interval_secs: u64,
    pub sweep_batch_size: i64,
    pub similarity_threshold: u32,
    pub stray_sweep_enabled: bool,
    pub stray_object_min_age_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            upload_path: PathBuf::from("./uploads"),
            s3_endpoint_url: None,
            s3_region: "us-east-1".to_string(),
            s3_access_key_id: None,
            s3_secret_access_key: None,
            s3_bucket: None,
            s3_public_url: None,
            database_url: None,
            db_max_connections: 10,
            retirement_policy: "deferred".to_string(),
            retirement_grace_secs: 3600,
            sweep_interval_secs: 300,
            sweep_batch_size: 100,
            similarity_threshold: 5,
            stray_sweep_enabled: false,
            stray_object_min_age_hours: 24,
        }
    }
}

fn parsed<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparseable values keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),
            upload_path: lookup("UPLOAD_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_path),
            s3_endpoint_url: non_blank(lookup("S3_ENDPOINT_URL")),
            s3_region: non_blank(lookup("S3_REGION")).unwrap_or(defaults.s3_region),
            s3_access_key_id: non_blank(lookup("S3_ACCESS_KEY_ID")),
            s3_secret_access_key: non_blank(lookup("S3_SECRET_ACCESS_KEY")),
            s3_bucket: non_blank(lookup("S3_BUCKET")),
            s3_public_url: non_blank(lookup("S3_PUBLIC_URL")),
            database_url: non_blank(lookup("DATABASE_URL")),
            db_max_connections: parsed(lookup("DB_MAX_CONNECTIONS"), defaults.db_max_connections),
            retirement_policy: lookup("RETIREMENT_POLICY")
                .map(|s| s.trim().to_lowercase())
                .unwrap_or(defaults.retirement_policy),
            retirement_grace_secs: parsed(
                lookup("RETIREMENT_GRACE_SECS"),
                defaults.retirement_grace_secs,
            ),
            sweep_interval_secs: parsed(lookup("SWEEP_INTERVAL_SECS"), defaults.sweep_interval_secs),
            sweep_batch_size: parsed(lookup("SWEEP_BATCH_SIZE"), defaults.sweep_batch_size),
            similarity_threshold: parsed(
                lookup("SIMILARITY_THRESHOLD"),
                defaults.similarity_threshold,
            ),
            stray_sweep_enabled: parsed(lookup("STRAY_SWEEP_ENABLED"), defaults.stray_sweep_enabled),
            stray_object_min_age_hours: parsed(
                lookup("STRAY_OBJECT_MIN_AGE_HOURS"),
                defaults.stray_object_min_age_hours,
            ),
        }
    }

    /// Load from a TOML file whose keys are the lowercase variable names
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// `production` and `prod` select the object store
    pub fn is_production(&self) -> bool {
        matches!(
            self.environment.trim().to_lowercase().as_str(),
            "production" | "prod"
        )
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return invalid("DATABASE_URL must start with postgres:// or postgresql://");
            }
            if self.db_max_connections == 0 {
                return invalid("DB_MAX_CONNECTIONS must be at least 1");
            }
        }

        if self.is_production() {
            if self.s3_bucket.is_none() {
                return invalid("S3_BUCKET is required in production");
            }
            match &self.s3_endpoint_url {
                None => return invalid("S3_ENDPOINT_URL is required in production"),
                Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                    return invalid("S3_ENDPOINT_URL must be an http(s) URL");
                }
                Some(_) => {}
            }
            if self.s3_access_key_id.is_none() || self.s3_secret_access_key.is_none() {
                return invalid("S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY are required in production");
            }
        } else if self.upload_path.as_os_str().is_empty() {
            return invalid("UPLOAD_PATH cannot be empty");
        }

        if !matches!(self.retirement_policy.as_str(), "immediate" | "deferred") {
            return invalid("RETIREMENT_POLICY must be immediate or deferred");
        }

        if self.sweep_interval_secs < 10 {
            return invalid("SWEEP_INTERVAL_SECS must be at least 10 seconds");
        }

        if self.sweep_batch_size < 1 || self.sweep_batch_size > 1000 {
            return invalid("SWEEP_BATCH_SIZE must be between 1 and 1000");
        }

        Ok(())
    }

    pub fn storage_config(&self) -> StorageConfig {
        if !self.is_production() {
            return StorageConfig::Local {
                root: self.upload_path.clone(),
            };
        }

        StorageConfig::ObjectStore(S3Settings {
            endpoint: self.s3_endpoint_url.clone().unwrap_or_default(),
            region: self.s3_region.clone(),
            bucket: self.s3_bucket.clone().unwrap_or_default(),
            access_key: self.s3_access_key_id.clone().unwrap_or_default(),
            secret_key: self.s3_secret_access_key.clone().unwrap_or_default(),
            public_base_url: self.s3_public_url.clone(),
        })
    }

    pub fn lifecycle_policy(&self) -> LifecyclePolicy {
        match self.retirement_policy.as_str() {
            "immediate" => LifecyclePolicy::Immediate,
            _ => LifecyclePolicy::Deferred {
                grace_period: Duration::from_secs(self.retirement_grace_secs),
            },
        }
    }

    pub fn dedup_config(&self) -> DedupConfig {
        let mut sweeper = SweeperConfig::new(
            Duration::from_secs(self.sweep_interval_secs),
            self.sweep_batch_size,
            Duration::from_secs(self.retirement_grace_secs),
        );
        if self.stray_sweep_enabled {
            sweeper = sweeper.with_stray_sweep(Duration::from_secs(
                self.stray_object_min_age_hours * 3600,
            ));
        }

        DedupConfig {
            lifecycle: self.lifecycle_policy(),
            default_similarity_threshold: self.similarity_threshold,
            sweeper,
            ..DedupConfig::default()
        }
    }
}
