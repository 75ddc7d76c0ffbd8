use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::application::dto::DuplicateStatistics;
use crate::application::ports::{ImageRecordRepository, InsertOutcome, RepositoryError};
use crate::domain::entities::ImageRecord;
use crate::domain::value_objects::{CanonicalPath, ContentHash, PerceptualHash};
use crate::infrastructure::persistence::QueryBuilder;

pub struct PostgresImageRecordRepository {
    pool: PgPool,
}

impl PostgresImageRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_optional(
        &self,
        sql: &str,
        content_hash: &ContentHash,
    ) -> Result<Option<ImageRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, ImageRecordRow>(sql)
            .bind(content_hash.as_hex())
            .fetch_optional(&self.pool)
            .await?;

        row.map(ImageRecordRow::into_domain).transpose()
    }
}

fn to_i32(value: Option<u32>, field: &str) -> Result<Option<i32>, RepositoryError> {
    value
        .map(|v| {
            i32::try_from(v).map_err(|_| {
                RepositoryError::SerializationError(format!("{} out of range: {}", field, v))
            })
        })
        .transpose()
}

#[async_trait]
impl ImageRecordRepository for PostgresImageRecordRepository {
    async fn find_by_hash(
        &self,
        content_hash: &ContentHash,
    ) -> Result<Option<ImageRecord>, RepositoryError> {
        let sql = QueryBuilder::select_records("content_hash = $1");
        self.fetch_optional(&sql, content_hash).await
    }

    async fn find_active_by_hash(
        &self,
        content_hash: &ContentHash,
    ) -> Result<Option<ImageRecord>, RepositoryError> {
        let sql =
            QueryBuilder::select_records("content_hash = $1 AND is_active AND reference_count > 0");
        self.fetch_optional(&sql, content_hash).await
    }

    async fn insert(&self, record: &ImageRecord) -> Result<InsertOutcome, RepositoryError> {
        let byte_size = i64::try_from(record.byte_size()).map_err(|_| {
            RepositoryError::SerializationError(format!(
                "byte_size out of range: {}",
                record.byte_size()
            ))
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO image_records (
                content_hash, perceptual_hash, canonical_path, original_filename,
                mime_type, byte_size, width, height, format, color_mode,
                upload_context, first_uploader_id, reference_count, is_active,
                created_at, updated_at, retired_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (content_hash) DO NOTHING
            "#,
        )
        .bind(record.content_hash().as_hex())
        .bind(record.perceptual_hash().map(PerceptualHash::to_hex))
        .bind(record.canonical_path().as_str())
        .bind(record.original_filename())
        .bind(record.mime_type())
        .bind(byte_size)
        .bind(to_i32(record.width(), "width")?)
        .bind(to_i32(record.height(), "height")?)
        .bind(record.format())
        .bind(record.color_mode())
        .bind(record.upload_context())
        .bind(record.first_uploader_id())
        .bind(record.reference_count())
        .bind(record.is_active())
        .bind(record.created_at())
        .bind(record.updated_at())
        .bind(record.retired_at())
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::AlreadyExists
        })
    }

    async fn increment_ref(
        &self,
        content_hash: &ContentHash,
    ) -> Result<Option<ImageRecord>, RepositoryError> {
        let sql = QueryBuilder::returning_record(
            r#"
            UPDATE image_records
            SET reference_count = reference_count + 1,
                updated_at = now()
            WHERE content_hash = $1 AND is_active AND reference_count > 0
            "#,
        );
        self.fetch_optional(&sql, content_hash).await
    }

    async fn decrement_ref(
        &self,
        content_hash: &ContentHash,
    ) -> Result<Option<ImageRecord>, RepositoryError> {
        // SET expressions see the pre-update row
        let sql = QueryBuilder::returning_record(
            r#"
            UPDATE image_records
            SET reference_count = reference_count - 1,
                is_active = reference_count - 1 > 0,
                retired_at = CASE WHEN reference_count - 1 = 0 THEN now() ELSE NULL END,
                updated_at = now()
            WHERE content_hash = $1 AND reference_count > 0
            "#,
        );
        self.fetch_optional(&sql, content_hash).await
    }

    async fn reactivate(&self, record: &ImageRecord) -> Result<bool, RepositoryError> {
        let byte_size = i64::try_from(record.byte_size()).map_err(|_| {
            RepositoryError::SerializationError(format!(
                "byte_size out of range: {}",
                record.byte_size()
            ))
        })?;

        let result = sqlx::query(
            r#"
            UPDATE image_records
            SET perceptual_hash = $2,
                canonical_path = $3,
                original_filename = $4,
                mime_type = $5,
                byte_size = $6,
                width = $7,
                height = $8,
                format = $9,
                color_mode = $10,
                upload_context = $11,
                reference_count = $12,
                is_active = TRUE,
                retired_at = NULL,
                updated_at = $13
            WHERE content_hash = $1 AND NOT is_active AND reference_count = 0
            "#,
        )
        .bind(record.content_hash().as_hex())
        .bind(record.perceptual_hash().map(PerceptualHash::to_hex))
        .bind(record.canonical_path().as_str())
        .bind(record.original_filename())
        .bind(record.mime_type())
        .bind(byte_size)
        .bind(to_i32(record.width(), "width")?)
        .bind(to_i32(record.height(), "height")?)
        .bind(record.format())
        .bind(record.color_mode())
        .bind(record.upload_context())
        .bind(record.reference_count())
        .bind(record.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_with_perceptual_hash(&self) -> Result<Vec<ImageRecord>, RepositoryError> {
        let sql = format!(
            "{} ORDER BY content_hash",
            QueryBuilder::select_records("is_active AND perceptual_hash IS NOT NULL")
        );
        let rows = sqlx::query_as::<_, ImageRecordRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ImageRecordRow::into_domain).collect()
    }

    async fn find_orphaned(
        &self,
        retired_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ImageRecord>, RepositoryError> {
        let sql = format!(
            "{} ORDER BY retired_at NULLS FIRST LIMIT $2",
            QueryBuilder::select_records(&format!(
                "{} AND (retired_at IS NULL OR retired_at <= $1)",
                QueryBuilder::RETIRED_WHERE
            ))
        );
        let rows = sqlx::query_as::<_, ImageRecordRow>(&sql)
            .bind(retired_before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ImageRecordRow::into_domain).collect()
    }

    async fn delete_if_orphaned(
        &self,
        content_hash: &ContentHash,
        retired_before: Option<DateTime<Utc>>,
    ) -> Result<Option<ImageRecord>, RepositoryError> {
        let sql = QueryBuilder::returning_record(&format!(
            "DELETE FROM image_records WHERE content_hash = $1 AND {} \
             AND ($2::timestamptz IS NULL OR retired_at IS NULL OR retired_at <= $2)",
            QueryBuilder::RETIRED_WHERE
        ));
        let row = sqlx::query_as::<_, ImageRecordRow>(&sql)
            .bind(content_hash.as_hex())
            .bind(retired_before)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ImageRecordRow::into_domain).transpose()
    }

    async fn is_path_referenced(&self, path: &CanonicalPath) -> Result<bool, RepositoryError> {
        let (referenced,) = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS (SELECT 1 FROM image_records WHERE canonical_path = $1)",
        )
        .bind(path.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(referenced)
    }

    async fn statistics(&self) -> Result<DuplicateStatistics, RepositoryError> {
        let (unique_count, duplicate_count, total_references, retired_count) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"
                SELECT
                    COUNT(*) FILTER (WHERE is_active),
                    COUNT(*) FILTER (WHERE is_active AND reference_count > 1),
                    COALESCE(SUM(reference_count) FILTER (WHERE is_active), 0)::BIGINT,
                    COUNT(*) FILTER (WHERE NOT is_active)
                FROM image_records
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(DuplicateStatistics::from_counts(
            unique_count,
            duplicate_count,
            total_references,
            retired_count,
        ))
    }
}

#[derive(sqlx::FromRow)]
struct ImageRecordRow {
    content_hash: String,
    perceptual_hash: Option<String>,
    canonical_path: String,
    original_filename: String,
    mime_type: String,
    byte_size: i64,
    width: Option<i32>,
    height: Option<i32>,
    format: Option<String>,
    color_mode: Option<String>,
    upload_context: String,
    first_uploader_id: i64,
    reference_count: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    retired_at: Option<DateTime<Utc>>,
}

impl ImageRecordRow {
    fn into_domain(self) -> Result<ImageRecord, RepositoryError> {
        let serialization = |e: crate::domain::errors::DomainError| {
            RepositoryError::SerializationError(e.to_string())
        };
        let dimension = |value: Option<i32>, field: &str| {
            value
                .map(|v| {
                    u32::try_from(v).map_err(|_| {
                        RepositoryError::SerializationError(format!("negative {}: {}", field, v))
                    })
                })
                .transpose()
        };

        let content_hash = ContentHash::from_hex(self.content_hash).map_err(serialization)?;
        let perceptual_hash = self
            .perceptual_hash
            .as_deref()
            .map(PerceptualHash::from_hex)
            .transpose()
            .map_err(serialization)?;
        let byte_size = u64::try_from(self.byte_size).map_err(|_| {
            RepositoryError::SerializationError(format!("negative byte_size: {}", self.byte_size))
        })?;

        ImageRecord::reconstruct(
            content_hash,
            perceptual_hash,
            CanonicalPath::from_relative(&self.canonical_path),
            self.original_filename,
            self.mime_type,
            byte_size,
            dimension(self.width, "width")?,
            dimension(self.height, "height")?,
            self.format,
            self.color_mode,
            self.upload_context,
            self.first_uploader_id,
            self.reference_count,
            self.is_active,
            self.created_at,
            self.updated_at,
            self.retired_at,
        )
        .map_err(serialization)
    }
}
