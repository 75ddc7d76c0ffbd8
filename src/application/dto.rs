use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::domain::entities::ImageRecord;

/// DTO for record summaries handed to operators and callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecordDto {
    pub content_hash: String,
    pub perceptual_hash: Option<String>,
    pub canonical_path: String,
    pub original_filename: String,
    pub mime_type: String,
    pub byte_size: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub upload_context: String,
    pub first_uploader_id: i64,
    pub reference_count: i64,
    pub is_active: bool,
    pub created_at: String,
    pub retired_at: Option<String>,
}

impl From<&ImageRecord> for ImageRecordDto {
    fn from(record: &ImageRecord) -> Self {
        Self {
            content_hash: record.content_hash().to_string(),
            perceptual_hash: record.perceptual_hash().map(|h| h.to_hex()),
            canonical_path: record.canonical_path().to_string(),
            original_filename: record.original_filename().to_string(),
            mime_type: record.mime_type().to_string(),
            byte_size: record.byte_size(),
            width: record.width(),
            height: record.height(),
            format: record.format().map(str::to_string),
            upload_context: record.upload_context().to_string(),
            first_uploader_id: record.first_uploader_id(),
            reference_count: record.reference_count(),
            is_active: record.is_active(),
            created_at: record.created_at().to_rfc3339(),
            retired_at: record.retired_at().map(|t| t.to_rfc3339()),
        }
    }
}

/// Bytes the caller has already written to `canonical_path_hint`
#[derive(Debug, Clone)]
pub struct StoreRequest {
    pub bytes: Bytes,
    pub original_filename: String,
    pub canonical_path_hint: String,
    pub mime_type: String,
    pub context: String,
    pub uploader_id: i64,
}

/// Bytes not yet written anywhere; the service uploads them on a miss
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub bytes: Bytes,
    pub original_filename: String,
    pub folder: String,
    pub mime_type: String,
    pub context: String,
    pub uploader_id: i64,
}

/// Which lifecycle transition a store produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOutcome {
    /// First upload of this content
    Created,
    /// Identical content already stored, counter bumped
    Referenced,
    /// Retired record brought back under the new path
    Reactivated,
}

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub record: ImageRecord,
    pub outcome: StoreOutcome,
}

impl StoredImage {
    /// Whether the record now points at the path the caller supplied. When
    /// false the caller's copy is redundant and the record's path wins.
    pub fn hint_adopted(&self) -> bool {
        self.outcome != StoreOutcome::Referenced
    }
}

/// Near-duplicate match
#[derive(Debug, Clone)]
pub struct SimilarImage {
    pub record: ImageRecord,
    pub distance: u32,
}

/// Aggregate duplicate counts over the record table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateStatistics {
    /// Active records
    pub unique_count: i64,
    /// Active records referenced more than once
    pub duplicate_count: i64,
    /// Sum of reference counts over active records
    pub total_references: i64,
    /// Physical writes avoided, not bytes
    pub bytes_saved_estimate: i64,
    /// Records at zero references awaiting sweep
    pub retired_count: i64,
}

impl DuplicateStatistics {
    pub fn from_counts(
        unique_count: i64,
        duplicate_count: i64,
        total_references: i64,
        retired_count: i64,
    ) -> Self {
        Self {
            unique_count,
            duplicate_count,
            total_references,
            bytes_saved_estimate: (total_references - unique_count).max(0),
            retired_count,
        }
    }
}
