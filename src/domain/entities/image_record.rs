use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::value_objects::{
    CanonicalPath, ContentHash, ImageMetadata, PerceptualHash, UploadDescriptor,
};

/// ImageRecord entity - one row per unique stored image content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    content_hash: ContentHash,
    perceptual_hash: Option<PerceptualHash>,
    canonical_path: CanonicalPath,
    original_filename: String,
    mime_type: String,
    byte_size: u64,
    width: Option<u32>,
    height: Option<u32>,
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

impl ImageRecord {
    /// Create new record with reference_count = 1
    pub fn new(
        content_hash: ContentHash,
        perceptual_hash: Option<PerceptualHash>,
        canonical_path: CanonicalPath,
        descriptor: UploadDescriptor,
        metadata: Option<ImageMetadata>,
    ) -> Self {
        let now = Utc::now();
        let mut record = Self {
            content_hash,
            perceptual_hash: None,
            canonical_path,
            original_filename: String::new(),
            mime_type: String::new(),
            byte_size: 0,
            width: None,
            height: None,
            format: None,
            color_mode: None,
            upload_context: descriptor.upload_context.clone(),
            first_uploader_id: descriptor.uploader_id,
            reference_count: 1,
            is_active: true,
            created_at: now,
            updated_at: now,
            retired_at: None,
        };
        record.apply_descriptor(descriptor, metadata, perceptual_hash);
        record
    }

    /// Reconstruct from storage
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        content_hash: ContentHash,
        perceptual_hash: Option<PerceptualHash>,
        canonical_path: CanonicalPath,
        original_filename: String,
        mime_type: String,
        byte_size: u64,
        width: Option<u32>,
        height: Option<u32>,
        format: Option<String>,
        color_mode: Option<String>,
        upload_context: String,
        first_uploader_id: i64,
        reference_count: i64,
        is_active: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        retired_at: Option<DateTime<Utc>>,
    ) -> Result<Self, DomainError> {
        if reference_count < 0 {
            return Err(DomainError::NegativeReferenceCount(reference_count));
        }

        Ok(Self {
            content_hash,
            perceptual_hash: perceptual_hash.filter(|h| !h.is_empty()),
            canonical_path,
            original_filename,
            mime_type,
            byte_size,
            width,
            height,
            format,
            color_mode,
            upload_context,
            first_uploader_id,
            reference_count,
            is_active,
            created_at,
            updated_at,
            retired_at,
        })
    }

    /// Add one logical owner
    pub fn increment_ref(&mut self) -> Result<i64, DomainError> {
        if !self.is_active {
            return Err(DomainError::RecordRetired(self.content_hash.to_string()));
        }
        self.reference_count += 1;
        self.updated_at = Utc::now();
        Ok(self.reference_count)
    }

    /// Remove one logical owner. Saturates at zero; reaching zero retires the
    /// record. Returns the new count.
    pub fn decrement_ref(&mut self) -> i64 {
        if self.reference_count == 0 {
            return 0;
        }

        self.reference_count -= 1;
        let now = Utc::now();
        self.updated_at = now;
        if self.reference_count == 0 {
            self.is_active = false;
            self.retired_at = Some(now);
        }
        self.reference_count
    }

    /// Bring a retired record back with a fresh upload.
    ///
    /// Returns the previous path when it differs from `canonical_path`, so the
    /// caller can drop the superseded object.
    pub fn reactivate(
        &mut self,
        canonical_path: CanonicalPath,
        descriptor: UploadDescriptor,
        metadata: Option<ImageMetadata>,
        perceptual_hash: Option<PerceptualHash>,
    ) -> Result<Option<CanonicalPath>, DomainError> {
        if self.is_active {
            return Err(DomainError::RecordActive(self.content_hash.to_string()));
        }

        let previous = std::mem::replace(&mut self.canonical_path, canonical_path);
        self.apply_descriptor(descriptor, metadata, perceptual_hash);
        self.reference_count = 1;
        self.is_active = true;
        self.retired_at = None;
        self.updated_at = Utc::now();

        Ok((previous != self.canonical_path).then_some(previous))
    }

    /// Retired long enough to be swept
    pub fn is_sweepable(&self, retired_before: DateTime<Utc>) -> bool {
        self.reference_count == 0
            && !self.is_active
            && self.retired_at.map_or(true, |at| at <= retired_before)
    }

    // first_uploader_id stays untouched
    fn apply_descriptor(
        &mut self,
        descriptor: UploadDescriptor,
        metadata: Option<ImageMetadata>,
        perceptual_hash: Option<PerceptualHash>,
    ) {
        self.original_filename = descriptor.original_filename;
        self.mime_type = descriptor.mime_type;
        self.byte_size = descriptor.byte_size;
        self.upload_context = descriptor.upload_context;
        self.perceptual_hash = perceptual_hash.filter(|h| !h.is_empty());
        match metadata {
            Some(meta) => {
                self.width = Some(meta.width);
                self.height = Some(meta.height);
                self.format = Some(meta.format);
                self.color_mode = Some(meta.color_mode);
            }
            None => {
                self.width = None;
                self.height = None;
                self.format = None;
                self.color_mode = None;
            }
        }
    }

    // Getters
    pub fn content_hash(&self) -> &ContentHash {
        &self.content_hash
    }

    pub fn perceptual_hash(&self) -> Option<&PerceptualHash> {
        self.perceptual_hash.as_ref()
    }

    pub fn canonical_path(&self) -> &CanonicalPath {
        &self.canonical_path
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn color_mode(&self) -> Option<&str> {
        self.color_mode.as_deref()
    }

    pub fn upload_context(&self) -> &str {
        &self.upload_context
    }

    pub fn first_uploader_id(&self) -> i64 {
        self.first_uploader_id
    }

    pub fn reference_count(&self) -> i64 {
        self.reference_count
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn retired_at(&self) -> Option<DateTime<Utc>> {
        self.retired_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::str::FromStr;

    fn descriptor(uploader_id: i64, context: &str) -> UploadDescriptor {
        UploadDescriptor {
            original_filename: "cat.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            byte_size: 2048,
            upload_context: context.to_string(),
            uploader_id,
        }
    }

    fn create_test_record() -> ImageRecord {
        ImageRecord::new(
            ContentHash::from_str(&"a".repeat(64)).unwrap(),
            Some(PerceptualHash::from_hex("00ff00ff00ff00ff").unwrap()),
            CanonicalPath::from("posts/cat.jpg"),
            descriptor(7, "post"),
            Some(ImageMetadata {
                width: 640,
                height: 480,
                format: "jpeg".to_string(),
                color_mode: "rgb8".to_string(),
            }),
        )
    }

    #[test]
    fn test_record_new() {
        let record = create_test_record();
        assert_eq!(record.reference_count(), 1);
        assert!(record.is_active());
        assert_eq!(record.width(), Some(640));
        assert_eq!(record.first_uploader_id(), 7);
        assert!(record.retired_at().is_none());
    }

    #[test]
    fn test_empty_perceptual_hash_is_dropped() {
        let record = ImageRecord::new(
            ContentHash::from_str(&"b".repeat(64)).unwrap(),
            Some(PerceptualHash::default()),
            CanonicalPath::from("posts/blob.bin"),
            descriptor(1, "post"),
            None,
        );
        assert!(record.perceptual_hash().is_none());
        assert!(record.width().is_none());
    }

    #[test]
    fn test_increment_and_decrement() {
        let mut record = create_test_record();
        assert_eq!(record.increment_ref().unwrap(), 2);
        assert_eq!(record.decrement_ref(), 1);
        assert!(record.is_active());
    }

    #[test]
    fn test_decrement_to_zero_retires() {
        let mut record = create_test_record();
        assert_eq!(record.decrement_ref(), 0);
        assert!(!record.is_active());
        assert!(record.retired_at().is_some());

        // Saturates
        assert_eq!(record.decrement_ref(), 0);
        assert!(record.increment_ref().is_err());
    }

    #[test]
    fn test_reactivate_preserves_first_uploader() {
        let mut record = create_test_record();
        record.decrement_ref();

        let previous = record
            .reactivate(
                CanonicalPath::from("profiles/cat2.jpg"),
                descriptor(99, "profile"),
                None,
                None,
            )
            .unwrap();

        assert_eq!(previous, Some(CanonicalPath::from("posts/cat.jpg")));
        assert_eq!(record.reference_count(), 1);
        assert!(record.is_active());
        assert!(record.retired_at().is_none());
        assert_eq!(record.first_uploader_id(), 7);
        assert_eq!(record.upload_context(), "profile");
        assert_eq!(record.canonical_path().as_str(), "profiles/cat2.jpg");
    }

    #[test]
    fn test_reactivate_same_path_reports_nothing_superseded() {
        let mut record = create_test_record();
        record.decrement_ref();
        let previous = record
            .reactivate(
                CanonicalPath::from("posts/cat.jpg"),
                descriptor(7, "post"),
                None,
                None,
            )
            .unwrap();
        assert!(previous.is_none());
    }

    #[test]
    fn test_reactivate_active_record_fails() {
        let mut record = create_test_record();
        let err = record
            .reactivate(CanonicalPath::from("x.jpg"), descriptor(1, "post"), None, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::RecordActive(_)));
    }

    #[test]
    fn test_is_sweepable_respects_grace() {
        let mut record = create_test_record();
        assert!(!record.is_sweepable(Utc::now()));

        record.decrement_ref();
        let retired_at = record.retired_at().unwrap();
        assert!(record.is_sweepable(retired_at));
        assert!(!record.is_sweepable(retired_at - Duration::seconds(1)));
    }

    #[test]
    fn test_reconstruct_rejects_negative_count() {
        let now = Utc::now();
        let result = ImageRecord::reconstruct(
            ContentHash::from_str(&"c".repeat(64)).unwrap(),
            None,
            CanonicalPath::from("x.jpg"),
            "x.jpg".to_string(),
            "image/jpeg".to_string(),
            1,
            None,
            None,
            None,
            None,
            "post".to_string(),
            1,
            -1,
            false,
            now,
            now,
            None,
        );
        assert!(matches!(result, Err(DomainError::NegativeReferenceCount(-1))));
    }
}
