use std::str::FromStr;

use crate::domain::entities::ImageRecord;
use crate::domain::value_objects::{CanonicalPath, ContentHash, UploadDescriptor};

/// Content hash made of one repeated hex digit
pub fn hash(c: char) -> ContentHash {
    ContentHash::from_str(&c.to_string().repeat(64)).unwrap()
}

pub fn active_record(c: char, path: &str) -> ImageRecord {
    ImageRecord::new(
        hash(c),
        None,
        CanonicalPath::from(path),
        UploadDescriptor {
            original_filename: "photo.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            byte_size: 512,
            upload_context: "post".to_string(),
            uploader_id: 1,
        },
        None,
    )
}

/// Record at zero references, retired just now
pub fn retired_record(c: char, path: &str) -> ImageRecord {
    let mut record = active_record(c, path);
    record.decrement_ref();
    record
}
