/// Shared SQL fragments for the image record table
pub struct QueryBuilder;

impl QueryBuilder {
    /// Column list matching `ImageRecordRow`
    pub const RECORD_COLUMNS: &'static str = r#"
        content_hash, perceptual_hash, canonical_path, original_filename,
        mime_type, byte_size, width, height, format, color_mode,
        upload_context, first_uploader_id, reference_count, is_active,
        created_at, updated_at, retired_at
    "#;

    /// Predicate for records at zero references
    pub const RETIRED_WHERE: &'static str = "reference_count = 0 AND NOT is_active";

    pub fn select_records(where_clause: &str) -> String {
        format!(
            "SELECT {} FROM image_records WHERE {}",
            Self::RECORD_COLUMNS,
            where_clause
        )
    }

    /// Appends `RETURNING <columns>` to a mutating statement
    pub fn returning_record(statement: &str) -> String {
        format!("{} RETURNING {}", statement, Self::RECORD_COLUMNS)
    }
}
