use uuid::Uuid;

const MAX_EXTENSION_LEN: usize = 10;

/// Collision-resistant file name keeping the lowercased extension of
/// `original`, e.g. `Cat.JPG` becomes `3f2c…9a.jpg`.
///
/// Extensions that are not purely alphanumeric or longer than ten
/// characters are dropped rather than carried into storage keys.
pub fn unique_filename(original: &str) -> String {
    let stem = Uuid::new_v4().simple().to_string();
    match file_extension(original) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

/// Lowercased extension of the final path segment, if usable
pub fn file_extension(original: &str) -> Option<String> {
    let name = original.rsplit(['/', '\\']).next()?;
    let (base, ext) = name.rsplit_once('.')?;
    if base.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_filename_keeps_extension() {
        let name = unique_filename("Holiday Photo.JPEG");
        assert!(name.ends_with(".jpeg"));
        assert_eq!(name.len(), 32 + 5);
        assert_ne!(name, unique_filename("Holiday Photo.JPEG"));
    }

    #[test]
    fn test_unique_filename_without_extension() {
        assert_eq!(unique_filename("README").len(), 32);
        assert_eq!(unique_filename(".bashrc").len(), 32);
        assert_eq!(unique_filename("weird.j p g").len(), 32);
        assert_eq!(unique_filename("a.averyveryverylongext").len(), 32);
    }

    #[test]
    fn test_extension_uses_last_segment() {
        assert_eq!(file_extension("dir.v2/photo.PNG").as_deref(), Some("png"));
        assert_eq!(file_extension("dir.v2/photo"), None);
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
    }
}
