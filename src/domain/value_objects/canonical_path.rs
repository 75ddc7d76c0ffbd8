use serde::{Deserialize, Serialize};

/// Prefix used by the legacy local mount; never part of a canonical path.
pub const LEGACY_UPLOADS_SEGMENT: &str = "uploads";

/// Backend-agnostic relative storage location, e.g. `posts/ab12.jpg`.
///
/// Construction is total: separators are unified, empty, `.` and `..`
/// segments are dropped and leading `uploads` segments are stripped. The
/// result may be empty, callers that need a location check `is_empty`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CanonicalPath(String);

impl CanonicalPath {
    pub fn from_relative(raw: &str) -> Self {
        let mut segments: Vec<&str> = raw
            .split(['/', '\\'])
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .collect();

        let legacy = segments
            .iter()
            .take_while(|s| s.eq_ignore_ascii_case(LEGACY_UPLOADS_SEGMENT))
            .count();
        segments.drain(..legacy);

        Self(segments.join("/"))
    }

    /// Join a folder and a file name into one canonical path
    pub fn join(folder: &str, filename: &str) -> Self {
        Self::from_relative(&format!("{}/{}", folder, filename))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Directory part of the path, the upload folder for paths written here
    pub fn folder(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(folder, _)| folder)
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    pub fn starts_with(&self, prefix: &CanonicalPath) -> bool {
        prefix.is_empty()
            || self.0 == prefix.0
            || (self.0.starts_with(&prefix.0) && self.0[prefix.0.len()..].starts_with('/'))
    }
}

impl std::fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CanonicalPath {
    fn from(value: String) -> Self {
        Self::from_relative(&value)
    }
}

impl From<&str> for CanonicalPath {
    fn from(value: &str) -> Self {
        Self::from_relative(value)
    }
}

impl From<CanonicalPath> for String {
    fn from(value: CanonicalPath) -> Self {
        value.0
    }
}
