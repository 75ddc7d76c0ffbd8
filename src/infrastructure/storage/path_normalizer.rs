use crate::domain::value_objects::CanonicalPath;

/// Mount point local uploads are served from
pub const LOCAL_MOUNT: &str = "/uploads";

const FRONTEND_ROOT: &str = "storage";
const FRONTEND_MARKER: [&str; 2] = ["object", "public"];

/// Collapses every historical representation of a stored image location
/// into its [`CanonicalPath`].
///
/// Recognized forms:
/// - absolute URLs: scheme, host, query and fragment are dropped; a leading
///   configured public base URL or endpoint is stripped; for non-public URLs
///   a leading bucket segment is stripped once
/// - object store frontend paths, `storage/<..>/object/public/<bucket>/<key>`
///   inside URLs; as bare relative paths only in the versioned
///   `storage/v<N>/object/public/<bucket>/<key>` shape, so a real `storage`
///   folder keeps its keys
/// - legacy local paths under `/uploads/` or `uploads/`
/// - canonical paths, returned unchanged
///
/// Rules are applied until the output stops changing, so normalizing twice
/// is the same as normalizing once. Every pass that changes the path makes it
/// shorter or removes its backslashes, so the loop always ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathNormalizer {
    bucket: Option<String>,
    public_base: Option<String>,
    endpoint: Option<String>,
}

impl PathNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = non_empty(bucket.into().trim_matches('/'));
        self
    }

    pub fn with_public_base(mut self, public_base: impl Into<String>) -> Self {
        self.public_base = non_empty(public_base.into().trim().trim_end_matches('/'));
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = non_empty(endpoint.into().trim().trim_end_matches('/'));
        self
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    pub fn public_base(&self) -> Option<&str> {
        self.public_base.as_deref()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Total: any input yields a (possibly empty) canonical path
    pub fn normalize(&self, raw: &str) -> CanonicalPath {
        let mut current = self.normalize_once(raw);
        loop {
            let next = self.normalize_once(current.as_str());
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn normalize_once(&self, raw: &str) -> CanonicalPath {
        let raw = raw.trim();

        if !is_absolute_url(raw) {
            return strip_frontend_prefix(CanonicalPath::from_relative(raw), FrontendMatch::Versioned);
        }

        let url = raw.split(['?', '#']).next().unwrap_or_default();

        if let Some(rest) = self.public_base.as_deref().and_then(|b| strip_base(url, b)) {
            return strip_frontend_prefix(CanonicalPath::from_relative(rest), FrontendMatch::Any);
        }

        let path = match self.endpoint.as_deref().and_then(|e| strip_base(url, e)) {
            Some(rest) => rest,
            None => strip_scheme_and_host(url),
        };

        let canonical = CanonicalPath::from_relative(path);
        let unfronted = strip_frontend_prefix(canonical.clone(), FrontendMatch::Any);
        if unfronted != canonical {
            return unfronted;
        }
        self.strip_bucket(canonical)
    }

    fn strip_bucket(&self, path: CanonicalPath) -> CanonicalPath {
        let Some(bucket) = self.bucket.as_deref() else {
            return path;
        };
        match path.as_str().split_once('/') {
            Some((first, rest)) if first == bucket => CanonicalPath::from_relative(rest),
            _ => path,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// `scheme://` with a valid scheme, or a scheme-relative `//host`
fn is_absolute_url(raw: &str) -> bool {
    if raw.starts_with("//") {
        return true;
    }
    match raw.find("://") {
        Some(idx) if idx > 0 => {
            let scheme = &raw[..idx];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

fn strip_scheme_and_host(url: &str) -> &str {
    let after_scheme = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url.trim_start_matches('/'),
    };
    match after_scheme.find('/') {
        Some(idx) => &after_scheme[idx..],
        None => "",
    }
}

/// Remainder of `url` after `base`, on a segment boundary
fn strip_base<'a>(url: &'a str, base: &str) -> Option<&'a str> {
    let head = url.get(..base.len())?;
    if !head.eq_ignore_ascii_case(base) {
        return None;
    }
    let rest = &url[base.len()..];
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// How strictly a `storage/...` path must look like a frontend URL path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrontendMatch {
    /// Marker anywhere after `storage`; used for paths taken from URLs
    Any,
    /// Exactly `storage/v<N>/object/public/<bucket>/<key>`
    Versioned,
}

fn is_api_version(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// `storage/<..>/object/public/<bucket>/<key>` becomes `<key>`
fn strip_frontend_prefix(path: CanonicalPath, mode: FrontendMatch) -> CanonicalPath {
    let segments: Vec<&str> = path.as_str().split('/').collect();
    if segments.first() != Some(&FRONTEND_ROOT) {
        return path;
    }

    let marker = match mode {
        FrontendMatch::Any => segments
            .windows(2)
            .position(|pair| pair == FRONTEND_MARKER.as_slice()),
        FrontendMatch::Versioned => (segments.len() > 3
            && is_api_version(segments[1])
            && segments[2..4] == FRONTEND_MARKER)
            .then_some(2),
    };

    match marker {
        // marker pair, then the bucket, then at least one key segment
        Some(idx) if segments.len() > idx + 3 => {
            CanonicalPath::from_relative(&segments[idx + 3..].join("/"))
        }
        _ => path,
    }
}
