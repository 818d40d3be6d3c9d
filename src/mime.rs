use std::path::Path;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

static MIME_TYPES: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("html", "text/html; charset=utf-8"),
        ("htm", "text/html; charset=utf-8"),
        ("css", "text/css; charset=utf-8"),
        ("js", "text/javascript; charset=utf-8"),
        ("json", "application/json; charset=utf-8"),
        ("xml", "application/xml; charset=utf-8"),
        ("txt", "text/plain; charset=utf-8"),
        ("csv", "text/csv; charset=utf-8"),
        ("log", "text/plain; charset=utf-8"),
        ("ico", "image/x-icon"),
        ("png", "image/png"),
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("gif", "image/gif"),
        ("svg", "image/svg+xml"),
        ("mp4", "video/mp4"),
        ("3gp", "video/3gpp"),
        ("zip", "application/zip"),
        ("pdf", "application/pdf"),
    ]
    .iter()
    .cloned()
    .collect()
});

/// Content type for a file, picked by its (case-insensitive) extension.
pub fn content_type_for(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| MIME_TYPES.get(ext.to_lowercase().as_str()).copied())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}
