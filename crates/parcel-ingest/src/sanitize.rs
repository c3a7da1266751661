//! Helpers for keeping upload locations out of span attributes.

use std::path::Path;

/// Returns only the filename component of a path.
///
/// Storage and extraction directories stay out of traces; the file name is
/// enough to correlate a span with its import file.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}
