//! File-extension to `Content-Type` lookup.
//!
//! A small match table, not a crate — the set of extensions this server
//! needs to recognize is fixed, so there is no reason to pull in a MIME
//! database dependency for it.

/// Resolves a path's extension to a `Content-Type` value. Text-ish types get
/// `; charset=utf-8` appended, matching the builder's header.
pub(crate) fn content_type_for_path(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "xml" => "application/xml; charset=utf-8",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}
