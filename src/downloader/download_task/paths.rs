//! Destination paths for downloaded pages.

use std::path::{Path, PathBuf};

/// Characters that are not valid in a path component on common filesystems
const RESERVED: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Replace characters that cannot appear in a path component with `_`
///
/// Names that would still be special (`""`, `"."`, `".."`) become `"_"`.
///
/// ```
/// use manga_dl::downloader::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Re:Zero / Arc 3?"), "Re_Zero _ Arc 3_");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if RESERVED.contains(&c) { '_' } else { c })
        .collect();

    match sanitized.trim() {
        "" | "." | ".." => "_".to_string(),
        _ => sanitized,
    }
}

/// Directory a chapter's pages are written to: `<root>/<item title>/<chapter title>`
pub fn chapter_dir(root: &Path, item_title: &str, chapter_title: &str) -> PathBuf {
    root.join(sanitize_filename(item_title))
        .join(sanitize_filename(chapter_title))
}

/// File extension for a page, taken from the URL path or falling back to `default`
///
/// Query strings and fragments are ignored. Only short alphanumeric suffixes
/// are accepted; the result is lowercase and carries no leading dot.
pub fn page_extension(url: Option<&str>, default: &str) -> String {
    let Some(url) = url else {
        return default.to_string();
    };

    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        // Relative or opaque locations
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };

    let file_name = path.rsplit('/').next().unwrap_or(&path);
    match file_name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => default.to_string(),
    }
}

/// File name of a page: the 1-based page number padded to four digits
pub(crate) fn page_file_name(number: usize, extension: &str) -> String {
    format!("{number:04}.{extension}")
}
