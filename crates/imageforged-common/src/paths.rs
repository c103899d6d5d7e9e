//! Path utilities for detecting image files and hidden entries.
//!
//! These are used by the path resolver when listing the children of a
//! selected directory, and by the default file inspector.

use std::path::Path;

/// Extensions of image files picked up from a selected directory.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Check if a path's extension is in `extensions` (case-insensitive).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use imageforged_common::paths::{has_extension, image_extensions};
///
/// assert!(has_extension(Path::new("/path/to/image.PNG"), image_extensions()));
/// assert!(!has_extension(Path::new("notes.txt"), image_extensions()));
/// ```
pub fn has_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            extensions.iter().any(|e| e.as_ref().eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}

/// Check if the final path component starts with a dot.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use imageforged_common::paths::is_hidden;
///
/// assert!(is_hidden(Path::new("/photos/.thumbnails")));
/// assert!(!is_hidden(Path::new("/photos/holiday")));
/// ```
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// File name without its last extension, e.g. `photo` for `photo.jpg`.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Build a `file://` locator for displaying a local file.
pub fn file_url(path: &Path) -> String {
    let display = path.to_string_lossy().replace('\\', "/");
    if display.starts_with('/') {
        format!("file://{}", display)
    } else {
        format!("file:///{}", display)
    }
}

/// Get the list of image file extensions.
#[must_use]
pub fn image_extensions() -> &'static [&'static str] {
    IMAGE_EXTENSIONS
}
