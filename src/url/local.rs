use crate::url::{normalize_url, same_origin};
use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Name of the file served for directory URLs
const INDEX_FILE: &str = "index.html";

/// Maps a site URL to the file under `root` that serves it
///
/// Returns None when the URL is not on the base URL's origin or lies outside
/// the base path. Directory URLs map to their `index.html`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use url::Url;
/// use sumi_swell::url::local_path_for;
///
/// let base = Url::parse("https://example.com/").unwrap();
/// let url = Url::parse("https://example.com/docs/").unwrap();
/// assert_eq!(
///     local_path_for(&url, &base, Path::new("public")),
///     Some(Path::new("public/docs/index.html").to_path_buf())
/// );
/// ```
pub fn local_path_for(url: &Url, base: &Url, root: &Path) -> Option<PathBuf> {
    if !same_origin(url, base) {
        return None;
    }

    let relative = url.path().strip_prefix(base.path())?;
    let mut path = root.to_path_buf();
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        // A `%` not followed by two hex digits stays literal
        let decoded = percent_decode_str(segment).decode_utf8().ok()?;
        if decoded == ".." || decoded.contains('/') || decoded.contains('\\') {
            return None;
        }
        path.push(decoded.as_ref());
    }

    if relative.is_empty() || relative.ends_with('/') {
        path.push(INDEX_FILE);
    }

    Some(path)
}

/// Maps a file path relative to the site root to the URL it is served under
///
/// `index.html` files map to their directory URL with a trailing slash.
pub fn url_for_local_path(relative: &Path, base: &Url) -> Option<Url> {
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_str()?.to_string()),
            Component::CurDir => continue,
            _ => return None,
        }
    }

    let mut joined = segments.join("/");
    if segments.last().map(String::as_str) == Some(INDEX_FILE) {
        joined.truncate(joined.len() - INDEX_FILE.len());
    }

    let url = base.join(&joined).ok()?;
    normalize_url(url.as_str()).ok()
}
