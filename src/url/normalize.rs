use crate::UrlError;
use url::Url;

/// Reference prefixes that never point at a cacheable resource
const IGNORED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:", "blob:", "about:"];

/// Normalizes an absolute URL into the canonical form used as a manifest key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything that is not HTTP or HTTPS
/// 3. Lowercase the host (done by the parser)
/// 4. Normalize the path:
///    - Remove dot segments (. and ..)
///    - Collapse repeated slashes
///    - Keep a trailing slash, it addresses a directory index
///    - Empty path becomes /
/// 5. Remove the fragment
/// 6. Remove an empty query string (trailing ?)
///
/// Query parameters are kept in their original order: for static assets they
/// are frequently cache-busting version tokens and must stay part of the key.
///
/// # Examples
///
/// ```
/// use sumi_swell::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.COM/a/../css//site.css#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/css/site.css");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::Malformed(format!("URL has no host: {}", url_str)));
    }

    let path = normalize_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}

/// Resolves a reference found inside a document against the document URL
///
/// Returns None if the reference should be ignored:
/// - javascript:, mailto:, tel:, data:, blob:, about: schemes
/// - fragment-only references (same document anchors)
/// - references that fail to resolve or normalize
pub fn resolve_reference(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if IGNORED_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
        return None;
    }

    let joined = base.join(href).ok()?;
    normalize_url(joined.as_str()).ok()
}

/// Normalizes a URL path by removing dot segments and duplicate slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let trailing_slash = path.ends_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut result = format!("/{}", segments.join("/"));
    if trailing_slash {
        result.push('/');
    }
    result
}
