/// Returns true if the URL addresses a page document
///
/// A page document is a directory index (path ends with `/`) or a file with
/// an `.html`/`.htm` extension. Query strings and fragments are ignored.
///
/// # Examples
///
/// ```
/// use sumi_swell::url::is_page_document;
///
/// assert!(is_page_document("https://example.com/"));
/// assert!(is_page_document("https://example.com/about/index.html?lang=en"));
/// assert!(!is_page_document("https://example.com/app.js"));
/// ```
pub fn is_page_document(url: &str) -> bool {
    let path = strip_query(url);
    if path.ends_with('/') {
        return true;
    }

    let lowered = path.to_ascii_lowercase();
    lowered.ends_with(".html") || lowered.ends_with(".htm")
}

/// Returns the longest prefix from `prefixes` that `candidate` starts with
///
/// # Examples
///
/// ```
/// use sumi_swell::url::longest_prefix;
///
/// let prefixes = vec!["https://a.com/".to_string(), "https://a.com/img/".to_string()];
/// assert_eq!(longest_prefix(&prefixes, "https://a.com/img/x.png"), Some("https://a.com/img/"));
/// assert_eq!(longest_prefix(&prefixes, "https://b.com/"), None);
/// ```
pub fn longest_prefix<'a>(prefixes: &'a [String], candidate: &str) -> Option<&'a str> {
    prefixes
        .iter()
        .filter(|prefix| !prefix.is_empty() && candidate.starts_with(prefix.as_str()))
        .max_by_key(|prefix| prefix.len())
        .map(String::as_str)
}

fn strip_query(url: &str) -> &str {
    let end = url.find(|c: char| c == '?' || c == '#').unwrap_or(url.len());
    &url[..end]
}
