use url::Url;

/// Returns true if both URLs share scheme, host and port
///
/// Default ports are implied, so `https://example.com` and
/// `https://example.com:443` are the same origin.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_swell::url::same_origin;
///
/// let site = Url::parse("https://example.com/").unwrap();
/// let cdn = Url::parse("https://cdn.example.com/app.js").unwrap();
/// assert!(!same_origin(&site, &cdn));
/// ```
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin().is_tuple() && a.origin() == b.origin()
}
