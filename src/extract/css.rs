//! Stylesheet extractor

use crate::extract::{decode, Collected, ExtractError, Extractor};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Regex for `url(...)` with double, single or no quotes
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static URL_FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]+))\s*\)"#).unwrap()
});

/// Regex for `@import "..."` without `url()`
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)@import\s+(?:"([^"]*)"|'([^']*)')"#).unwrap());

/// Regex for comments, stripped before matching
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

/// Extracts `url(...)` and `@import` references from stylesheets
#[derive(Debug, Clone, Copy, Default)]
pub struct CssExtractor;

impl Extractor for CssExtractor {
    fn extract(&self, content: &[u8], base: &Url) -> Result<Vec<Url>, ExtractError> {
        let css = decode(content, base)?;
        let mut found = Collected::default();
        for reference in collect_css_references(css) {
            found.push(&reference, base);
        }
        Ok(found.into_urls())
    }
}

/// Returns the raw references of a stylesheet fragment in source order
pub(crate) fn collect_css_references(css: &str) -> Vec<String> {
    let css = COMMENT_RE.replace_all(css, "");
    let mut references: Vec<(usize, String)> = Vec::new();

    for re in [&*URL_FUNCTION_RE, &*IMPORT_RE] {
        for cap in re.captures_iter(&css) {
            let Some(value) = cap.iter().skip(1).flatten().next() else {
                continue;
            };
            let reference = value.as_str().trim();
            if !reference.is_empty() {
                references.push((value.start(), reference.to_string()));
            }
        }
    }

    references.sort_by_key(|(offset, _)| *offset);
    references.into_iter().map(|(_, reference)| reference).collect()
}
