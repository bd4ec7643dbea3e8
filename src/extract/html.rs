//! Page markup extractor
//!
//! This module handles parsing HTML content to extract:
//! - Stylesheets, icons, preloads and manifests (`<link href>`)
//! - Scripts (`<script src>`)
//! - Images and media (`src`, `srcset`, `poster`)
//! - `url(...)` references in inline `<style>` blocks and `style` attributes

use crate::extract::css::collect_css_references;
use crate::extract::{decode, Collected, ExtractError, Extractor};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

/// `<link rel>` values that point at a subresource the page needs
const SUBRESOURCE_RELS: &[&str] = &[
    "stylesheet",
    "icon",
    "shortcut",
    "apple-touch-icon",
    "preload",
    "modulepreload",
    "prefetch",
    "manifest",
];

/// Parses a selector known at compile time
///
/// SAFETY: Only called with the constant selectors below, which are valid.
#[allow(clippy::unwrap_used)]
fn fixed(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static LINK: LazyLock<Selector> = LazyLock::new(|| fixed("link[href]"));
static BASE: LazyLock<Selector> = LazyLock::new(|| fixed("base[href]"));
static SRCSET: LazyLock<Selector> = LazyLock::new(|| fixed("img[srcset], source[srcset]"));
static STYLE_BLOCK: LazyLock<Selector> = LazyLock::new(|| fixed("style"));
static STYLE_ATTR: LazyLock<Selector> = LazyLock::new(|| fixed("[style]"));

/// Elements whose attribute holds a single reference
static SINGLE_REFERENCES: LazyLock<Vec<(Selector, &'static str)>> = LazyLock::new(|| {
    [
        ("script[src]", "src"),
        ("img[src]", "src"),
        ("source[src]", "src"),
        ("video[src]", "src"),
        ("video[poster]", "poster"),
        ("audio[src]", "src"),
        ("track[src]", "src"),
    ]
    .into_iter()
    .map(|(css, attr)| (fixed(css), attr))
    .collect()
});

/// Extracts subresource references from HTML
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    /// # Extraction Rules
    ///
    /// **Include:**
    /// - `<link href>` whose `rel` names a subresource (stylesheet, icon, preload...)
    /// - `<script src>`, `<img src|srcset>`, `<source src|srcset>`
    /// - `<video src|poster>`, `<audio src>`, `<track src>`
    /// - `url(...)` inside `<style>` and `style="..."`
    ///
    /// **Exclude:**
    /// - `<a href>` navigation; pages are enumerated from the site root instead
    /// - `<link rel="canonical">`, `rel="alternate"` and other non-subresources
    /// - `javascript:`, `mailto:`, `data:` and fragment-only references
    ///
    /// A `<base href>` element changes the resolution base.
    fn extract(&self, content: &[u8], base: &Url) -> Result<Vec<Url>, ExtractError> {
        let html = decode(content, base)?;
        let document = Html::parse_document(html);
        let base = document_base(&document, base);
        let mut found = Collected::default();

        for element in document.select(&LINK) {
            let rel = element.value().attr("rel").unwrap_or_default().to_ascii_lowercase();
            if !rel.split_whitespace().any(|r| SUBRESOURCE_RELS.contains(&r)) {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                found.push(href, &base);
            }
        }

        for (selector, attr) in SINGLE_REFERENCES.iter() {
            for element in document.select(selector) {
                if let Some(value) = element.value().attr(attr) {
                    found.push(value, &base);
                }
            }
        }

        for element in document.select(&SRCSET) {
            if let Some(srcset) = element.value().attr("srcset") {
                for candidate in parse_srcset(srcset) {
                    found.push(candidate, &base);
                }
            }
        }

        for element in document.select(&STYLE_BLOCK) {
            let text: String = element.text().collect();
            for reference in collect_css_references(&text) {
                found.push(&reference, &base);
            }
        }

        for element in document.select(&STYLE_ATTR) {
            if let Some(style) = element.value().attr("style") {
                for reference in collect_css_references(style) {
                    found.push(&reference, &base);
                }
            }
        }

        Ok(found.into_urls())
    }
}

/// Honours the first `<base href>` element, if it resolves
fn document_base(document: &Html, base: &Url) -> Url {
    document
        .select(&BASE)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| base.join(href.trim()).ok())
        .unwrap_or_else(|| base.clone())
}

/// Returns the URL of every candidate in a `srcset` attribute
fn parse_srcset(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
}
