//! Content-type extractor registry
//!
//! This module handles finding the resources a document references:
//! - Deciding a resource's [`ContentKind`] from its content type or extension
//! - Dispatching to the [`Extractor`] registered for that kind
//! - Page markup, stylesheet and script extractors out of the box
//!
//! Extractors return absolute, normalized URLs in document order without
//! duplicates.

mod css;
mod html;
mod js;

pub use css::CssExtractor;
pub use html::HtmlExtractor;
pub use js::ScriptExtractor;

use crate::url::is_page_document;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Errors raised while extracting references
///
/// These are never fatal: the crawler logs them and skips the subtree.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Content of {url} is not valid UTF-8")]
    NotUtf8 { url: String },
}

/// Broad content classes with their own extraction rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Page,
    Stylesheet,
    Script,
    Other,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Page => "page",
            Self::Stylesheet => "stylesheet",
            Self::Script => "script",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Finds the resources referenced by one document
pub trait Extractor: Send + Sync {
    fn extract(&self, content: &[u8], base: &Url) -> Result<Vec<Url>, ExtractError>;
}

/// Maps content kinds to extractors
#[derive(Clone)]
pub struct Registry {
    extractors: HashMap<ContentKind, Arc<dyn Extractor>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kinds", &self.extractors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Registry {
    /// Creates a registry without any extractor
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Creates a registry with the page, stylesheet and script extractors
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(ContentKind::Page, Arc::new(HtmlExtractor));
        registry.register(ContentKind::Stylesheet, Arc::new(CssExtractor));
        registry.register(ContentKind::Script, Arc::new(ScriptExtractor));
        registry
    }

    /// Registers or replaces the extractor for a kind
    pub fn register(&mut self, kind: ContentKind, extractor: Arc<dyn Extractor>) {
        self.extractors.insert(kind, extractor);
    }

    /// Classifies a resource
    ///
    /// A known `content_type` wins; otherwise the URL's path decides.
    pub fn content_kind(&self, url: &Url, content_type: Option<&str>) -> ContentKind {
        if let Some(kind) = content_type.and_then(kind_from_content_type) {
            return kind;
        }

        if is_page_document(url.as_str()) {
            return ContentKind::Page;
        }

        let path = url.path().to_ascii_lowercase();
        match path.rsplit_once('.').map(|(_, ext)| ext) {
            Some("css") => ContentKind::Stylesheet,
            Some("js" | "mjs" | "cjs") => ContentKind::Script,
            _ => ContentKind::Other,
        }
    }

    /// Returns true if a resource of this kind can reference other resources
    pub fn has_extractor(&self, kind: ContentKind) -> bool {
        self.extractors.contains_key(&kind)
    }

    /// Extracts the references of a document; kinds without extractor yield nothing
    pub fn extract(
        &self,
        kind: ContentKind,
        content: &[u8],
        base: &Url,
    ) -> Result<Vec<Url>, ExtractError> {
        match self.extractors.get(&kind) {
            Some(extractor) => extractor.extract(content, base),
            None => Ok(Vec::new()),
        }
    }
}

fn kind_from_content_type(content_type: &str) -> Option<ContentKind> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "text/html" | "application/xhtml+xml" => Some(ContentKind::Page),
        "text/css" => Some(ContentKind::Stylesheet),
        "text/javascript" | "application/javascript" | "application/x-javascript"
        | "application/ecmascript" | "text/ecmascript" => Some(ContentKind::Script),
        _ => None,
    }
}

/// Decodes document bytes, rejecting anything that is not UTF-8
pub(crate) fn decode<'a>(content: &'a [u8], base: &Url) -> Result<&'a str, ExtractError> {
    std::str::from_utf8(content).map_err(|_| ExtractError::NotUtf8 {
        url: base.to_string(),
    })
}

/// Collects resolved references in first-seen order
#[derive(Debug, Default)]
pub(crate) struct Collected {
    seen: HashSet<Url>,
    urls: Vec<Url>,
}

impl Collected {
    pub(crate) fn push(&mut self, href: &str, base: &Url) {
        if let Some(url) = crate::url::resolve_reference(href, base) {
            if self.seen.insert(url.clone()) {
                self.urls.push(url);
            }
        }
    }

    pub(crate) fn into_urls(self) -> Vec<Url> {
        self.urls
    }
}
