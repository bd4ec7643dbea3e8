//! Script extractor
//!
//! Scripts are not parsed; a handful of patterns pick up module imports and
//! worker scripts. Bare specifiers (`import "react"`) name packages rather
//! than URLs and are ignored.

use crate::extract::{decode, Collected, ExtractError, Extractor};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Regex for `import ... from "x"` and `export ... from "x"`
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static FROM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:import|export)\b[^'";]*?\bfrom\s*["']([^"']+)["']"#).unwrap()
});

/// Regex for side-effect imports `import "x"` and dynamic `import("x")`
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static BARE_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bimport\s*\(?\s*["']([^"']+)["']"#).unwrap());

/// Regex for `importScripts(...)` argument lists
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static IMPORT_SCRIPTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bimportScripts\s*\(([^)]*)\)").unwrap());

/// Regex for `new URL("x", import.meta.url)`
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static META_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bnew\s+URL\(\s*["']([^"']+)["']\s*,\s*import\.meta\.url\s*\)"#).unwrap()
});

/// Regex for string literals
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static STRING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)"|'([^']*)'"#).unwrap());

/// Extracts module and worker script references from JavaScript
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptExtractor;

impl Extractor for ScriptExtractor {
    fn extract(&self, content: &[u8], base: &Url) -> Result<Vec<Url>, ExtractError> {
        let script = decode(content, base)?;
        let mut references: Vec<(usize, &str)> = Vec::new();

        for re in [&*FROM_RE, &*BARE_IMPORT_RE, &*META_URL_RE] {
            for cap in re.captures_iter(script) {
                if let Some(m) = cap.get(1) {
                    references.push((m.start(), m.as_str()));
                }
            }
        }

        for cap in IMPORT_SCRIPTS_RE.captures_iter(script) {
            let Some(args) = cap.get(1) else {
                continue;
            };
            for literal in STRING_RE.captures_iter(args.as_str()) {
                if let Some(m) = literal.get(1).or_else(|| literal.get(2)) {
                    references.push((args.start() + m.start(), m.as_str()));
                }
            }
        }

        references.sort_by_key(|(offset, _)| *offset);

        let mut found = Collected::default();
        for (_, specifier) in references {
            if is_url_specifier(specifier) {
                found.push(specifier, base);
            }
        }
        Ok(found.into_urls())
    }
}

fn is_url_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
        || specifier.starts_with("http://")
        || specifier.starts_with("https://")
}
