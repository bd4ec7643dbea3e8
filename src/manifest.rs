//! Version manifest data model
//!
//! A manifest maps every tracked URL to a [`Fingerprint`]. It is built by a
//! single crawl pass and serialized as
//! `{ "version": int, "list": { url: string | string[] }, "external": {...} }`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Schema version written by this release
pub const CURRENT_SCHEMA_VERSION: u32 = 4;

/// Identity of a single resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fingerprint {
    /// Content hash of an ordinary resource
    Hash(String),

    /// Ordered child URLs of a stable aggregate; never rehashed once observed
    Children(Vec<String>),
}

impl Fingerprint {
    /// Returns true for the list representation
    pub fn is_children(&self) -> bool {
        matches!(self, Self::Children(_))
    }

    /// Child URLs referenced by a stable aggregate, empty for hashes
    pub fn children(&self) -> &[String] {
        match self {
            Self::Hash(_) => &[],
            Self::Children(children) => children,
        }
    }
}

/// Snapshot of every tracked URL and its fingerprint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version; a change forces total invalidation
    #[serde(rename = "version")]
    pub schema_version: u32,

    /// URL to fingerprint map
    #[serde(rename = "list", default)]
    pub entries: BTreeMap<String, Fingerprint>,

    /// Free-form metadata (build time, config hash)
    #[serde(rename = "external", default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Manifest {
    /// Creates an empty manifest with the given schema version
    pub fn new(schema_version: u32) -> Self {
        Self {
            schema_version,
            entries: BTreeMap::new(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Gets the fingerprint recorded for a URL
    pub fn get(&self, url: &str) -> Option<&Fingerprint> {
        self.entries.get(url)
    }

    /// Returns true if the manifest tracks the URL
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// Number of tracked URLs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no URL is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the tracked URLs in sorted order
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Parses a manifest from its JSON encoding
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Encodes the manifest as pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Copies a URL's fingerprint, and everything it transitively references,
/// out of an old manifest
///
/// Returns an empty map when the old manifest does not know the URL. Children
/// the old manifest does not record are left out; nothing is fetched and the
/// old manifest is not modified.
///
/// # Examples
///
/// ```
/// use sumi_swell::manifest::{import_subtree, Fingerprint, Manifest};
///
/// let mut old = Manifest::new(4);
/// old.entries.insert("/lib/".into(), Fingerprint::Children(vec!["/lib/a.js".into()]));
/// old.entries.insert("/lib/a.js".into(), Fingerprint::Hash("h1".into()));
///
/// let imported = import_subtree(&old, "/lib/");
/// assert_eq!(imported.len(), 2);
/// ```
pub fn import_subtree(old: &Manifest, url: &str) -> BTreeMap<String, Fingerprint> {
    let mut imported = BTreeMap::new();
    let mut seen = BTreeSet::new();
    let mut stack = vec![url.to_string()];

    while let Some(current) = stack.pop() {
        if !seen.insert(current.clone()) {
            continue;
        }

        let Some(fingerprint) = old.get(&current) else {
            continue;
        };

        for child in fingerprint.children().iter().rev() {
            if !seen.contains(child) {
                stack.push(child.clone());
            }
        }

        imported.insert(current, fingerprint.clone());
    }

    imported
}
