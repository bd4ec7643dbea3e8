//! Update journal data model
//!
//! The journal is the ordered history of invalidation instructions handed to
//! the caching agent, newest entry first. It is serialized as
//! `{ "global": int, "info": [ { "version": int, "change"?: [ {"flag", "value"?} ] } ] }`.

use crate::url::is_page_document;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A rule that cannot be turned into a matcher
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Rule of kind {kind:?} has no value")]
    MissingValue { kind: RuleKind },

    #[error("Invalid regex rule '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },
}

/// How a rule value is compared against a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleKind {
    /// Every page document; carries no value
    #[serde(rename = "html")]
    Html,

    /// URL ends with the value
    #[serde(rename = "suf")]
    Suffix,

    /// URL starts with the value
    #[serde(rename = "pre")]
    Prefix,

    /// URL equals the value
    #[serde(rename = "str")]
    Literal,

    /// URL matches the value as a regular expression
    #[serde(rename = "reg")]
    Regex,
}

/// A single value or a list of alternatives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    One(String),
    Many(Vec<String>),
}

impl RuleValue {
    /// Builds the most compact value for a member list; None if empty
    pub fn from_members(mut members: Vec<String>) -> Option<Self> {
        match members.len() {
            0 => None,
            1 => members.pop().map(Self::One),
            _ => Some(Self::Many(members)),
        }
    }

    /// The individual alternatives
    pub fn members(&self) -> &[String] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }
}

/// One matching instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "flag")]
    pub kind: RuleKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RuleValue>,
}

impl Rule {
    pub fn html() -> Self {
        Self {
            kind: RuleKind::Html,
            value: None,
        }
    }

    pub fn suffix(value: impl Into<String>) -> Self {
        Self::single(RuleKind::Suffix, value)
    }

    pub fn prefix(value: impl Into<String>) -> Self {
        Self::single(RuleKind::Prefix, value)
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::single(RuleKind::Literal, value)
    }

    pub fn regex(value: impl Into<String>) -> Self {
        Self::single(RuleKind::Regex, value)
    }

    fn single(kind: RuleKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: Some(RuleValue::One(value.into())),
        }
    }

    /// The rule's value members, empty for value-less rules
    pub fn members(&self) -> &[String] {
        self.value.as_ref().map(RuleValue::members).unwrap_or(&[])
    }

    /// Compiles one matcher per value member
    ///
    /// An `html` rule yields a single matcher and ignores any value.
    pub fn matchers(&self) -> Result<Vec<Matcher>, RuleError> {
        if self.kind == RuleKind::Html {
            return Ok(vec![Matcher::Html]);
        }

        let members = self.members();
        if members.is_empty() {
            return Err(RuleError::MissingValue { kind: self.kind });
        }

        members
            .iter()
            .map(|member| Matcher::compile(self.kind, member))
            .collect()
    }
}

/// A compiled rule member
#[derive(Debug, Clone)]
pub enum Matcher {
    Html,
    Suffix(String),
    Prefix(String),
    Literal(String),
    Regex(Regex),
}

impl Matcher {
    /// Compiles a single value of the given kind
    pub fn compile(kind: RuleKind, value: &str) -> Result<Self, RuleError> {
        Ok(match kind {
            RuleKind::Html => Self::Html,
            RuleKind::Suffix => Self::Suffix(value.to_string()),
            RuleKind::Prefix => Self::Prefix(value.to_string()),
            RuleKind::Literal => Self::Literal(value.to_string()),
            RuleKind::Regex => Self::Regex(Regex::new(value).map_err(|source| {
                RuleError::InvalidRegex {
                    pattern: value.to_string(),
                    source,
                }
            })?),
        })
    }

    /// Returns true if the URL is matched
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Html => is_page_document(url),
            Self::Suffix(suffix) => url.ends_with(suffix.as_str()),
            Self::Prefix(prefix) => url.starts_with(prefix.as_str()),
            Self::Literal(literal) => url == literal,
            Self::Regex(regex) => regex.is_match(url),
        }
    }
}

/// Journal record for one version bump
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub version: u64,

    #[serde(rename = "change", default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
}

impl Entry {
    /// An entry that only records the version bump
    pub fn version_only(version: u64) -> Self {
        Self {
            version,
            rules: None,
        }
    }

    /// Creates an entry; an empty rule list becomes version-only
    pub fn with_rules(version: u64, rules: Vec<Rule>) -> Self {
        Self {
            version,
            rules: if rules.is_empty() { None } else { Some(rules) },
        }
    }

    /// The entry's rules, empty for version-only entries
    pub fn rules(&self) -> &[Rule] {
        self.rules.as_deref().unwrap_or(&[])
    }

    /// Size of the compact JSON encoding in bytes
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(0)
    }
}

/// Ordered history of invalidation instructions, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    #[serde(rename = "global", default)]
    pub epoch: u64,

    #[serde(rename = "info", default)]
    pub entries: Vec<Entry>,
}

impl Journal {
    /// Version of the newest entry
    pub fn newest_version(&self) -> Option<u64> {
        self.entries.first().map(|entry| entry.version)
    }

    /// Version the next prepended entry will carry
    ///
    /// None once the newest version is `u64::MAX`.
    pub fn next_version(&self) -> Option<u64> {
        match self.newest_version() {
            Some(version) => version.checked_add(1),
            None => Some(0),
        }
    }

    /// Epoch of the next journal, None once the epoch is `u64::MAX`
    pub fn next_epoch(&self) -> Option<u64> {
        self.epoch.checked_add(1)
    }

    /// Size of the compact JSON encoding in bytes
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(0)
    }

    /// Parses a journal from its JSON encoding
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Encodes the journal as pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
