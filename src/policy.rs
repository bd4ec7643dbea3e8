//! Site policy predicates consulted by the crawler
//!
//! Decides, per URL, whether it is excluded, stable, or worth recording, and
//! applies request rewrites before canonicalisation.

use crate::config::RulesConfig;
use crate::url::normalize_url;
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Per-URL decisions made during a crawl
pub trait SitePolicy: Send + Sync {
    /// URLs that are neither recorded nor traversed
    fn is_excluded(&self, url: &Url) -> bool;

    /// Immutable resources: once fingerprinted they are never fetched again
    fn is_stable(&self, url: &Url) -> bool;

    /// URLs that are recorded in the manifest
    fn is_cache_candidate(&self, url: &Url) -> bool;

    /// Maps a discovered URL to the URL actually requested and recorded
    fn rewrite(&self, url: Url) -> Url {
        url
    }
}

#[derive(Debug, Clone)]
struct CompiledRewrite {
    pattern: Regex,
    replacement: String,
}

/// [`SitePolicy`] driven by the `[rules]` regular expressions
#[derive(Debug, Clone, Default)]
pub struct PatternPolicy {
    exclude: Vec<Regex>,
    stable: Vec<Regex>,
    cache: Vec<Regex>,
    rewrite: Vec<CompiledRewrite>,
}

impl PatternPolicy {
    /// Compiles the rule patterns
    ///
    /// # Returns
    ///
    /// * `Ok(PatternPolicy)` - Every pattern compiled
    /// * `Err(ConfigError::InvalidPattern)` - A pattern is not a valid regex
    pub fn from_rules(rules: &RulesConfig) -> Result<Self, ConfigError> {
        let rewrite = rules
            .rewrite
            .iter()
            .map(|rule| {
                Ok(CompiledRewrite {
                    pattern: compile("rewrite", &rule.pattern)?,
                    replacement: rule.replacement.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            exclude: compile_all("exclude", &rules.exclude)?,
            stable: compile_all("stable", &rules.stable)?,
            cache: compile_all("cache", &rules.cache)?,
            rewrite,
        })
    }
}

fn compile(section: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| {
        ConfigError::InvalidPattern(format!("Invalid {} pattern '{}': {}", section, pattern, e))
    })
}

fn compile_all(section: &str, patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns.iter().map(|p| compile(section, p)).collect()
}

fn any_match(patterns: &[Regex], url: &Url) -> bool {
    patterns.iter().any(|re| re.is_match(url.as_str()))
}

impl SitePolicy for PatternPolicy {
    fn is_excluded(&self, url: &Url) -> bool {
        any_match(&self.exclude, url)
    }

    fn is_stable(&self, url: &Url) -> bool {
        any_match(&self.stable, url)
    }

    fn is_cache_candidate(&self, url: &Url) -> bool {
        self.cache.is_empty() || any_match(&self.cache, url)
    }

    /// Applies the first matching rewrite; a result that is not a valid
    /// HTTP(S) URL leaves the original untouched
    fn rewrite(&self, url: Url) -> Url {
        let Some(rule) = self.rewrite.iter().find(|r| r.pattern.is_match(url.as_str())) else {
            return url;
        };

        let rewritten = rule
            .pattern
            .replace(url.as_str(), rule.replacement.as_str())
            .into_owned();
        match normalize_url(&rewritten) {
            Ok(rewritten) => rewritten,
            Err(e) => {
                tracing::warn!("Ignoring rewrite of {} to '{}': {}", url, rewritten, e);
                url
            }
        }
    }
}
