use crate::fetch::FetcherSettings;
use crate::manifest::CURRENT_SCHEMA_VERSION;
use crate::plan::{PlanSettings, DEFAULT_BYTE_BUDGET};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Main configuration structure for Sumi-Swell
///
/// Built once per build pass by [`Config::from_layers`](crate::config::Config::from_layers)
/// and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub site: SiteConfig,
    pub rules: RulesConfig,
    pub fetcher: FetcherConfig,
    pub plan: PlanConfig,
}

/// The site being published
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteConfig {
    /// Directory holding the built site
    pub root: PathBuf,

    /// Public URL of `root`, always ending in `/`
    pub base_url: Url,

    /// Externally hosted resources to track in addition to the local files
    pub external: Vec<Url>,

    /// File name of the manifest artifact
    pub manifest_file: String,

    /// File name of the journal artifact
    pub journal_file: String,

    /// Where the previously published artifacts live: a directory or a base URL.
    /// Defaults to `output_dir`.
    pub previous: Option<String>,

    /// Treat missing previous artifacts as a first build instead of an error
    pub lenient_missing: bool,

    /// Directory the new artifacts are written to
    pub output_dir: PathBuf,
}

/// Pattern predicates applied to every discovered URL
///
/// Every pattern is a regular expression matched against the full URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RulesConfig {
    /// URLs never tracked nor traversed
    pub exclude: Vec<String>,

    /// Immutable resources whose fingerprint is reused once recorded
    pub stable: Vec<String>,

    /// URLs recorded in the manifest; empty means every URL
    pub cache: Vec<String>,

    /// Request rewrites applied before canonicalisation, first match wins
    pub rewrite: Vec<RewriteRule>,
}

/// Regex replacement applied to a discovered URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub pattern: String,
    pub replacement: String,
}

/// Fetcher tuning
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetcherConfig {
    /// Maximum number of concurrent requests
    pub concurrency: usize,

    /// Timeout of a single attempt (milliseconds)
    pub timeout_ms: u64,

    /// Attempts per request, including the first
    pub max_attempts: u32,

    /// Timeouts that trigger a concurrency reduction; 0 disables throttling
    pub throttle_threshold: usize,

    /// Concurrency shrinks by `concurrency / throttle_divisor`
    pub throttle_divisor: usize,

    /// Time the primary gets before mirrors are raced (milliseconds)
    pub fallback_grace_ms: u64,

    pub mirrors: Vec<MirrorConfig>,
}

/// Fallback ladder for every URL under a prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    pub prefix: String,

    /// Replacement prefixes, raced after the grace period
    pub ladder: Vec<String>,
}

/// Update-plan tuning
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanConfig {
    pub schema_version: u32,
    pub merge_prefixes: Vec<String>,

    /// Page-document count above which all pages are invalidated at once; 0 disables
    pub html_threshold: usize,

    /// Upper bound for the encoded journal entries (bytes)
    pub byte_budget: usize,

    /// URLs invalidated on the next build regardless of their content
    pub refresh: Vec<String>,

    /// Invalidate everything on the next build
    pub force: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        let settings = FetcherSettings::default();
        Self {
            concurrency: settings.concurrency,
            timeout_ms: settings.timeout.as_millis() as u64,
            max_attempts: settings.max_attempts,
            throttle_threshold: settings.throttle_threshold,
            throttle_divisor: settings.throttle_divisor,
            fallback_grace_ms: 500,
            mirrors: Vec::new(),
        }
    }
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            merge_prefixes: Vec::new(),
            html_threshold: 0,
            byte_budget: DEFAULT_BYTE_BUDGET,
            refresh: Vec::new(),
            force: false,
        }
    }
}

impl FetcherConfig {
    pub fn settings(&self) -> FetcherSettings {
        FetcherSettings {
            concurrency: self.concurrency,
            timeout: Duration::from_millis(self.timeout_ms),
            max_attempts: self.max_attempts,
            throttle_threshold: self.throttle_threshold,
            throttle_divisor: self.throttle_divisor,
        }
    }

    pub fn fallback_grace(&self) -> Duration {
        Duration::from_millis(self.fallback_grace_ms)
    }

    /// Mirror URLs for `url`, taken from the longest matching mirror prefix
    ///
    /// Returns an empty list when no mirror covers the URL.
    pub fn mirror_ladder(&self, url: &Url) -> Vec<Url> {
        let url = url.as_str();
        let Some(mirror) = self
            .mirrors
            .iter()
            .filter(|m| url.starts_with(m.prefix.as_str()))
            .max_by_key(|m| m.prefix.len())
        else {
            return Vec::new();
        };

        let rest = &url[mirror.prefix.len()..];
        mirror
            .ladder
            .iter()
            .filter_map(|base| Url::parse(&format!("{}{}", base, rest)).ok())
            .collect()
    }
}

impl PlanConfig {
    pub fn settings(&self) -> PlanSettings {
        PlanSettings {
            merge_prefixes: self.merge_prefixes.clone(),
            html_threshold: self.html_threshold,
            byte_budget: self.byte_budget,
        }
    }
}
