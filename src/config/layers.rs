//! Configuration override layers
//!
//! A layer mirrors the configuration file format with every field optional.
//! Layers are applied over the built-in defaults in order, so a later layer
//! wins for every field it sets. List-valued fields are replaced, not merged.

use crate::config::types::{
    Config, FetcherConfig, MirrorConfig, PlanConfig, RewriteRule, RulesConfig, SiteConfig,
};
use crate::config::validation::validate;
use crate::ConfigError;
use serde::Deserialize;
use std::path::PathBuf;
use url::Url;

/// One source of configuration values (a file, CLI flags, ...)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigLayer {
    #[serde(default)]
    pub site: SiteLayer,
    #[serde(default)]
    pub rules: RulesLayer,
    #[serde(default)]
    pub fetcher: FetcherLayer,
    #[serde(default)]
    pub plan: PlanLayer,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SiteLayer {
    pub root: Option<PathBuf>,
    pub base_url: Option<String>,
    pub external: Option<Vec<String>>,
    pub manifest_file: Option<String>,
    pub journal_file: Option<String>,
    pub previous: Option<String>,
    pub lenient_missing: Option<bool>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RulesLayer {
    pub exclude: Option<Vec<String>>,
    pub stable: Option<Vec<String>>,
    pub cache: Option<Vec<String>>,
    pub rewrite: Option<Vec<RewriteRule>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FetcherLayer {
    pub concurrency: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub throttle_threshold: Option<usize>,
    pub throttle_divisor: Option<usize>,
    pub fallback_grace_ms: Option<u64>,
    pub mirrors: Option<Vec<MirrorConfig>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PlanLayer {
    pub schema_version: Option<u32>,
    pub merge_prefixes: Option<Vec<String>>,
    pub html_threshold: Option<usize>,
    pub byte_budget: Option<usize>,
    pub refresh: Option<Vec<String>>,
    pub force: Option<bool>,
}

impl ConfigLayer {
    /// Parses a layer from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Overwrites `target` when the layer sets a value
fn apply<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

impl Config {
    /// Merges layers over the defaults and validates the result
    ///
    /// # Arguments
    ///
    /// * `layers` - Override layers, lowest precedence first
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - The effective, validated configuration
    /// * `Err(ConfigError)` - A required value is missing or a value is invalid
    ///
    /// # Example
    ///
    /// ```
    /// use sumi_swell::config::{Config, ConfigLayer};
    ///
    /// let file = ConfigLayer::from_toml(r#"
    /// [site]
    /// base-url = "https://example.com"
    /// [fetcher]
    /// concurrency = 4
    /// "#).unwrap();
    /// let cli = ConfigLayer::from_toml("[fetcher]\nconcurrency = 2").unwrap();
    ///
    /// let config = Config::from_layers(&[file, cli]).unwrap();
    /// assert_eq!(config.fetcher.concurrency, 2);
    /// assert_eq!(config.site.base_url.as_str(), "https://example.com/");
    /// ```
    pub fn from_layers(layers: &[ConfigLayer]) -> Result<Config, ConfigError> {
        let mut site = SiteLayer::default();
        let mut rules = RulesConfig::default();
        let mut fetcher = FetcherConfig::default();
        let mut plan = PlanConfig::default();

        for layer in layers {
            site.merge(&layer.site);

            apply(&mut rules.exclude, &layer.rules.exclude);
            apply(&mut rules.stable, &layer.rules.stable);
            apply(&mut rules.cache, &layer.rules.cache);
            apply(&mut rules.rewrite, &layer.rules.rewrite);

            apply(&mut fetcher.concurrency, &layer.fetcher.concurrency);
            apply(&mut fetcher.timeout_ms, &layer.fetcher.timeout_ms);
            apply(&mut fetcher.max_attempts, &layer.fetcher.max_attempts);
            apply(&mut fetcher.throttle_threshold, &layer.fetcher.throttle_threshold);
            apply(&mut fetcher.throttle_divisor, &layer.fetcher.throttle_divisor);
            apply(&mut fetcher.fallback_grace_ms, &layer.fetcher.fallback_grace_ms);
            apply(&mut fetcher.mirrors, &layer.fetcher.mirrors);

            apply(&mut plan.schema_version, &layer.plan.schema_version);
            apply(&mut plan.merge_prefixes, &layer.plan.merge_prefixes);
            apply(&mut plan.html_threshold, &layer.plan.html_threshold);
            apply(&mut plan.byte_budget, &layer.plan.byte_budget);
            apply(&mut plan.refresh, &layer.plan.refresh);
            apply(&mut plan.force, &layer.plan.force);
        }

        let config = Config {
            site: site.resolve()?,
            rules,
            fetcher,
            plan,
        };
        validate(&config)?;

        Ok(config)
    }
}

impl SiteLayer {
    fn merge(&mut self, other: &SiteLayer) {
        if other.root.is_some() {
            self.root = other.root.clone();
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url.clone();
        }
        if other.external.is_some() {
            self.external = other.external.clone();
        }
        if other.manifest_file.is_some() {
            self.manifest_file = other.manifest_file.clone();
        }
        if other.journal_file.is_some() {
            self.journal_file = other.journal_file.clone();
        }
        if other.previous.is_some() {
            self.previous = other.previous.clone();
        }
        if other.lenient_missing.is_some() {
            self.lenient_missing = other.lenient_missing;
        }
        if other.output_dir.is_some() {
            self.output_dir = other.output_dir.clone();
        }
    }

    fn resolve(self) -> Result<SiteConfig, ConfigError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ConfigError::Missing("site.base-url".to_string()))?;
        let mut base_url = Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", base_url, e))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let external = self
            .external
            .unwrap_or_default()
            .iter()
            .map(|raw| {
                crate::url::normalize_url(raw).map_err(|e| {
                    ConfigError::InvalidUrl(format!("Invalid external URL '{}': {}", raw, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let root = self.root.unwrap_or_else(|| PathBuf::from("public"));
        let output_dir = self.output_dir.unwrap_or_else(|| root.clone());

        Ok(SiteConfig {
            root,
            base_url,
            external,
            manifest_file: self
                .manifest_file
                .unwrap_or_else(|| "manifest.json".to_string()),
            journal_file: self.journal_file.unwrap_or_else(|| "journal.json".to_string()),
            previous: self.previous,
            lenient_missing: self.lenient_missing.unwrap_or(true),
            output_dir,
        })
    }
}
