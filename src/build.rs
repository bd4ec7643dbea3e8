//! Build pass pipeline
//!
//! One pass loads the previously published artifacts, crawls the site into a
//! fresh manifest, classifies the differences and compiles the next journal.
//! Everything a pass needs travels in an explicit [`BuildContext`].

use crate::config::Config;
use crate::crawler::{CrawlOutcome, CrawlReport, Crawler};
use crate::diff::{classify, AnalyzerResult};
use crate::extract::Registry;
use crate::fetch::{Fetcher, ReqwestTransport, Transport};
use crate::journal::Journal;
use crate::manifest::Manifest;
use crate::plan::{universe_of, UpdatePlanner};
use crate::policy::{PatternPolicy, SitePolicy};
use crate::storage::{load_previous, source_for};
use crate::url::normalize_url;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Manifest metadata key holding the configuration hash
pub const CONFIG_HASH_KEY: &str = "config-hash";

/// Everything one build pass depends on
#[derive(Clone)]
pub struct BuildContext {
    pub config: Config,
    pub fetcher: Fetcher,
    pub registry: Arc<Registry>,
    pub policy: Arc<dyn SitePolicy>,

    /// Recorded in the manifest metadata when set
    pub config_hash: Option<String>,
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("config", &self.config)
            .field("fetcher", &self.fetcher)
            .field("registry", &self.registry)
            .field("config_hash", &self.config_hash)
            .finish_non_exhaustive()
    }
}

impl BuildContext {
    /// Creates a context fetching over HTTP with the default extractors
    pub fn new(config: Config) -> crate::Result<Self> {
        let transport = ReqwestTransport::with_default_client()?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a context fetching through `transport`
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> crate::Result<Self> {
        let fetcher = Fetcher::new(transport, &config.fetcher.settings());
        let policy = PatternPolicy::from_rules(&config.rules)?;

        Ok(Self {
            config,
            fetcher,
            registry: Arc::new(Registry::with_defaults()),
            policy: Arc::new(policy),
            config_hash: None,
        })
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }
}

/// Per-invocation switches layered over the configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOverrides {
    /// Invalidate everything regardless of the diff
    pub force: bool,

    /// URLs to invalidate once, in addition to `plan.refresh`
    pub refresh: Vec<String>,
}

/// Artifacts and diagnostics of one build pass
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub manifest: Manifest,
    pub journal: Journal,
    pub analysis: AnalyzerResult,
    pub report: CrawlReport,
}

/// Runs one build pass
///
/// # Pipeline
///
/// 1. Load the previous manifest and journal
/// 2. Crawl the site into a new manifest
/// 3. Classify the differences (manual refresh and force applied here)
/// 4. Compile the next journal
///
/// Nothing is written; hand the output to an
/// [`ArtifactSink`](crate::output::ArtifactSink).
///
/// # Returns
///
/// * `Ok(BuildOutput)` - The new artifacts
/// * `Err(SwellError)` - Loading, crawling or planning failed
pub async fn run_build_pass(
    ctx: &BuildContext,
    overrides: &BuildOverrides,
) -> crate::Result<BuildOutput> {
    let config = &ctx.config;
    let site = &config.site;

    // Refresh URLs are validated before any I/O
    let refresh = refresh_set(&config.plan.refresh, &overrides.refresh)?;

    // Previous artifacts
    let source = source_for(site, &ctx.fetcher)?;
    let previous = load_previous(
        source.as_ref(),
        &site.manifest_file,
        &site.journal_file,
        site.lenient_missing,
    )
    .await?;
    let old = previous.manifest.map(Arc::new);

    // Crawl
    let crawler = Crawler::new(
        config,
        ctx.fetcher.clone(),
        Arc::clone(&ctx.registry),
        Arc::clone(&ctx.policy),
    );
    let CrawlOutcome {
        mut manifest,
        report,
    } = crawler.crawl(old.clone()).await?;

    if let Some(hash) = &ctx.config_hash {
        manifest
            .metadata
            .insert(CONFIG_HASH_KEY.to_string(), serde_json::Value::String(hash.clone()));
    }

    // Classify
    let mut analysis = classify(old.as_deref(), &manifest, refresh);
    if overrides.force || config.plan.force {
        tracing::info!("Forced build, invalidating everything");
        analysis = AnalyzerResult::forced();
    }
    tracing::info!(
        "Diff: {} deleted, {} changed, {} refreshed, {} stability changes",
        analysis.deleted.len(),
        analysis.changed.len(),
        analysis.manually_refreshed.len(),
        analysis.stability_rule_added.len() + analysis.stability_rule_removed.len()
    );

    // Plan
    let universe = universe_of(old.as_deref(), &manifest);
    let planner = UpdatePlanner::new(config.plan.settings());
    let journal = planner.plan(&universe, &analysis, &previous.journal)?;

    tracing::info!(
        "Journal epoch {} with {} entries ({} bytes)",
        journal.epoch,
        journal.entries.len(),
        journal.encoded_len()
    );

    Ok(BuildOutput {
        manifest,
        journal,
        analysis,
        report,
    })
}

/// Canonicalises the configured and command-line refresh URLs
fn refresh_set(configured: &[String], extra: &[String]) -> crate::Result<BTreeSet<String>> {
    configured
        .iter()
        .chain(extra)
        .map(|raw| Ok(normalize_url(raw)?.to_string()))
        .collect()
}
