//! Crawl coordination
//!
//! Every discovered URL is handled by its own task and spawns one task per
//! child. The discovered set and the entry map are shared behind mutexes; the
//! first write for a URL wins. A fatal error cancels the shared token and
//! aborts the outstanding tasks.

use crate::config::{Config, FetcherConfig, SiteConfig};
use crate::crawler::roots::collect_local_roots;
use crate::crawler::{CrawlError, CrawlEvent, CrawlObserver, CrawlReport};
use crate::extract::Registry;
use crate::fetch::{FailureCause, FetchResponse, FetchTarget, Fetcher};
use crate::manifest::{import_subtree, Fingerprint, Manifest};
use crate::policy::SitePolicy;
use crate::url::local_path_for;
use futures::future::{BoxFuture, FutureExt};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Manifest and report produced by one crawl
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub manifest: Manifest,
    pub report: CrawlReport,
}

/// Resource-graph crawler
///
/// Clones share the fetcher's admission queue.
#[derive(Clone)]
pub struct Crawler {
    site: SiteConfig,
    fetcher_config: FetcherConfig,
    schema_version: u32,
    fetcher: Fetcher,
    registry: Arc<Registry>,
    policy: Arc<dyn SitePolicy>,
    observer: Option<CrawlObserver>,
}

impl std::fmt::Debug for Crawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crawler")
            .field("root", &self.site.root)
            .field("base_url", &self.site.base_url.as_str())
            .field("fetcher", &self.fetcher)
            .finish_non_exhaustive()
    }
}

impl Crawler {
    /// Creates a crawler for the site described by `config`
    pub fn new(
        config: &Config,
        fetcher: Fetcher,
        registry: Arc<Registry>,
        policy: Arc<dyn SitePolicy>,
    ) -> Self {
        Self {
            site: config.site.clone(),
            fetcher_config: config.fetcher.clone(),
            schema_version: config.plan.schema_version,
            fetcher,
            registry,
            policy,
            observer: None,
        }
    }

    /// Registers a callback receiving every [`CrawlEvent`]
    pub fn with_observer(mut self, observer: CrawlObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Crawls from every file below the site root plus the external URLs
    ///
    /// # Arguments
    ///
    /// * `old` - Previously published manifest, source of reusable stable entries
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOutcome)` - The new manifest and crawl counters
    /// * `Err(CrawlError)` - A resource could not be loaded
    pub async fn crawl(&self, old: Option<Arc<Manifest>>) -> Result<CrawlOutcome, CrawlError> {
        // Published artifacts inside the site root are never crawled
        let skip: Vec<PathBuf> = [&self.site.manifest_file, &self.site.journal_file]
            .into_iter()
            .filter_map(|name| {
                let artifact = self.site.output_dir.join(name);
                artifact
                    .strip_prefix(&self.site.root)
                    .ok()
                    .map(Path::to_path_buf)
            })
            .collect();
        let mut roots = collect_local_roots(&self.site.root, &self.site.base_url, &skip).await?;
        let local = roots.len();
        roots.extend(self.site.external.iter().cloned());

        tracing::info!(
            "Crawling {} local and {} external roots",
            local,
            self.site.external.len()
        );

        self.crawl_from(roots, old).await
    }

    /// Crawls from an explicit root set
    pub async fn crawl_from(
        &self,
        roots: Vec<Url>,
        old: Option<Arc<Manifest>>,
    ) -> Result<CrawlOutcome, CrawlError> {
        let state = Arc::new(CrawlState {
            crawler: self.clone(),
            old,
            token: CancellationToken::new(),
            discovered: Mutex::new(HashSet::new()),
            entries: Mutex::new(BTreeMap::new()),
            report: Mutex::new(CrawlReport::default()),
            failure: Mutex::new(None),
        });

        let mut tasks = JoinSet::new();
        for root in roots {
            let root = self.policy.rewrite(root);
            tasks.spawn(discover(Arc::clone(&state), root));
        }
        join_children(&state, tasks).await;

        if let Some(error) = lock(&state.failure).take() {
            tracing::error!("Crawl aborted: {}", error);
            return Err(error);
        }

        let mut manifest = Manifest::new(self.schema_version);
        manifest.entries = std::mem::take(&mut *lock(&state.entries));
        manifest.metadata.insert(
            "built-at".to_string(),
            serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
        );

        let report = lock(&state.report).clone();
        tracing::info!(
            "Crawl complete: {} entries ({} read, {} fetched, {} reused, {} parse failures)",
            manifest.len(),
            report.read,
            report.fetched,
            report.reused,
            report.parse_failures.len()
        );

        Ok(CrawlOutcome { manifest, report })
    }

    async fn fetch_remote(&self, url: &Url, token: &CancellationToken) -> FetchResponse {
        let target = FetchTarget::new(url.clone());
        let ladder: Vec<FetchTarget> = self
            .fetcher_config
            .mirror_ladder(url)
            .into_iter()
            .map(FetchTarget::from)
            .collect();

        if ladder.is_empty() {
            return self.fetcher.fetch_cancellable(&target, token).await;
        }

        tracing::debug!("Fetching {} with {} fallbacks", url, ladder.len());
        tokio::select! {
            biased;
            _ = token.cancelled() => FetchResponse::failed(url.as_str(), FailureCause::Cancelled),
            response = self.fetcher.fetch_with_fallback(
                &target,
                &ladder,
                self.fetcher_config.fallback_grace(),
            ) => response,
        }
    }
}

/// State shared by every task of one crawl
struct CrawlState {
    crawler: Crawler,
    old: Option<Arc<Manifest>>,
    token: CancellationToken,
    discovered: Mutex<HashSet<String>>,
    entries: Mutex<BTreeMap<String, Fingerprint>>,
    report: Mutex<CrawlReport>,
    failure: Mutex<Option<CrawlError>>,
}

/// Loaded resource content
struct Loaded {
    content_type: Option<String>,
    body: Vec<u8>,
}

impl CrawlState {
    fn emit(&self, event: CrawlEvent) {
        if let Some(observer) = &self.crawler.observer {
            observer(&event);
        }
    }

    /// Keeps the first fatal error and cancels every task
    fn fail(&self, error: CrawlError) {
        let mut failure = lock(&self.failure);
        if failure.is_none() {
            *failure = Some(error);
        }
        self.token.cancel();
    }

    fn record(&self, url: String, fingerprint: Fingerprint) {
        lock(&self.entries).entry(url).or_insert(fingerprint);
    }

    /// Copies a stable URL's subtree out of the old manifest
    ///
    /// Returns None when there is nothing to reuse.
    fn reuse(&self, url: &str) -> Option<usize> {
        let old = self.old.as_deref()?;
        if !old.contains(url) {
            return None;
        }

        let imported = import_subtree(old, url);
        let count = imported.len();

        let mut discovered = lock(&self.discovered);
        let mut entries = lock(&self.entries);
        for (url, fingerprint) in imported {
            discovered.insert(url.clone());
            entries.entry(url).or_insert(fingerprint);
        }

        Some(count)
    }

    /// Reads a resource from the site root, or fetches it
    ///
    /// Failures are recorded through [`CrawlState::fail`].
    async fn load(&self, url: &Url) -> Option<Loaded> {
        let crawler = &self.crawler;

        if let Some(path) = local_path_for(url, &crawler.site.base_url, &crawler.site.root) {
            tracing::debug!("Reading {} from {}", url, path.display());
            return match tokio::fs::read(&path).await {
                Ok(body) => {
                    lock(&self.report).read += 1;
                    Some(Loaded {
                        content_type: None,
                        body,
                    })
                }
                Err(source) => {
                    self.fail(CrawlError::Io { path, source });
                    None
                }
            };
        }

        let response = crawler.fetch_remote(url, &self.token).await;
        if response.is_success() {
            lock(&self.report).fetched += 1;
            return Some(Loaded {
                content_type: response.content_type,
                body: response.body,
            });
        }

        match response.cause() {
            Some(FailureCause::Cancelled) | None => {}
            Some(cause) => self.fail(CrawlError::Fetch {
                url: url.to_string(),
                cause,
            }),
        }
        None
    }
}

/// Handles one URL and, through child tasks, everything it references
fn discover(state: Arc<CrawlState>, url: Url) -> BoxFuture<'static, ()> {
    async move {
        if state.token.is_cancelled() {
            return;
        }

        let crawler = &state.crawler;
        let key = url.to_string();

        let newly_discovered = lock(&state.discovered).insert(key.clone());
        if !newly_discovered {
            lock(&state.report).duplicates += 1;
            state.emit(CrawlEvent::Duplicate { url: key });
            return;
        }

        if crawler.policy.is_excluded(&url) {
            tracing::debug!("Skipping excluded {}", url);
            lock(&state.report).skipped += 1;
            state.emit(CrawlEvent::Skipped { url: key });
            return;
        }

        lock(&state.report).discovered += 1;

        // Stable resources already fingerprinted are never loaded again
        let stable = crawler.policy.is_stable(&url);
        if stable {
            if let Some(imported) = state.reuse(&key) {
                tracing::debug!("Reused {} entries for stable {}", imported, url);
                lock(&state.report).reused += imported;
                state.emit(CrawlEvent::Reused { url: key, imported });
                return;
            }
        }

        state.emit(CrawlEvent::Discovered { url: key.clone() });

        let Some(loaded) = state.load(&url).await else {
            return;
        };

        let kind = crawler
            .registry
            .content_kind(&url, loaded.content_type.as_deref());
        let (children, parsed) = match crawler.registry.extract(kind, &loaded.body, &url) {
            Ok(children) => (children, true),
            Err(e) => {
                tracing::warn!("Skipping references of {}: {}", url, e);
                lock(&state.report).parse_failures.push(e.to_string());
                (Vec::new(), false)
            }
        };

        let mut seen = HashSet::new();
        let children: Vec<Url> = children
            .into_iter()
            .map(|child| crawler.policy.rewrite(child))
            .filter(|child| !crawler.policy.is_excluded(child))
            .filter(|child| seen.insert(child.to_string()))
            .collect();

        let aggregate = stable && parsed && crawler.registry.has_extractor(kind);
        let recorded = crawler.policy.is_cache_candidate(&url);

        if recorded && !aggregate {
            state.record(key.clone(), Fingerprint::Hash(sha256_hex(&loaded.body)));
        }
        drop(loaded);

        tracing::debug!("{} ({}) references {} URLs", url, kind, children.len());

        let mut tasks = JoinSet::new();
        for child in &children {
            tasks.spawn(discover(Arc::clone(&state), child.clone()));
        }
        join_children(&state, tasks).await;

        if recorded && aggregate && !state.token.is_cancelled() {
            let list = children.iter().map(Url::to_string).collect();
            state.record(key, Fingerprint::Children(list));
        }
    }
    .boxed()
}

/// Waits for every child task, aborting the rest once the crawl has failed
async fn join_children(state: &CrawlState, mut tasks: JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                state.fail(CrawlError::Task(e.to_string()));
            }
        }

        if state.token.is_cancelled() {
            tasks.abort_all();
        }
    }
}

fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLayer;
    use crate::fetch::{FetcherSettings, Transport, TransportError, TransportResponse};
    use crate::policy::PatternPolicy;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Serves fixed responses and records every request
    #[derive(Default)]
    struct MapTransport {
        routes: HashMap<String, (Option<&'static str>, Vec<u8>)>,
        requests: Mutex<Vec<String>>,
    }

    impl MapTransport {
        fn route(mut self, url: &str, content_type: Option<&'static str>, body: &[u8]) -> Self {
            self.routes
                .insert(url.to_string(), (content_type, body.to_vec()));
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Transport for MapTransport {
        async fn send(&self, target: &FetchTarget) -> Result<TransportResponse, TransportError> {
            self.requests.lock().unwrap().push(target.url.to_string());
            Ok(match self.routes.get(target.url.as_str()) {
                Some((content_type, body)) => TransportResponse {
                    status: 200,
                    content_type: content_type.map(str::to_string),
                    body: body.clone(),
                },
                None => TransportResponse {
                    status: 404,
                    content_type: None,
                    body: Vec::new(),
                },
            })
        }
    }

    fn config(root: &std::path::Path, rules: &str) -> Config {
        let layer = ConfigLayer::from_toml(&format!(
            "[site]\nbase-url = \"https://example.com/\"\n{}",
            rules
        ))
        .unwrap();
        let mut config = Config::from_layers(&[layer]).unwrap();
        config.site.root = root.to_path_buf();
        config.site.output_dir = root.to_path_buf();
        config
    }

    fn crawler(config: &Config, transport: Arc<MapTransport>) -> Crawler {
        let fetcher = Fetcher::new(transport, &FetcherSettings::default());
        let policy = PatternPolicy::from_rules(&config.rules).unwrap();
        Crawler::new(config, fetcher, Arc::new(Registry::default()), Arc::new(policy))
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn write(dir: &TempDir, path: &str, content: &str) {
        let path = dir.path().join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_crawl_local_site() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "index.html",
            r#"<html><head><link rel="stylesheet" href="style.css"></head>
               <body><script src="app.js"></script></body></html>"#,
        );
        write(&dir, "style.css", "body { background: url(img/logo.png) }");
        write(&dir, "app.js", "console.log('hi');");
        write(&dir, "img/logo.png", "png");

        let config = config(dir.path(), "");
        let transport = Arc::new(MapTransport::default());
        let outcome = crawler(&config, transport.clone())
            .crawl(None)
            .await
            .unwrap();

        let urls: Vec<&str> = outcome.manifest.urls().collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/",
                "https://example.com/app.js",
                "https://example.com/img/logo.png",
                "https://example.com/style.css",
            ]
        );
        assert_eq!(
            outcome.manifest.get("https://example.com/app.js"),
            Some(&Fingerprint::Hash(sha256_hex(b"console.log('hi');")))
        );
        assert_eq!(outcome.report.read, 4);
        assert!(transport.requests().is_empty());
        assert!(outcome.manifest.metadata.contains_key("built-at"));
    }

    #[tokio::test]
    async fn test_file_name_with_stray_percent_is_read_locally() {
        let dir = TempDir::new().unwrap();
        write(&dir, "100%.png", "png");

        let config = config(dir.path(), "");
        let transport = Arc::new(MapTransport::default());
        let outcome = crawler(&config, transport.clone())
            .crawl(None)
            .await
            .unwrap();

        assert!(outcome.manifest.contains("https://example.com/100%.png"));
        assert_eq!(outcome.report.read, 1);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_artifacts_are_not_crawled() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.css", "body {}");
        write(&dir, "manifest.json", "{}");
        write(&dir, "journal.json", "{}");

        let config = config(dir.path(), "");
        let outcome = crawler(&config, Arc::new(MapTransport::default()))
            .crawl(None)
            .await
            .unwrap();

        assert_eq!(outcome.manifest.len(), 1);
    }

    #[tokio::test]
    async fn test_stable_aggregate_lists_children() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), "[rules]\nstable = [\"@\\\\d\"]");
        let transport = Arc::new(
            MapTransport::default()
                .route(
                    "https://cdn.example.net/pkg@1.0/index.js",
                    Some("application/javascript"),
                    b"import './util.js';",
                )
                .route(
                    "https://cdn.example.net/pkg@1.0/util.js",
                    Some("application/javascript"),
                    b"export const x = 1;",
                ),
        );

        let outcome = crawler(&config, transport)
            .crawl_from(vec![url("https://cdn.example.net/pkg@1.0/index.js")], None)
            .await
            .unwrap();

        assert_eq!(
            outcome.manifest.get("https://cdn.example.net/pkg@1.0/index.js"),
            Some(&Fingerprint::Children(vec![
                "https://cdn.example.net/pkg@1.0/util.js".to_string()
            ]))
        );
        assert_eq!(
            outcome.manifest.get("https://cdn.example.net/pkg@1.0/util.js"),
            Some(&Fingerprint::Children(vec![]))
        );
    }

    #[tokio::test]
    async fn test_stable_resources_are_reused() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), "[rules]\nstable = [\"@\\\\d\"]");

        let mut old = Manifest::new(config.plan.schema_version);
        old.entries.insert(
            "https://cdn.example.net/pkg@1.0/index.js".to_string(),
            Fingerprint::Children(vec!["https://cdn.example.net/pkg@1.0/util.js".to_string()]),
        );
        old.entries.insert(
            "https://cdn.example.net/pkg@1.0/util.js".to_string(),
            Fingerprint::Hash("h1".to_string()),
        );

        let transport = Arc::new(MapTransport::default());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let outcome = crawler(&config, transport.clone())
            .with_observer(Arc::new(move |event: &CrawlEvent| {
                sink.lock().unwrap().push(event.clone());
            }))
            .crawl_from(
                vec![url("https://cdn.example.net/pkg@1.0/index.js")],
                Some(Arc::new(old.clone())),
            )
            .await
            .unwrap();

        assert_eq!(outcome.manifest.entries, old.entries);
        assert_eq!(outcome.report.reused, 2);
        assert!(transport.requests().is_empty());
        assert_eq!(
            *events.lock().unwrap(),
            vec![CrawlEvent::Reused {
                url: "https://cdn.example.net/pkg@1.0/index.js".to_string(),
                imported: 2,
            }]
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_aborts_crawl() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), "");
        let transport = Arc::new(MapTransport::default().route(
            "https://cdn.example.net/app.css",
            Some("text/css"),
            b"@import 'missing.css';",
        ));

        let result = crawler(&config, transport)
            .crawl_from(vec![url("https://cdn.example.net/app.css")], None)
            .await;

        match result {
            Err(CrawlError::Fetch { url, cause }) => {
                assert_eq!(url, "https://cdn.example.net/missing.css");
                assert_eq!(cause, FailureCause::Status(404));
            }
            other => panic!("expected fetch error, got {:?}", other.map(|o| o.manifest)),
        }
    }

    #[tokio::test]
    async fn test_missing_local_file_aborts_crawl() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), "");

        let result = crawler(&config, Arc::new(MapTransport::default()))
            .crawl_from(vec![url("https://example.com/gone.js")], None)
            .await;

        assert!(matches!(result, Err(CrawlError::Io { .. })));
    }

    #[tokio::test]
    async fn test_exclusion_and_cache_candidates() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "index.html",
            r#"<script src="app.js"></script><script src="debug.js"></script>"#,
        );
        write(&dir, "app.js", "1");

        let config = config(
            dir.path(),
            "[rules]\nexclude = [\"debug\\\\.js$\"]\ncache = [\"\\\\.js$\"]",
        );
        let outcome = crawler(&config, Arc::new(MapTransport::default()))
            .crawl_from(vec![url("https://example.com/")], None)
            .await
            .unwrap();

        let urls: Vec<&str> = outcome.manifest.urls().collect();
        assert_eq!(urls, vec!["https://example.com/app.js"]);
    }

    #[tokio::test]
    async fn test_duplicates_are_reported() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.js", "1");
        let config = config(dir.path(), "");

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let outcome = crawler(&config, Arc::new(MapTransport::default()))
            .with_observer(Arc::new(move |event: &CrawlEvent| {
                sink.lock().unwrap().push(event.clone());
            }))
            .crawl_from(
                vec![url("https://example.com/a.js"), url("https://example.com/a.js")],
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.report.duplicates, 1);
        let events = events.lock().unwrap();
        assert!(events.contains(&CrawlEvent::Duplicate {
            url: "https://example.com/a.js".to_string()
        }));
        assert_eq!(outcome.manifest.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_content_skips_subtree() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path(), "");
        let transport = Arc::new(MapTransport::default().route(
            "https://cdn.example.net/page.html",
            Some("text/html"),
            &[0x3c, 0xff, 0xfe, 0x3e],
        ));

        let outcome = crawler(&config, transport)
            .crawl_from(vec![url("https://cdn.example.net/page.html")], None)
            .await
            .unwrap();

        assert_eq!(outcome.report.parse_failures.len(), 1);
        assert!(outcome
            .manifest
            .contains("https://cdn.example.net/page.html"));
    }

    #[tokio::test]
    async fn test_rewrite_applies_before_fetch() {
        let dir = TempDir::new().unwrap();
        let config = config(
            dir.path(),
            "[[rules.rewrite]]\npattern = \"^https://unpkg\\\\.com/\"\nreplacement = \"https://cdn.example.net/\"",
        );
        let transport = Arc::new(MapTransport::default().route(
            "https://cdn.example.net/lib.js",
            None,
            b"1",
        ));

        let outcome = crawler(&config, transport.clone())
            .crawl_from(vec![url("https://unpkg.com/lib.js")], None)
            .await
            .unwrap();

        assert!(outcome.manifest.contains("https://cdn.example.net/lib.js"));
        assert_eq!(transport.requests(), vec!["https://cdn.example.net/lib.js"]);
    }
}
