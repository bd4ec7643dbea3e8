//! Integration tests for the crawler
//!
//! These tests use wiremock to serve external resources and tempfile for the
//! local site root, and run complete crawls end-to-end.

use std::sync::Arc;
use sumi_swell::config::{Config, ConfigLayer};
use sumi_swell::crawler::{CrawlError, Crawler};
use sumi_swell::extract::Registry;
use sumi_swell::fetch::{FailureCause, Fetcher, ReqwestTransport};
use sumi_swell::manifest::{Fingerprint, Manifest};
use sumi_swell::policy::PatternPolicy;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a configuration for a site rooted at `root`
fn create_test_config(root: &TempDir, extra: &str) -> Config {
    let layer = ConfigLayer::from_toml(&format!(
        "[site]\nbase-url = \"https://example.com/\"\n{}",
        extra
    ))
    .expect("Failed to parse test config");
    let mut config = Config::from_layers(&[layer]).expect("Invalid test config");
    config.site.root = root.path().to_path_buf();
    config
}

fn create_crawler(config: &Config) -> Crawler {
    let transport = ReqwestTransport::with_default_client().expect("Failed to build client");
    let fetcher = Fetcher::new(Arc::new(transport), &config.fetcher.settings());
    let policy = PatternPolicy::from_rules(&config.rules).expect("Invalid rules");
    Crawler::new(config, fetcher, Arc::new(Registry::default()), Arc::new(policy))
}

fn css(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/css")
}

#[tokio::test]
async fn test_full_crawl_local_and_external() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/lib/theme.css"))
        .respond_with(css("@font-face { src: url(fonts/body.woff2) }"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/lib/fonts/body.woff2"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
        .mount(&mock_server)
        .await;

    let root = TempDir::new().unwrap();
    std::fs::write(
        root.path().join("index.html"),
        format!(
            r#"<html><head><link rel="stylesheet" href="{}/lib/theme.css"></head>
            <body><img src="logo.png"></body></html>"#,
            base_url
        ),
    )
    .unwrap();
    std::fs::write(root.path().join("logo.png"), [0u8; 8]).unwrap();

    let config = create_test_config(&root, "");
    let outcome = create_crawler(&config).crawl(None).await.unwrap();

    let urls: Vec<&str> = outcome.manifest.urls().collect();
    assert_eq!(urls.len(), 4, "unexpected manifest: {:?}", urls);
    assert!(outcome.manifest.contains("https://example.com/"));
    assert!(outcome.manifest.contains("https://example.com/logo.png"));
    assert!(outcome
        .manifest
        .contains(&format!("{}/lib/theme.css", base_url)));
    assert!(outcome
        .manifest
        .contains(&format!("{}/lib/fonts/body.woff2", base_url)));

    assert_eq!(outcome.report.read, 2);
    assert_eq!(outcome.report.fetched, 2);
}

#[tokio::test]
async fn test_mirror_fallback_replaces_failing_primary() {
    let primary = MockServer::start().await;
    let mirror = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pkg/app.js"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&primary)
        .await;

    Mock::given(method("GET"))
        .and(path("/pkg/app.js"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("export default 1;")
                .insert_header("content-type", "application/javascript"),
        )
        .mount(&mirror)
        .await;

    let root = TempDir::new().unwrap();
    let config = create_test_config(
        &root,
        &format!(
            "external = [\"{p}/pkg/app.js\"]\n[[fetcher.mirrors]]\nprefix = \"{p}/\"\nladder = [\"{m}/\"]",
            p = primary.uri(),
            m = mirror.uri()
        ),
    );

    let outcome = create_crawler(&config).crawl(None).await.unwrap();

    // Recorded under the canonical URL, not the mirror
    let key = format!("{}/pkg/app.js", primary.uri());
    assert!(matches!(outcome.manifest.get(&key), Some(Fingerprint::Hash(_))));
    assert_eq!(outcome.manifest.len(), 1);
}

#[tokio::test]
async fn test_missing_external_resource_aborts_crawl() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/app.css"))
        .respond_with(css("@import \"gone.css\";"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gone.css"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let root = TempDir::new().unwrap();
    let config = create_test_config(
        &root,
        &format!("external = [\"{}/app.css\"]", mock_server.uri()),
    );

    let result = create_crawler(&config).crawl(None).await;

    match result {
        Err(CrawlError::Fetch { url, cause }) => {
            assert_eq!(url, format!("{}/gone.css", mock_server.uri()));
            assert_eq!(cause, FailureCause::Status(404));
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("crawl should have failed"),
    }
}

#[tokio::test]
async fn test_stable_resources_are_not_refetched() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let lib = format!("{}/lib@2.1.0/index.js", mock_server.uri());
    let dep = format!("{}/lib@2.1.0/dep.js", mock_server.uri());

    let root = TempDir::new().unwrap();
    let config = create_test_config(
        &root,
        &format!("external = [\"{}\"]\n[rules]\nstable = [\"@\\\\d\"]", lib),
    );

    let mut old = Manifest::new(config.plan.schema_version);
    old.entries
        .insert(lib.clone(), Fingerprint::Children(vec![dep.clone()]));
    old.entries
        .insert(dep.clone(), Fingerprint::Hash("d".to_string()));

    let outcome = create_crawler(&config)
        .crawl(Some(Arc::new(old.clone())))
        .await
        .unwrap();

    assert_eq!(outcome.manifest.entries, old.entries);
    assert_eq!(outcome.report.reused, 2);
    assert_eq!(outcome.report.fetched, 0);
}

#[tokio::test]
async fn test_published_artifacts_below_root_are_not_crawled() {
    let root = TempDir::new().unwrap();
    let out = root.path().join("sw");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(root.path().join("index.html"), "<html></html>").unwrap();
    std::fs::write(out.join("worker.js"), "self.skipWaiting();").unwrap();
    std::fs::write(out.join("manifest.json"), "{}").unwrap();
    std::fs::write(out.join("journal.json"), "{}").unwrap();

    let config = create_test_config(&root, &format!("output-dir = '{}'", out.display()));
    assert_eq!(config.site.output_dir, out);

    let outcome = create_crawler(&config).crawl(None).await.unwrap();
    let urls: Vec<&str> = outcome.manifest.urls().collect();

    assert_eq!(
        urls,
        vec!["https://example.com/", "https://example.com/sw/worker.js"]
    );
}

#[tokio::test]
async fn test_external_urls_are_canonical() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a/b.css"))
        .respond_with(css("body {}"))
        .mount(&mock_server)
        .await;

    let root = TempDir::new().unwrap();
    let config = create_test_config(
        &root,
        &format!("external = [\"{}/a/./x/../b.css#top\"]", mock_server.uri()),
    );

    let outcome = create_crawler(&config).crawl(None).await.unwrap();
    let expected = Url::parse(&format!("{}/a/b.css", mock_server.uri())).unwrap();

    assert!(outcome.manifest.contains(expected.as_str()));
}
