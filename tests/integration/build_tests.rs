//! Integration tests for complete build passes
//!
//! Each test builds a small site in a temporary directory, runs one or more
//! passes and inspects the manifest, classification and journal.

use sumi_swell::build::{run_build_pass, BuildContext, BuildOutput, BuildOverrides, CONFIG_HASH_KEY};
use sumi_swell::config::{Config, ConfigLayer};
use sumi_swell::journal::{Entry, Journal};
use sumi_swell::manifest::{Fingerprint, Manifest};
use sumi_swell::output::{ArtifactSink, BuildStatistics, JsonDirSink};
use sumi_swell::storage::StorageError;
use sumi_swell::SwellError;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INDEX: &str = "https://example.com/";
const APP: &str = "https://example.com/app.js";

/// A site with one page and one script, plus a separate output directory
struct TestSite {
    root: TempDir,
    out: TempDir,
}

impl TestSite {
    fn new() -> Self {
        let site = Self {
            root: TempDir::new().unwrap(),
            out: TempDir::new().unwrap(),
        };
        site.write("index.html", r#"<html><script src="app.js"></script></html>"#);
        site.write("app.js", "console.log('v1');");
        site
    }

    fn write(&self, name: &str, content: &str) {
        std::fs::write(self.root.path().join(name), content).unwrap();
    }

    fn config(&self, extra: &str) -> Config {
        let layer = ConfigLayer::from_toml(&format!(
            "[site]\nbase-url = \"https://example.com/\"\n{}",
            extra
        ))
        .expect("Failed to parse test config");
        let mut config = Config::from_layers(&[layer]).expect("Invalid test config");
        config.site.root = self.root.path().to_path_buf();
        config.site.output_dir = self.out.path().to_path_buf();
        config
    }

    async fn build(&self, config: Config, overrides: &BuildOverrides) -> BuildOutput {
        let ctx = BuildContext::new(config.clone())
            .unwrap()
            .with_config_hash("test-hash");
        let output = run_build_pass(&ctx, overrides).await.unwrap();

        let mut sink = JsonDirSink::new(
            &config.site.output_dir,
            &config.site.manifest_file,
            &config.site.journal_file,
        );
        sink.write(&output.manifest, &output.journal).unwrap();
        output
    }
}

#[tokio::test]
async fn test_first_build() {
    let site = TestSite::new();
    let output = site.build(site.config(""), &BuildOverrides::default()).await;

    let urls: Vec<&str> = output.manifest.urls().collect();
    assert_eq!(urls, vec![INDEX, APP]);
    assert_eq!(
        output.manifest.metadata.get(CONFIG_HASH_KEY),
        Some(&serde_json::Value::String("test-hash".to_string()))
    );

    assert!(output.analysis.is_empty());
    assert_eq!(output.journal.epoch, 1);
    assert_eq!(output.journal.entries, vec![Entry::version_only(0)]);

    assert!(site.out.path().join("manifest.json").exists());
    assert!(site.out.path().join("journal.json").exists());
}

#[tokio::test]
async fn test_second_build_invalidates_changed_script() {
    let site = TestSite::new();
    site.build(site.config(""), &BuildOverrides::default()).await;

    site.write("app.js", "console.log('v2');");
    let output = site.build(site.config(""), &BuildOverrides::default()).await;

    assert_eq!(output.analysis.changed.len(), 1);
    assert!(output.analysis.changed.contains(APP));

    assert_eq!(output.journal.epoch, 2);
    let newest = &output.journal.entries[0];
    assert_eq!(newest.version, 1);

    let matchers: Vec<_> = newest
        .rules()
        .iter()
        .flat_map(|rule| rule.matchers().unwrap())
        .collect();
    assert!(matchers.iter().any(|m| m.matches(APP)));
    assert!(!matchers.iter().any(|m| m.matches(INDEX)));

    let stats = BuildStatistics::collect(&output);
    assert_eq!(stats.changed, 1);
    assert_eq!(stats.journal_entries, 2);
}

#[tokio::test]
async fn test_unchanged_build_emits_version_only_entry() {
    let site = TestSite::new();
    site.build(site.config(""), &BuildOverrides::default()).await;
    let output = site.build(site.config(""), &BuildOverrides::default()).await;

    assert!(output.analysis.is_empty());
    assert_eq!(output.journal.entries[0], Entry::version_only(1));
}

#[tokio::test]
async fn test_manual_refresh_and_force() {
    let site = TestSite::new();
    site.build(site.config(""), &BuildOverrides::default()).await;

    let refreshed = site
        .build(
            site.config(""),
            &BuildOverrides {
                force: false,
                refresh: vec![INDEX.to_string()],
            },
        )
        .await;
    assert!(refreshed.analysis.manually_refreshed.contains(INDEX));
    assert!(!refreshed.journal.entries[0].rules().is_empty());

    let forced = site
        .build(
            site.config(""),
            &BuildOverrides {
                force: true,
                refresh: vec![],
            },
        )
        .await;
    assert!(forced.analysis.force);
    assert_eq!(forced.journal.epoch, refreshed.journal.epoch + 1);
    assert_eq!(forced.journal.entries, vec![Entry::version_only(2)]);
}

#[tokio::test]
async fn test_strict_mode_requires_previous_artifacts() {
    let site = TestSite::new();
    let config = site.config("lenient-missing = false");

    let ctx = BuildContext::new(config).unwrap();
    let result = run_build_pass(&ctx, &BuildOverrides::default()).await;

    assert!(matches!(
        result,
        Err(SwellError::Storage(StorageError::Missing(_)))
    ));
}

#[tokio::test]
async fn test_previous_artifacts_from_published_site() {
    let mock_server = MockServer::start().await;
    let site = TestSite::new();
    let config = site.config(&format!("previous = \"{}/\"", mock_server.uri()));

    let mut published = Manifest::new(config.plan.schema_version);
    published
        .entries
        .insert(APP.to_string(), Fingerprint::Hash("stale".to_string()));
    let journal = Journal {
        epoch: 7,
        entries: vec![Entry::version_only(5)],
    };

    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(published.to_json().unwrap()))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/journal.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(journal.to_json().unwrap()))
        .mount(&mock_server)
        .await;

    let output = site.build(config, &BuildOverrides::default()).await;

    assert!(output.analysis.changed.contains(APP));
    assert_eq!(output.journal.epoch, 8);
    assert_eq!(output.journal.entries[0].version, 6);
}

#[tokio::test]
async fn test_unpublished_remote_site_is_a_first_build() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let site = TestSite::new();
    let config = site.config(&format!("previous = \"{}\"", mock_server.uri()));
    let output = site.build(config, &BuildOverrides::default()).await;

    assert_eq!(output.journal.epoch, 1);
    assert_eq!(output.manifest.len(), 2);
}

#[tokio::test]
async fn test_schema_change_forces_total_invalidation() {
    let site = TestSite::new();
    site.build(site.config(""), &BuildOverrides::default()).await;

    let config = site.config("[plan]\nschema-version = 99");
    let output = site.build(config, &BuildOverrides::default()).await;

    assert!(output.analysis.force);
    assert_eq!(output.manifest.schema_version, 99);
    assert_eq!(output.journal.entries, vec![Entry::version_only(1)]);
}
