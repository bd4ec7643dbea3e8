//! Integration tests for the resilient fetcher
//!
//! Network behaviour is exercised against wiremock servers; admission
//! control uses an instrumented transport that tracks in-flight requests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_swell::fetch::{
    FailureCause, FetchTarget, Fetcher, FetcherSettings, ReqwestTransport, RetryPolicy,
    Transport, TransportError, TransportResponse, FAILURE_STATUS,
};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(concurrency: usize, timeout: Duration, max_attempts: u32) -> FetcherSettings {
    FetcherSettings {
        concurrency,
        timeout,
        max_attempts,
        ..FetcherSettings::default()
    }
}

fn http_fetcher(settings: &FetcherSettings) -> Fetcher {
    let transport = ReqwestTransport::with_default_client().expect("Failed to build client");
    Fetcher::new(Arc::new(transport), settings)
}

fn target(server: &MockServer, route: &str) -> FetchTarget {
    FetchTarget::new(Url::parse(&format!("{}{}", server.uri(), route)).unwrap())
}

#[tokio::test]
async fn test_fetch_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/app.js"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("console.log(1);")
                .insert_header("content-type", "application/javascript"),
        )
        .mount(&mock_server)
        .await;

    let fetcher = http_fetcher(&FetcherSettings::default());
    let response = fetcher.fetch(&target(&mock_server, "/app.js")).await;

    assert!(response.is_success());
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"console.log(1);");
    assert_eq!(
        response.content_type.as_deref(),
        Some("application/javascript")
    );
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing.css"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = http_fetcher(&FetcherSettings::default());
    let response = fetcher.fetch(&target(&mock_server, "/missing.css")).await;

    assert!(!response.is_success());
    assert_eq!(response.status, FAILURE_STATUS);
    assert_eq!(response.failure, Some(FailureCause::Status(404)));
}

#[tokio::test]
async fn test_timeout_is_terminal_after_max_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow.js"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let aborted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&aborted);
    let fetcher = http_fetcher(&settings(2, Duration::from_millis(100), 2)).with_abort_observer(
        Arc::new(move |_: &Url| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    let response = fetcher.fetch(&target(&mock_server, "/slow.js")).await;

    assert_eq!(response.failure, Some(FailureCause::Timeout));
    // One abort per timed-out attempt
    assert_eq!(aborted.load(Ordering::SeqCst), 2);
}

/// Transport that records how many requests are in flight at once
struct GaugeTransport {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    started: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Transport for GaugeTransport {
    async fn send(&self, target: &FetchTarget) -> Result<TransportResponse, TransportError> {
        self.started.lock().unwrap().push(target.url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(50)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(TransportResponse {
            status: 200,
            content_type: None,
            body: Vec::new(),
        })
    }
}

#[tokio::test]
async fn test_admission_limits_concurrency() {
    let transport = Arc::new(GaugeTransport {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
        started: Mutex::new(Vec::new()),
    });
    let fetcher = Fetcher::new(transport.clone(), &settings(2, Duration::from_secs(5), 1));

    let targets: Vec<FetchTarget> = (0..3)
        .map(|i| FetchTarget::new(Url::parse(&format!("https://example.com/{}.js", i)).unwrap()))
        .collect();

    let responses =
        futures::future::join_all(targets.iter().map(|t| fetcher.fetch(t))).await;

    assert!(responses.iter().all(|r| r.is_success()));
    assert_eq!(transport.peak.load(Ordering::SeqCst), 2);
    assert_eq!(transport.started.lock().unwrap().len(), 3);
    assert_eq!(fetcher.admission().available(), 2);
}

/// Transport that always answers 503 and counts requests per URL
#[derive(Default)]
struct UnavailableTransport {
    requests: Mutex<Vec<String>>,
}

impl UnavailableTransport {
    fn count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

#[async_trait::async_trait]
impl Transport for UnavailableTransport {
    async fn send(&self, target: &FetchTarget) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(target.url.to_string());
        Ok(TransportResponse {
            status: 503,
            content_type: None,
            body: Vec::new(),
        })
    }
}

/// Retries unavailable responses from one host only
struct RetryHost {
    host: &'static str,
    max_attempts: u32,
}

impl RetryPolicy for RetryHost {
    fn should_retry(&self, target: &FetchTarget, cause: &FailureCause, attempt: u32) -> bool {
        target.url.host_str() == Some(self.host)
            && matches!(cause, FailureCause::Status(503))
            && attempt < self.max_attempts
    }
}

#[tokio::test]
async fn test_retry_policy_sees_the_target() {
    let transport = Arc::new(UnavailableTransport::default());
    let fetcher = Fetcher::new(transport.clone(), &FetcherSettings::default()).with_retry_policy(
        Arc::new(RetryHost {
            host: "flaky.example.com",
            max_attempts: 3,
        }),
    );

    let flaky = "https://flaky.example.com/app.js";
    let steady = "https://steady.example.com/app.js";
    let targets: Vec<FetchTarget> = [flaky, steady]
        .iter()
        .map(|u| FetchTarget::new(Url::parse(u).unwrap()))
        .collect();

    let responses = futures::future::join_all(targets.iter().map(|t| fetcher.fetch(t))).await;

    assert!(responses
        .iter()
        .all(|r| r.failure == Some(FailureCause::Status(503))));
    assert_eq!(transport.count(flaky), 3);
    assert_eq!(transport.count(steady), 1);
}

#[tokio::test]
async fn test_racing_aborts_the_loser() {
    let fast = MockServer::start().await;
    let slow = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/lib.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fast"))
        .mount(&fast)
        .await;

    Mock::given(method("GET"))
        .and(path("/lib.js"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&slow)
        .await;

    let aborted = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&aborted);
    let fetcher = http_fetcher(&FetcherSettings::default()).with_abort_observer(Arc::new(
        move |url: &Url| log.lock().unwrap().push(url.to_string()),
    ));

    let slow_target = target(&slow, "/lib.js");
    let response = fetcher
        .fetch_racing(&[slow_target.clone(), target(&fast, "/lib.js")])
        .await;

    assert!(response.is_success());
    assert_eq!(response.body, b"fast");
    assert_eq!(*aborted.lock().unwrap(), vec![slow_target.url.to_string()]);
}

#[tokio::test]
async fn test_racing_all_fail() {
    let a = MockServer::start().await;
    let b = MockServer::start().await;

    for server in [&a, &b] {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
    }

    let fetcher = http_fetcher(&FetcherSettings::default());
    let response = fetcher
        .fetch_racing(&[target(&a, "/x.js"), target(&b, "/x.js")])
        .await;

    assert_eq!(response.status, FAILURE_STATUS);
    match response.failure {
        Some(cause @ FailureCause::AllFailed(_)) => assert!(cause.is_not_found()),
        other => panic!("expected aggregate failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fallback_after_grace_period() {
    let primary = MockServer::start().await;
    let mirror = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("primary")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&primary)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("mirror"))
        .mount(&mirror)
        .await;

    let fetcher = http_fetcher(&FetcherSettings::default());
    let response = fetcher
        .fetch_with_fallback(
            &target(&primary, "/pkg.js"),
            &[target(&mirror, "/pkg.js")],
            Duration::from_millis(100),
        )
        .await;

    assert!(response.is_success());
    assert_eq!(response.body, b"mirror");
    assert_eq!(response.url, format!("{}/pkg.js", mirror.uri()));
}

#[tokio::test]
async fn test_fast_primary_skips_fallback() {
    let primary = MockServer::start().await;
    let mirror = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("primary"))
        .mount(&primary)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mirror)
        .await;

    let fetcher = http_fetcher(&FetcherSettings::default());
    let response = fetcher
        .fetch_with_fallback(
            &target(&primary, "/pkg.js"),
            &[target(&mirror, "/pkg.js")],
            Duration::from_secs(2),
        )
        .await;

    assert_eq!(response.body, b"primary");
}
