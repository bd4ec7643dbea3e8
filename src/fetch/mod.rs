//! Resilient concurrent fetcher
//!
//! This module handles all network access for a build pass, including:
//! - Bounded, FIFO-fair admission of requests ([`Admission`])
//! - Per-attempt timeouts that abort the in-flight request
//! - Retrying according to a [`RetryPolicy`]
//! - Racing several candidates and falling back to mirror ladders
//!
//! Every operation resolves to a [`FetchResponse`]. Terminal failures carry
//! [`FAILURE_STATUS`] and a [`FailureCause`] instead of an `Err`.

mod admission;
mod race;
mod retry;
mod transport;

pub use admission::{Admission, AdmissionPermit};
pub use retry::{NoRetry, RetryPolicy, RetryTimeouts};
pub use transport::{
    build_http_client, ReqwestTransport, Transport, TransportError, TransportResponse,
};

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Status code carried by responses that represent a terminal failure
pub const FAILURE_STATUS: u16 = 599;

/// Callback invoked with the URL of every request aborted while in flight
pub type AbortObserver = Arc<dyn Fn(&Url) + Send + Sync>;

/// A single request to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub url: Url,
}

impl FetchTarget {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

impl From<Url> for FetchTarget {
    fn from(url: Url) -> Self {
        Self::new(url)
    }
}

/// Why a fetch ended without a successful response
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FailureCause {
    #[error("timed out")]
    Timeout,

    #[error("{0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("cancelled")]
    Cancelled,

    #[error("all {} candidates failed", .0.len())]
    AllFailed(Vec<FailureCause>),
}

impl FailureCause {
    /// Returns true if the failure means the resource does not exist
    ///
    /// An aggregate counts as not-found only if every candidate reported 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Status(404) => true,
            Self::AllFailed(causes) => {
                !causes.is_empty() && causes.iter().all(FailureCause::is_not_found)
            }
            _ => false,
        }
    }
}

/// Response-shaped outcome of every fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// URL that produced this response
    pub url: String,

    /// HTTP status, or [`FAILURE_STATUS`] for terminal failures
    pub status: u16,

    pub content_type: Option<String>,

    pub body: Vec<u8>,

    /// Set exactly when the fetch failed
    pub failure: Option<FailureCause>,
}

impl FetchResponse {
    /// Builds a terminal failure response
    pub fn failed(url: impl Into<String>, cause: FailureCause) -> Self {
        Self {
            url: url.into(),
            status: FAILURE_STATUS,
            content_type: None,
            body: Vec::new(),
            failure: Some(cause),
        }
    }

    /// Returns true for successful responses (status 200-399)
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && is_success_status(self.status)
    }

    /// The failure cause, deriving one from the status when none was recorded
    pub fn cause(&self) -> Option<FailureCause> {
        if self.is_success() {
            return None;
        }
        Some(
            self.failure
                .clone()
                .unwrap_or(FailureCause::Status(self.status)),
        )
    }
}

fn is_success_status(status: u16) -> bool {
    (200..400).contains(&status)
}

/// Fetcher tuning, taken from the `[fetcher]` configuration section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherSettings {
    pub concurrency: usize,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub throttle_threshold: usize,
    pub throttle_divisor: usize,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            concurrency: 8,
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            throttle_threshold: 5,
            throttle_divisor: 2,
        }
    }
}

/// Bounded-concurrency, retrying, cancellable network access
///
/// Cloning is cheap; clones share the same admission queue.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    admission: Arc<Admission>,
    retry: Arc<dyn RetryPolicy>,
    timeout: Duration,
    abort_observer: Option<AbortObserver>,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("admission", &self.admission)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    /// Creates a fetcher with the default [`RetryTimeouts`] policy
    pub fn new(transport: Arc<dyn Transport>, settings: &FetcherSettings) -> Self {
        Self {
            transport,
            admission: Admission::new(
                settings.concurrency,
                settings.throttle_threshold,
                settings.throttle_divisor,
            ),
            retry: Arc::new(RetryTimeouts::new(settings.max_attempts)),
            timeout: settings.timeout,
            abort_observer: None,
        }
    }

    /// Replaces the retry policy
    pub fn with_retry_policy(mut self, retry: Arc<dyn RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }

    /// Registers a callback fired for every request aborted in flight
    pub fn with_abort_observer(mut self, observer: AbortObserver) -> Self {
        self.abort_observer = Some(observer);
        self
    }

    /// The shared admission queue
    pub fn admission(&self) -> &Arc<Admission> {
        &self.admission
    }

    /// Fetches a single target
    pub async fn fetch(&self, target: &FetchTarget) -> FetchResponse {
        self.fetch_cancellable(target, &CancellationToken::new()).await
    }

    /// Fetches a single target, giving up as soon as `token` is cancelled
    ///
    /// # Attempt Flow
    ///
    /// 1. Wait for admission (FIFO)
    /// 2. Send through the transport, bounded by the configured timeout
    /// 3. On failure, ask the retry policy; a retry is a new admission request
    ///
    /// A cancelled or timed-out attempt drops its transport future, which
    /// aborts the request and notifies the abort observer.
    pub async fn fetch_cancellable(
        &self,
        target: &FetchTarget,
        token: &CancellationToken,
    ) -> FetchResponse {
        let url = target.url.as_str();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => return FetchResponse::failed(url, FailureCause::Cancelled),
                permit = self.admission.acquire() => permit,
            };
            let Ok(_permit) = permit else {
                return FetchResponse::failed(url, FailureCause::Cancelled);
            };

            tracing::trace!("Attempt {} for {}", attempt, url);
            let mut guard = AbortGuard::new(&target.url, self.abort_observer.as_ref());

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = tokio::time::timeout(self.timeout, self.transport.send(target)) => {
                    Some(result)
                }
            };

            let cause = match outcome {
                None => FailureCause::Cancelled,
                Some(Err(_elapsed)) => {
                    self.admission.record_timeout();
                    FailureCause::Timeout
                }
                Some(Ok(result)) => {
                    guard.disarm();
                    match result {
                        Ok(response) if is_success_status(response.status) => {
                            return FetchResponse {
                                url: url.to_string(),
                                status: response.status,
                                content_type: response.content_type,
                                body: response.body,
                                failure: None,
                            };
                        }
                        Ok(response) => FailureCause::Status(response.status),
                        Err(TransportError::Timeout) => {
                            self.admission.record_timeout();
                            FailureCause::Timeout
                        }
                        Err(TransportError::Network(message)) => FailureCause::Network(message),
                    }
                }
            };
            drop(guard);

            let retry = cause != FailureCause::Cancelled
                && self.retry.should_retry(target, &cause, attempt);
            if retry {
                tracing::debug!("Retrying {} after attempt {} ({})", url, attempt, cause);
                continue;
            }

            tracing::debug!("Fetch of {} failed after {} attempts: {}", url, attempt, cause);
            return FetchResponse::failed(url, cause);
        }
    }
}

/// Notifies the abort observer unless the transport future ran to completion
struct AbortGuard<'a> {
    url: &'a Url,
    observer: Option<&'a AbortObserver>,
}

impl<'a> AbortGuard<'a> {
    fn new(url: &'a Url, observer: Option<&'a AbortObserver>) -> Self {
        Self { url, observer }
    }

    fn disarm(&mut self) {
        self.observer = None;
    }
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        if let Some(observer) = self.observer {
            tracing::trace!("Aborted in-flight request to {}", self.url);
            observer(self.url);
        }
    }
}
