//! Network transports used by the fetcher
//!
//! The fetcher never talks to `reqwest` directly: every request goes through a
//! [`Transport`], so tests can substitute an instrumented implementation.

use crate::fetch::FetchTarget;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Errors a transport can report for a single request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),
}

/// Raw response returned by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Performs a single request
///
/// Implementations must be cancel-safe: dropping the returned future aborts
/// the request.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, target: &FetchTarget) -> Result<TransportResponse, TransportError>;
}

/// Builds the HTTP client shared by every request of a build pass
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use sumi_swell::fetch::build_http_client;
///
/// let client = build_http_client().unwrap();
/// ```
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    // Format: CrateName/Version
    let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    // Per-attempt timeouts are enforced by the fetcher
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Transport`] backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a transport around [`build_http_client`]
    pub fn with_default_client() -> Result<Self, reqwest::Error> {
        build_http_client().map(Self::new)
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, target: &FetchTarget) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .get(target.url.clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(classify_error)?;

        Ok(TransportResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}

fn classify_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Network(format!("Connection failed: {}", error))
    } else {
        TransportError::Network(error.to_string())
    }
}
