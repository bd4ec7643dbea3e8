//! Sumi-Swell: incremental cache-invalidation planner
//!
//! This crate crawls a website's assets into a content-addressed manifest,
//! compares it with the previously published manifest, and compiles a compact
//! update journal telling a browser-resident cache which URLs to drop.

pub mod build;
pub mod config;
pub mod crawler;
pub mod diff;
pub mod extract;
pub mod fetch;
pub mod journal;
pub mod manifest;
pub mod output;
pub mod plan;
pub mod policy;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Swell operations
#[derive(Debug, Error)]
pub enum SwellError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Crawl error: {0}")]
    Crawl(#[from] crawler::CrawlError),

    #[error("Plan error: {0}")]
    Plan(#[from] plan::PlanError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// Every variant is fatal and is raised before the build pass performs any I/O.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid rule pattern: {0}")]
    InvalidPattern(String),

    #[error("Missing required setting: {0}")]
    Missing(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Sumi-Swell operations
pub type Result<T> = std::result::Result<T, SwellError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use build::{run_build_pass, BuildContext, BuildOutput, BuildOverrides};
pub use config::Config;
pub use diff::{classify, AnalyzerResult};
pub use journal::{Entry, Journal, Rule, RuleKind};
pub use manifest::{Fingerprint, Manifest};
pub use url::{normalize_url, resolve_reference};
