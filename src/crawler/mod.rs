//! Resource-graph crawler
//!
//! This module walks every asset reachable from the site root and the
//! configured external URLs, including:
//! - Local file reads for URLs served from the site root
//! - Network fetches (with mirror fallback) for everything else
//! - Reference extraction through the content-type registry
//! - Copying stable resources forward from the previous manifest
//!
//! The result is a [`Manifest`](crate::manifest::Manifest) plus a
//! [`CrawlReport`].

mod coordinator;
mod roots;

pub use coordinator::{CrawlOutcome, Crawler};
pub use roots::collect_local_roots;

use crate::fetch::FailureCause;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Fatal crawl errors; any of them aborts the whole pass
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Failed to fetch {url}: {cause}")]
    Fetch { url: String, cause: FailureCause },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Crawl task failed: {0}")]
    Task(String),
}

/// Progress notifications delivered to a [`CrawlObserver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    /// First sighting of a URL that will be loaded
    Discovered { url: String },

    /// A stable URL copied from the previous manifest with `imported` entries
    Reused { url: String, imported: usize },

    /// A URL seen again; nothing is done
    Duplicate { url: String },

    /// An excluded URL
    Skipped { url: String },
}

/// Callback receiving crawl events, possibly from several tasks at once
pub type CrawlObserver = Arc<dyn Fn(&CrawlEvent) + Send + Sync>;

/// Counters collected during one crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// URLs loaded or reused
    pub discovered: usize,

    /// Resources read from the site root
    pub read: usize,

    /// Resources fetched over the network
    pub fetched: usize,

    /// Entries copied from the previous manifest
    pub reused: usize,

    pub duplicates: usize,

    /// Excluded URLs
    pub skipped: usize,

    /// Extraction errors; the affected resources were recorded without children
    pub parse_failures: Vec<String>,
}
