//! Artifact sink trait and error types
//!
//! A sink receives the two artifacts of a build pass. It is the handoff point
//! to whatever turns them into a script for the caching agent.

use crate::journal::Journal;
use crate::manifest::Manifest;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing artifacts
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {name}: {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for the artifacts of one build pass
pub trait ArtifactSink {
    /// Writes the manifest and journal
    ///
    /// # Arguments
    ///
    /// * `manifest` - The freshly crawled manifest
    /// * `journal` - The compiled update journal
    fn write(&mut self, manifest: &Manifest, journal: &Journal) -> OutputResult<()>;
}
