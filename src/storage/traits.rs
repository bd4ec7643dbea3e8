//! Artifact source trait and error types

use crate::fetch::FailureCause;
use thiserror::Error;

/// Errors that can occur while loading previous artifacts
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Previous artifact not found: {0}")]
    Missing(String),

    #[error("Malformed artifact {name}: {source}")]
    Malformed {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to fetch {url}: {cause}")]
    Fetch { url: String, cause: FailureCause },

    #[error("Invalid artifact location: {0}")]
    InvalidLocation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Somewhere previously published artifacts can be read from
#[async_trait::async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Reads an artifact by file name
    ///
    /// # Returns
    ///
    /// * `Ok(Some(text))` - The artifact content
    /// * `Ok(None)` - The artifact does not exist
    /// * `Err(StorageError)` - Any other failure
    async fn read(&self, name: &str) -> StorageResult<Option<String>>;

    /// Human readable location, used in log messages
    fn describe(&self) -> String;
}
