//! Storage module for previously published artifacts
//!
//! The previous manifest and journal are read back from either a local
//! directory or the base URL they were published under. A missing artifact
//! means "no prior data" in lenient mode and is an error otherwise.

mod local;
mod remote;
mod traits;

pub use local::LocalDir;
pub use remote::RemoteBase;
pub use traits::{ArtifactSource, StorageError, StorageResult};

use crate::config::SiteConfig;
use crate::fetch::Fetcher;
use crate::journal::Journal;
use crate::manifest::Manifest;
use url::Url;

/// Artifacts of the previous build pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviousArtifacts {
    /// None when nothing was published before
    pub manifest: Option<Manifest>,

    /// Empty when nothing was published before
    pub journal: Journal,
}

/// Picks the artifact source configured for a site
///
/// `site.previous` is either an `http(s)` base URL or a directory; without it
/// the output directory is used.
pub fn source_for(site: &SiteConfig, fetcher: &Fetcher) -> StorageResult<Box<dyn ArtifactSource>> {
    let Some(previous) = site.previous.as_deref() else {
        return Ok(Box::new(LocalDir::new(&site.output_dir)));
    };

    if previous.starts_with("http://") || previous.starts_with("https://") {
        let base = Url::parse(previous)
            .map_err(|e| StorageError::InvalidLocation(format!("{}: {}", previous, e)))?;
        return Ok(Box::new(RemoteBase::new(base, fetcher.clone())));
    }

    Ok(Box::new(LocalDir::new(previous)))
}

/// Loads the previous manifest and journal
///
/// # Arguments
///
/// * `source` - Where the artifacts were published
/// * `manifest_file` - Manifest file name
/// * `journal_file` - Journal file name
/// * `lenient` - Treat missing artifacts as "no prior data"
///
/// # Returns
///
/// * `Ok(PreviousArtifacts)` - Loaded (or empty) artifacts
/// * `Err(StorageError::Missing)` - An artifact is missing and `lenient` is false
/// * `Err(StorageError)` - Reading or parsing failed
pub async fn load_previous(
    source: &dyn ArtifactSource,
    manifest_file: &str,
    journal_file: &str,
    lenient: bool,
) -> StorageResult<PreviousArtifacts> {
    let manifest = match read_artifact(source, manifest_file, lenient).await? {
        Some(text) => Some(Manifest::from_json(&text).map_err(|e| StorageError::Malformed {
            name: manifest_file.to_string(),
            source: e,
        })?),
        None => None,
    };

    let journal = match read_artifact(source, journal_file, lenient).await? {
        Some(text) => Journal::from_json(&text).map_err(|e| StorageError::Malformed {
            name: journal_file.to_string(),
            source: e,
        })?,
        None => Journal::default(),
    };

    tracing::info!(
        "Previous artifacts from {}: {} manifest entries, journal epoch {}",
        source.describe(),
        manifest.as_ref().map_or(0, Manifest::len),
        journal.epoch
    );

    Ok(PreviousArtifacts { manifest, journal })
}

async fn read_artifact(
    source: &dyn ArtifactSource,
    name: &str,
    lenient: bool,
) -> StorageResult<Option<String>> {
    match source.read(name).await? {
        Some(text) => Ok(Some(text)),
        None if lenient => {
            tracing::info!("No previous {} at {}, starting fresh", name, source.describe());
            Ok(None)
        }
        None => Err(StorageError::Missing(format!("{} at {}", name, source.describe()))),
    }
}
