use crate::fetch::{FailureCause, FetchTarget, Fetcher};
use crate::storage::traits::{ArtifactSource, StorageError, StorageResult};
use url::Url;

/// Artifacts published under a base URL
#[derive(Debug, Clone)]
pub struct RemoteBase {
    base: Url,
    fetcher: Fetcher,
}

impl RemoteBase {
    /// Creates a source reading `<base>/<name>`
    ///
    /// A missing trailing slash is added to the base path.
    pub fn new(mut base: Url, fetcher: Fetcher) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { base, fetcher }
    }
}

#[async_trait::async_trait]
impl ArtifactSource for RemoteBase {
    async fn read(&self, name: &str) -> StorageResult<Option<String>> {
        let url = self
            .base
            .join(name)
            .map_err(|e| StorageError::InvalidLocation(format!("{}{}: {}", self.base, name, e)))?;

        let response = self.fetcher.fetch(&FetchTarget::new(url.clone())).await;
        if response.is_success() {
            return Ok(Some(String::from_utf8_lossy(&response.body).into_owned()));
        }

        match response.cause() {
            Some(cause) if cause.is_not_found() => Ok(None),
            cause => Err(StorageError::Fetch {
                url: url.to_string(),
                cause: cause.unwrap_or(FailureCause::Status(response.status)),
            }),
        }
    }

    fn describe(&self) -> String {
        self.base.to_string()
    }
}
