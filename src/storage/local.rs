use crate::storage::traits::{ArtifactSource, StorageResult};
use std::io::ErrorKind;
use std::path::PathBuf;

/// Artifacts stored in a local directory
#[derive(Debug, Clone)]
pub struct LocalDir {
    dir: PathBuf,
}

impl LocalDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl ArtifactSource for LocalDir {
    async fn read(&self, name: &str) -> StorageResult<Option<String>> {
        match tokio::fs::read_to_string(self.dir.join(name)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}
