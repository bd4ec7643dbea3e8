use crate::journal::Journal;
use crate::manifest::Manifest;
use crate::output::traits::{ArtifactSink, OutputError, OutputResult};
use std::path::{Path, PathBuf};

/// Writes pretty-printed JSON artifacts into a directory
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
    manifest_file: String,
    journal_file: String,
}

impl JsonDirSink {
    /// Creates a sink writing `<dir>/<manifest_file>` and `<dir>/<journal_file>`
    pub fn new(
        dir: impl Into<PathBuf>,
        manifest_file: impl Into<String>,
        journal_file: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            manifest_file: manifest_file.into(),
            journal_file: journal_file.into(),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(&self.manifest_file)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.dir.join(&self.journal_file)
    }
}

impl ArtifactSink for JsonDirSink {
    fn write(&mut self, manifest: &Manifest, journal: &Journal) -> OutputResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|source| OutputError::Write {
            path: self.dir.clone(),
            source,
        })?;

        let manifest_json = manifest.to_json().map_err(|source| OutputError::Encode {
            name: self.manifest_file.clone(),
            source,
        })?;
        let journal_json = journal.to_json().map_err(|source| OutputError::Encode {
            name: self.journal_file.clone(),
            source,
        })?;

        write_file(&self.manifest_path(), &manifest_json)?;
        write_file(&self.journal_path(), &journal_json)?;

        tracing::info!(
            "Wrote {} and {} to {}",
            self.manifest_file,
            self.journal_file,
            self.dir.display()
        );
        Ok(())
    }
}

fn write_file(path: &Path, content: &str) -> OutputResult<()> {
    std::fs::write(path, content).map_err(|source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    })
}
