use crate::crawler::CrawlError;
use crate::url::url_for_local_path;
use std::path::{Path, PathBuf};
use url::Url;

/// Lists the URL of every file below the site root
///
/// # Arguments
///
/// * `root` - Site root directory
/// * `base` - URL the root is served under
/// * `skip` - Root-relative paths left out (the published artifacts)
///
/// # Returns
///
/// * `Ok(Vec<Url>)` - Sorted URLs
/// * `Err(CrawlError::Io)` - A directory could not be read
pub async fn collect_local_roots(
    root: &Path,
    base: &Url,
    skip: &[PathBuf],
) -> Result<Vec<Url>, CrawlError> {
    let mut urls = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(io_error(&dir))?;

        while let Some(entry) = entries.next_entry().await.map_err(io_error(&dir))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(io_error(&path))?;

            if file_type.is_dir() {
                pending.push(path);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            if skip.iter().any(|s| relative == s.as_path()) {
                continue;
            }

            match url_for_local_path(relative, base) {
                Some(url) => urls.push(url),
                None => tracing::debug!("No URL for local file {}", path.display()),
            }
        }
    }

    urls.sort();
    urls.dedup();
    Ok(urls)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CrawlError {
    let path = PathBuf::from(path);
    move |source| CrawlError::Io { path, source }
}
