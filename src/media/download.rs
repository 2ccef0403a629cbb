use std::path::Path;

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{ArchiveError, FetchError};
use crate::fetcher::Fetcher;

/// Stream `url` into `path`, returning the number of bytes written.
///
/// Each body chunk must arrive within the fetcher's download timeout. A
/// failed transfer removes whatever was written.
///
/// # Errors
///
/// Returns an error if the request fails after retries, a chunk times out,
/// or the file cannot be written.
pub async fn download_to_file(
    fetcher: &Fetcher,
    url: &str,
    path: &Path,
) -> Result<u64, ArchiveError> {
    let response = fetcher.get(url).streaming().send().await?;
    let total = response.content_length();
    debug!(url = %url, path = %path.display(), total, "Downloading");

    let result = write_body(fetcher, url, response, path).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove partial download");
            }
        }
    }
    result
}

async fn write_body(
    fetcher: &Fetcher,
    url: &str,
    mut response: reqwest::Response,
    path: &Path,
) -> Result<u64, ArchiveError> {
    let timeout = fetcher.download_timeout();
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ArchiveError::io(path, e))?;
    let mut written = 0u64;

    loop {
        let chunk = tokio::time::timeout(timeout, response.chunk())
            .await
            .map_err(|_| FetchError::TimedOut {
                url: url.to_string(),
                timeout,
            })?
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        let Some(chunk) = chunk else {
            break;
        };
        file.write_all(&chunk)
            .await
            .map_err(|e| ArchiveError::io(path, e))?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(|e| ArchiveError::io(path, e))?;
    debug!(path = %path.display(), bytes = written, "Download complete");
    Ok(written)
}
