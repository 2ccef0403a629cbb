use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::download::download_to_file;
use super::traits::MediaAcquirer;
use super::{extension_from_url, unescape_url, MediaResult};
use crate::classify::MediaKind;
use crate::error::ArchiveError;
use crate::fetcher::Fetcher;
use crate::reddit::Post;

/// Downloads a single-image post to `image<ext>`.
pub struct ImageAcquirer;

#[async_trait]
impl MediaAcquirer for ImageAcquirer {
    fn kind(&self) -> MediaKind {
        MediaKind::Image
    }

    async fn acquire(
        &self,
        post: &Post,
        dest_dir: &Path,
        fetcher: &Fetcher,
    ) -> Result<MediaResult, ArchiveError> {
        let url = post
            .best_url()
            .map(unescape_url)
            .ok_or_else(|| ArchiveError::MediaResolution("image post has no URL".to_string()))?;

        let path = dest_dir.join(format!("image{}", extension_from_url(&url, ".jpg")));
        info!(url = %url, path = %path.display(), "Downloading image");
        download_to_file(fetcher, &url, &path).await?;

        Ok(MediaResult {
            kind: MediaKind::Image,
            files: vec![path],
            merged: None,
        })
    }
}
