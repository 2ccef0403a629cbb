use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use super::download::download_to_file;
use super::traits::MediaAcquirer;
use super::{unescape_url, MediaResult};
use crate::classify::MediaKind;
use crate::error::ArchiveError;
use crate::fetcher::Fetcher;
use crate::reddit::Post;

/// Downloads every gallery item to `01.<ext>`, `02.<ext>`, ... in declared order.
///
/// Items whose metadata entry is missing or has no usable variant are logged
/// and skipped; their number is not reused.
pub struct GalleryAcquirer;

/// Extension for a gallery item's declared media type.
#[must_use]
pub fn extension_for_mime(mime: Option<&str>) -> &'static str {
    match mime.map(str::to_lowercase) {
        Some(m) if m.contains("png") => ".png",
        Some(m) if m.contains("gif") => ".gif",
        _ => ".jpg",
    }
}

/// Zero-padding width for `count` numbered files, never less than two.
#[must_use]
pub fn pad_width(count: usize) -> usize {
    count.to_string().len().max(2)
}

#[async_trait]
impl MediaAcquirer for GalleryAcquirer {
    fn kind(&self) -> MediaKind {
        MediaKind::Gallery
    }

    async fn acquire(
        &self,
        post: &Post,
        dest_dir: &Path,
        fetcher: &Fetcher,
    ) -> Result<MediaResult, ArchiveError> {
        let items = post
            .gallery_data
            .as_ref()
            .map(|g| g.items.as_slice())
            .unwrap_or_default();
        if items.is_empty() || post.media_metadata.is_empty() {
            return Err(ArchiveError::MediaResolution(
                "gallery has no items or metadata".to_string(),
            ));
        }

        let width = pad_width(items.len());
        let mut files = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let position = index + 1;
            let meta = item
                .media_id
                .as_deref()
                .and_then(|id| post.media_metadata.get(id));
            let Some((meta, url)) = meta.and_then(|m| m.best_variant_url().map(|u| (m, u))) else {
                warn!(
                    position,
                    media_id = item.media_id.as_deref().unwrap_or_default(),
                    "Gallery item has no downloadable variant, skipping"
                );
                continue;
            };

            let url = unescape_url(url);
            let ext = extension_for_mime(meta.mime_type.as_deref());
            let path = dest_dir.join(format!("{position:0width$}{ext}"));
            info!(position, url = %url, path = %path.display(), "Downloading gallery item");
            download_to_file(fetcher, &url, &path).await?;
            files.push(path);
        }

        if files.is_empty() {
            return Err(ArchiveError::MediaResolution(
                "no gallery item had a downloadable variant".to_string(),
            ));
        }

        Ok(MediaResult {
            kind: MediaKind::Gallery,
            files,
            merged: None,
        })
    }
}
