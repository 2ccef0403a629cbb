//! Native video acquisition.
//!
//! Reddit serves video and audio as separate DASH streams. The best of each
//! is downloaded to `<stem>.video.mp4` / `<stem>.audio.mp4` and muxed into
//! `<stem>.mp4`. A video-only stream is renamed into place. Without a usable
//! manifest the pre-muxed (possibly silent) `fallback_url` is downloaded
//! instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{info, warn};
use url::Url;

use super::dash::select_streams;
use super::download::download_to_file;
use super::mux::Muxer;
use super::traits::MediaAcquirer;
use super::{sanitize_stem, unescape_url, MediaResult};
use crate::classify::MediaKind;
use crate::constants::{DASH_MANIFEST_SEGMENT, NATIVE_VIDEO_HOST};
use crate::error::{ArchiveError, FetchError};
use crate::fetcher::Fetcher;
use crate::reddit::Post;

pub struct VideoAcquirer {
    muxer: Arc<dyn Muxer>,
}

impl VideoAcquirer {
    #[must_use]
    pub fn new(muxer: Arc<dyn Muxer>) -> Self {
        Self { muxer }
    }

    async fn from_streams(
        &self,
        fetcher: &Fetcher,
        video: &Url,
        audio: Option<&Url>,
        dest_dir: &Path,
        stem: &str,
    ) -> Result<PathBuf, ArchiveError> {
        let video_path = dest_dir.join(format!("{stem}.video.mp4"));
        let audio_path = dest_dir.join(format!("{stem}.audio.mp4"));
        let output = dest_dir.join(format!("{stem}.mp4"));

        info!(url = %video, path = %video_path.display(), "Downloading best video stream");
        download_to_file(fetcher, video.as_str(), &video_path).await?;

        let Some(audio) = audio else {
            tokio::fs::rename(&video_path, &output)
                .await
                .map_err(|e| ArchiveError::io(&output, e))?;
            return Ok(output);
        };

        info!(url = %audio, path = %audio_path.display(), "Downloading best audio stream");
        let merged = match download_to_file(fetcher, audio.as_str(), &audio_path).await {
            Ok(_) => self.muxer.mux(&video_path, &audio_path, &output).await,
            Err(e) => Err(e),
        };

        remove_intermediates(&[&video_path, &audio_path]).await;
        merged.map(|()| output)
    }
}

#[async_trait]
impl MediaAcquirer for VideoAcquirer {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    async fn acquire(
        &self,
        post: &Post,
        dest_dir: &Path,
        fetcher: &Fetcher,
    ) -> Result<MediaResult, ArchiveError> {
        let stem = sanitize_stem(
            post.title.as_deref().unwrap_or_default(),
            post.id.as_deref().unwrap_or("video"),
        );
        let payload = post.find_reddit_video();
        let fallback = payload
            .and_then(|v| v.fallback_url.as_deref())
            .filter(|u| !u.is_empty())
            .map(unescape_url);

        if let Some(manifest_url) = manifest_url(post) {
            let (source_url, xml) = fetch_manifest(fetcher, &manifest_url).await?;
            let selection = select_streams(&xml, &source_url)?;
            if let Some(video) = selection.video.as_ref() {
                let audio = selection.audio.as_ref().map(|a| &a.url);
                let output = self
                    .from_streams(fetcher, &video.url, audio, dest_dir, &stem)
                    .await?;
                return Ok(deliverable(output));
            }
            warn!(url = %manifest_url, "Manifest has no video representation");
        }

        let Some(fallback) = fallback else {
            return Err(ArchiveError::MediaResolution(format!(
                "no DASH stream or fallback URL for post {}",
                post.id.as_deref().unwrap_or("?")
            )));
        };

        let output = dest_dir.join(format!("{stem}.mp4"));
        info!(url = %fallback, path = %output.display(), "Downloading fallback MP4 (may be muted)");
        download_to_file(fetcher, &fallback, &output).await?;
        Ok(deliverable(output))
    }
}

fn deliverable(path: PathBuf) -> MediaResult {
    MediaResult {
        kind: MediaKind::Video,
        files: vec![path.clone()],
        merged: Some(path),
    }
}

/// DASH manifest URL from the video payload, or synthesized from a native video URL.
#[must_use]
pub fn manifest_url(post: &Post) -> Option<String> {
    post.find_reddit_video()
        .and_then(|v| v.dash_url.as_deref())
        .filter(|u| !u.is_empty())
        .map(unescape_url)
        .or_else(|| {
            post.best_url()
                .filter(|u| u.to_lowercase().contains(NATIVE_VIDEO_HOST))
                .map(|u| format!("{}/{DASH_MANIFEST_SEGMENT}", u.trim_end_matches('/')))
        })
}

/// Fetch a manifest, retrying once over plain HTTP when HTTPS is forbidden.
///
/// Returns the URL the body came from, for resolving relative `BaseURL`s.
async fn fetch_manifest(fetcher: &Fetcher, url: &str) -> Result<(Url, String), ArchiveError> {
    fetch_manifest_with(fetcher, url, plaintext_url).await
}

/// [`fetch_manifest`] with the URL used for the single retry after a 403.
async fn fetch_manifest_with(
    fetcher: &Fetcher,
    url: &str,
    forbidden_retry_url: fn(&str) -> Option<String>,
) -> Result<(Url, String), ArchiveError> {
    let response = match fetcher.get(url).send().await {
        Err(FetchError::Status { status, .. }) if status == StatusCode::FORBIDDEN => {
            let Some(plain) = forbidden_retry_url(url) else {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status,
                }
                .into());
            };
            warn!(url = %url, retry_url = %plain, "Manifest forbidden, retrying over plain HTTP");
            fetcher.get(&plain).send().await?
        }
        other => other?,
    };

    let source_url = response.url().clone();
    let xml = response.text().await.map_err(|source| FetchError::Transport {
        url: source_url.to_string(),
        source,
    })?;
    Ok((source_url, xml))
}

fn plaintext_url(url: &str) -> Option<String> {
    url.strip_prefix("https://").map(|rest| format!("http://{rest}"))
}

async fn remove_intermediates(paths: &[&Path]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove intermediate file");
            }
        }
    }
}
