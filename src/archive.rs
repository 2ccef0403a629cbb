//! Assembly of the archive record for one post.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::classify::{classify, MediaKind};
use crate::config::Config;
use crate::constants::REDDIT_ORIGIN;
use crate::error::ArchiveError;
use crate::fetcher::Fetcher;
use crate::media::{sanitize_stem, AcquirerRegistry, FfmpegMuxer, MediaResult};
use crate::reddit::{self, normalize, CommentNode, Post, Thread};
use crate::store::{ArchiveStore, Bucket};

/// The self-contained record written for one post.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveRecord {
    pub archived_at: DateTime<Utc>,
    pub reddit_fullname: Option<String>,
    pub reddit_id: Option<String>,
    pub permalink: String,
    pub title: String,
    pub selftext: String,
    pub author: Option<String>,
    pub author_fullname: Option<String>,
    pub subreddit: Option<String>,
    pub subreddit_id: Option<String>,
    pub created_utc: Option<f64>,
    pub is_self: bool,
    pub url: Option<String>,
    pub domain: Option<String>,
    pub post_hint: Option<String>,
    pub is_gallery: bool,
    pub over_18: bool,
    pub spoiler: bool,
    pub link_flair_text: Option<String>,
    pub is_original_content: bool,
    pub stickied: bool,
    pub locked: bool,
    pub edited: Value,
    pub num_comments: Option<i64>,
    pub score: Option<i64>,
    pub upvote_ratio: Option<f64>,
    pub media_kind: MediaKind,
    pub media: Option<MediaResult>,
    /// Destination of a link post.
    pub external_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<CommentNode>>,
    pub raw_post: Value,
    pub raw_comments: Option<Value>,
}

impl ArchiveRecord {
    fn from_post(post: &Post, raw_post: Value, media_kind: MediaKind) -> Self {
        Self {
            archived_at: Utc::now(),
            reddit_fullname: post.name.clone(),
            reddit_id: post.id.clone(),
            permalink: format!("{REDDIT_ORIGIN}{}", post.permalink.as_deref().unwrap_or_default()),
            title: post.title.clone().unwrap_or_default(),
            selftext: post.selftext.clone().unwrap_or_default(),
            author: post.author.clone(),
            author_fullname: post.author_fullname.clone(),
            subreddit: post.subreddit.clone(),
            subreddit_id: post.subreddit_id.clone(),
            created_utc: post.created_utc,
            is_self: post.is_self,
            url: post.best_url().map(str::to_string),
            domain: post.domain.clone(),
            post_hint: post.post_hint.clone(),
            is_gallery: post.is_gallery,
            over_18: post.over_18,
            spoiler: post.spoiler,
            link_flair_text: post.link_flair_text.clone(),
            is_original_content: post.is_original_content,
            stickied: post.stickied,
            locked: post.locked,
            edited: post.edited.clone(),
            num_comments: post.num_comments,
            score: post.score,
            upvote_ratio: post.upvote_ratio,
            media_kind,
            media: None,
            external_link: None,
            comments: None,
            raw_post,
            raw_comments: None,
        }
    }
}

/// Archive policy for one run.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub download_media: bool,
    pub media_root: PathBuf,
    pub include_comments: bool,
    pub comments_depth: usize,
    pub comments_limit: usize,
}

impl From<&Config> for ArchiveOptions {
    fn from(config: &Config) -> Self {
        Self {
            download_media: config.download_media,
            media_root: config.media_dir.clone(),
            include_comments: config.include_comments,
            comments_depth: config.comments_depth,
            comments_limit: config.comments_limit,
        }
    }
}

/// What happened to one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Saved { bucket: Bucket, path: PathBuf },
    /// A record already existed and skipping was requested.
    Skipped { bucket: Bucket, path: PathBuf },
}

/// Fetches, classifies and acquires posts into archive records.
pub struct Archiver {
    fetcher: Fetcher,
    acquirers: AcquirerRegistry,
    options: ArchiveOptions,
}

impl Archiver {
    /// Build an archiver with the default acquirers and an `ffmpeg` muxer.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self, ArchiveError> {
        let fetcher = Fetcher::new(config)?;
        let muxer = std::sync::Arc::new(FfmpegMuxer::new(config.ffmpeg_path.clone()));
        Ok(Self::with_parts(
            fetcher,
            AcquirerRegistry::with_defaults(muxer),
            ArchiveOptions::from(config),
        ))
    }

    #[must_use]
    pub fn with_parts(fetcher: Fetcher, acquirers: AcquirerRegistry, options: ArchiveOptions) -> Self {
        Self {
            fetcher,
            acquirers,
            options,
        }
    }

    /// Fetch and assemble the record for a post URL.
    ///
    /// # Errors
    ///
    /// Fails if fetching, parsing or media acquisition fails; no partial
    /// record is returned.
    pub async fn archive_url(&self, url: &str) -> Result<ArchiveRecord, ArchiveError> {
        let url = if reddit::url::is_short_link(url) {
            let resolved = reddit::url::resolve_short_link(&self.fetcher, url).await?;
            debug!(short = %url, resolved = %resolved, "Resolved short link");
            resolved
        } else {
            url.to_string()
        };

        let thread = reddit::fetch_thread(
            &self.fetcher,
            &url,
            self.options.comments_depth,
            self.options.comments_limit,
        )
        .await?;
        self.assemble(thread).await
    }

    /// Compose post fields, comments and acquired media into a record.
    ///
    /// # Errors
    ///
    /// Fails if the media directory cannot be created or acquisition fails.
    pub async fn assemble(&self, thread: Thread) -> Result<ArchiveRecord, ArchiveError> {
        let Thread {
            post,
            raw_post,
            comments_listing,
        } = thread;
        let kind = classify(&post);
        let mut record = ArchiveRecord::from_post(&post, raw_post, kind);
        info!(id = ?post.id, kind = %kind, "Classified post");

        if self.options.include_comments {
            let comments = normalize(
                &comments_listing,
                self.options.comments_depth,
                self.options.comments_limit,
            );
            debug!(count = comments.len(), "Normalized top-level comments");
            record.comments = Some(comments);
            record.raw_comments = Some(comments_listing);
        }

        if kind == MediaKind::External {
            record.external_link = post.best_url().map(str::to_string);
        }

        if self.options.download_media {
            record.media = Some(self.acquire(&post, kind).await?);
        }

        Ok(record)
    }

    async fn acquire(&self, post: &Post, kind: MediaKind) -> Result<MediaResult, ArchiveError> {
        let acquirer = self.acquirers.find(kind).ok_or_else(|| {
            ArchiveError::MediaResolution(format!("no acquirer registered for {kind}"))
        })?;

        let dest_dir = self
            .options
            .media_root
            .join(sanitize_stem(post.id.as_deref().unwrap_or_default(), "post"));
        if matches!(kind, MediaKind::Image | MediaKind::Gallery | MediaKind::Video) {
            tokio::fs::create_dir_all(&dest_dir)
                .await
                .map_err(|e| ArchiveError::io(&dest_dir, e))?;
        }

        acquirer.acquire(post, &dest_dir, &self.fetcher).await
    }

    /// Archive one URL into `store`, honoring skip-existing.
    ///
    /// # Errors
    ///
    /// Returns the first error of fetching, assembly or writing.
    pub async fn process(
        &self,
        url: &str,
        store: &ArchiveStore,
        skip_existing: bool,
    ) -> Result<ProcessOutcome, ArchiveError> {
        if skip_existing {
            if let Some(id) = reddit::url::post_id_from_url(url) {
                if let Some((bucket, path)) = store.existing(&id).await {
                    info!(url = %url, path = %path.display(), "Already archived, skipping");
                    return Ok(ProcessOutcome::Skipped { bucket, path });
                }
            }
        }

        let record = self.archive_url(url).await?;
        let (bucket, path) = store.write(&record).await?;
        info!(url = %url, bucket = %bucket, path = %path.display(), "Saved archive record");
        Ok(ProcessOutcome::Saved { bucket, path })
    }
}
