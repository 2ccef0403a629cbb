use std::path::Path;

use async_trait::async_trait;

use super::MediaResult;
use crate::classify::MediaKind;
use crate::error::ArchiveError;
use crate::fetcher::Fetcher;
use crate::reddit::Post;

/// Strategy that materializes one kind of post media on disk.
#[async_trait]
pub trait MediaAcquirer: Send + Sync {
    /// The kind this acquirer handles.
    fn kind(&self) -> MediaKind;

    /// Download the post's media into `dest_dir`, which already exists.
    async fn acquire(
        &self,
        post: &Post,
        dest_dir: &Path,
        fetcher: &Fetcher,
    ) -> Result<MediaResult, ArchiveError>;
}
