use std::path::Path;

use async_trait::async_trait;

use super::traits::MediaAcquirer;
use super::MediaResult;
use crate::classify::MediaKind;
use crate::error::ArchiveError;
use crate::fetcher::Fetcher;
use crate::reddit::Post;

/// Self (text) posts carry no media.
pub struct SelfAcquirer;

#[async_trait]
impl MediaAcquirer for SelfAcquirer {
    fn kind(&self) -> MediaKind {
        MediaKind::SelfPost
    }

    async fn acquire(
        &self,
        _post: &Post,
        _dest_dir: &Path,
        _fetcher: &Fetcher,
    ) -> Result<MediaResult, ArchiveError> {
        Ok(MediaResult::empty(MediaKind::SelfPost))
    }
}
