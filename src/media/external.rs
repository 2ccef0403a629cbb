use std::path::Path;

use async_trait::async_trait;

use super::traits::MediaAcquirer;
use super::MediaResult;
use crate::classify::MediaKind;
use crate::error::ArchiveError;
use crate::fetcher::Fetcher;
use crate::reddit::Post;

/// Link posts: nothing is downloaded, the destination is recorded on the
/// archive record as `external_link`.
pub struct ExternalAcquirer;

#[async_trait]
impl MediaAcquirer for ExternalAcquirer {
    fn kind(&self) -> MediaKind {
        MediaKind::External
    }

    async fn acquire(
        &self,
        _post: &Post,
        _dest_dir: &Path,
        _fetcher: &Fetcher,
    ) -> Result<MediaResult, ArchiveError> {
        Ok(MediaResult::empty(MediaKind::External))
    }
}
