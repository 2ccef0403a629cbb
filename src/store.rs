//! JSON record storage, one file per post under its output bucket.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::archive::ArchiveRecord;
use crate::classify::MediaKind;
use crate::error::ArchiveError;
use crate::media::sanitize_stem;

/// Coarse output category of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Media,
    External,
    Text,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Media, Bucket::External, Bucket::Text];

    #[must_use]
    pub fn for_kind(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image | MediaKind::Gallery | MediaKind::Video => Self::Media,
            MediaKind::External => Self::External,
            MediaKind::SelfPost => Self::Text,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Media => "media",
            Self::External => "external",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Writes records to `<root>/<bucket>/<id>.json`.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Record path for a post id. The id comes from remote JSON, so it is
    /// sanitized into a single path component under the bucket directory.
    #[must_use]
    pub fn path_for(&self, bucket: Bucket, id: &str) -> PathBuf {
        let stem = sanitize_stem(id, "post");
        self.root.join(bucket.as_str()).join(format!("{stem}.json"))
    }

    /// Find an already written record for `id` in any bucket.
    pub async fn existing(&self, id: &str) -> Option<(Bucket, PathBuf)> {
        for bucket in Bucket::ALL {
            let path = self.path_for(bucket, id);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Some((bucket, path));
            }
        }
        None
    }

    /// Write `record` as pretty JSON into its bucket, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or written.
    pub async fn write(&self, record: &ArchiveRecord) -> Result<(Bucket, PathBuf), ArchiveError> {
        let bucket = Bucket::for_kind(record.media_kind);
        let id = record.reddit_id.as_deref().unwrap_or("post");
        let path = self.path_for(bucket, id);

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ArchiveError::io(dir, e))?;
        }
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| ArchiveError::io(&path, e))?;

        debug!(path = %path.display(), bucket = %bucket, "Record written");
        Ok((bucket, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_routing() {
        assert_eq!(Bucket::for_kind(MediaKind::Image), Bucket::Media);
        assert_eq!(Bucket::for_kind(MediaKind::Gallery), Bucket::Media);
        assert_eq!(Bucket::for_kind(MediaKind::Video), Bucket::Media);
        assert_eq!(Bucket::for_kind(MediaKind::External), Bucket::External);
        assert_eq!(Bucket::for_kind(MediaKind::SelfPost), Bucket::Text);
    }

    #[tokio::test]
    async fn test_existing_searches_every_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        assert!(store.existing("abc").await.is_none());

        let path = store.path_for(Bucket::External, "abc");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"{}").await.unwrap();

        assert_eq!(store.existing("abc").await, Some((Bucket::External, path)));
    }

    #[test]
    fn test_path_for_keeps_hostile_ids_inside_bucket() {
        let store = ArchiveStore::new("/data");
        let bucket_dir = PathBuf::from("/data/text");

        for id in ["../../escaped", "/etc/passwd", "..", "a/../../b", ""] {
            let path = store.path_for(Bucket::Text, id);
            assert_eq!(path.parent(), Some(bucket_dir.as_path()), "id {id:?}");
        }
        assert_eq!(
            store.path_for(Bucket::Text, "../../escaped"),
            PathBuf::from("/data/text/_.._escaped.json")
        );
        assert_eq!(store.path_for(Bucket::Text, ".."), PathBuf::from("/data/text/post.json"));
        assert_eq!(store.path_for(Bucket::Media, "abc123"), PathBuf::from("/data/media/abc123.json"));
    }
}
