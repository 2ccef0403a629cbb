//! Typed projection of the loosely-typed post payload.
//!
//! Every field is optional in practice: the API omits keys, sends `null`, or
//! changes a field's type (`edited` is `false` or a timestamp). Fields are
//! therefore decoded leniently, with anything unexpected collapsing to the
//! field's default instead of failing the whole post.

use std::collections::HashMap;

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Decode a field, falling back to `T::default()` on null or type mismatch.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Decode a sequence keeping only the elements that decode.
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| T::deserialize(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// A Reddit submission, as far as the archiver reads it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Post {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    /// Fullname, e.g. `t3_abc123`.
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub permalink: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub selftext: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub author_fullname: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub subreddit: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub subreddit_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub created_utc: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub url_overridden_by_dest: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub domain: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub post_hint: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_gallery: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub is_self: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub secure_media: Option<MediaEmbed>,
    #[serde(default, deserialize_with = "lenient")]
    pub media: Option<MediaEmbed>,
    /// Parents that decode as posts; malformed entries are dropped.
    #[serde(default, deserialize_with = "lenient_seq")]
    pub crosspost_parent_list: Vec<Post>,
    /// Whether the raw parent list had any entries at all, decodable or not.
    #[serde(skip)]
    pub has_crosspost_parents: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub media_metadata: HashMap<String, MediaMetadata>,
    #[serde(default, deserialize_with = "lenient")]
    pub gallery_data: Option<GalleryData>,
    #[serde(default, deserialize_with = "lenient")]
    pub over_18: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub spoiler: bool,
    /// `false`, or the edit timestamp.
    #[serde(default)]
    pub edited: Value,
    #[serde(default, deserialize_with = "lenient")]
    pub score: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub upvote_ratio: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub num_comments: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub link_flair_text: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub is_original_content: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub stickied: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub locked: bool,
}

impl Post {
    /// Project a raw post object. Returns `None` when `raw` is not an object.
    #[must_use]
    pub fn from_value(raw: &Value) -> Option<Self> {
        if !raw.is_object() {
            return None;
        }
        let mut post = Self::deserialize(raw).ok()?;
        post.has_crosspost_parents = raw
            .get("crosspost_parent_list")
            .and_then(Value::as_array)
            .is_some_and(|parents| !parents.is_empty());
        Some(post)
    }

    /// Destination URL, preferring the override over the raw URL field.
    #[must_use]
    pub fn best_url(&self) -> Option<&str> {
        self.url_overridden_by_dest
            .as_deref()
            .or(self.url.as_deref())
            .filter(|u| !u.is_empty())
    }

    /// The `reddit_video` payload on this post itself.
    #[must_use]
    pub fn own_reddit_video(&self) -> Option<&RedditVideo> {
        self.secure_media
            .as_ref()
            .and_then(|m| m.reddit_video.as_ref())
            .or_else(|| self.media.as_ref().and_then(|m| m.reddit_video.as_ref()))
    }

    /// The `reddit_video` payload, looking through crosspost parents too.
    #[must_use]
    pub fn find_reddit_video(&self) -> Option<&RedditVideo> {
        self.own_reddit_video().or_else(|| {
            self.crosspost_parent_list
                .iter()
                .find_map(Post::own_reddit_video)
        })
    }
}

/// The `media` / `secure_media` sub-object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaEmbed {
    #[serde(default, deserialize_with = "lenient")]
    pub reddit_video: Option<RedditVideo>,
}

/// A natively hosted video.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedditVideo {
    #[serde(default, deserialize_with = "lenient")]
    pub dash_url: Option<String>,
    /// Pre-muxed MP4, possibly without audio.
    #[serde(default, deserialize_with = "lenient")]
    pub fallback_url: Option<String>,
}

/// One `media_metadata` entry of a gallery.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaMetadata {
    /// Declared media type, e.g. `image/png`.
    #[serde(default, rename = "m", deserialize_with = "lenient")]
    pub mime_type: Option<String>,
    /// Source (original) variant.
    #[serde(default, rename = "s", deserialize_with = "lenient")]
    pub source: Option<MediaVariant>,
    /// Preview ladder, ascending resolution.
    #[serde(default, rename = "p", deserialize_with = "lenient_seq")]
    pub previews: Vec<MediaVariant>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaVariant {
    #[serde(default, rename = "u", deserialize_with = "lenient")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub gif: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub mp4: Option<String>,
    #[serde(default, rename = "x", deserialize_with = "lenient")]
    pub width: Option<u64>,
    #[serde(default, rename = "y", deserialize_with = "lenient")]
    pub height: Option<u64>,
}

impl MediaVariant {
    /// First usable URL on this variant.
    #[must_use]
    pub fn any_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or(self.gif.as_deref())
            .or(self.mp4.as_deref())
            .filter(|u| !u.is_empty())
    }

    fn pixels(&self) -> u64 {
        self.width.unwrap_or(0).saturating_mul(self.height.unwrap_or(0))
    }
}

impl MediaMetadata {
    /// Highest-resolution preview with a URL, else the source variant.
    #[must_use]
    pub fn best_variant_url(&self) -> Option<&str> {
        self.previews
            .iter()
            .filter(|v| v.any_url().is_some())
            .max_by_key(|v| v.pixels())
            .and_then(MediaVariant::any_url)
            .or_else(|| self.source.as_ref().and_then(MediaVariant::any_url))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GalleryData {
    #[serde(default, deserialize_with = "lenient_seq")]
    pub items: Vec<GalleryItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GalleryItem {
    #[serde(default, deserialize_with = "lenient")]
    pub media_id: Option<String>,
}
