//! Media-kind classification of a post.

use serde::{Deserialize, Serialize};

use crate::constants::{DIRECT_IMAGE_DOMAINS, NATIVE_VIDEO_HOST};
use crate::reddit::Post;

/// What kind of media a post carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Gallery,
    Video,
    Image,
    #[serde(rename = "self")]
    SelfPost,
    External,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gallery => "gallery",
            Self::Video => "video",
            Self::Image => "image",
            Self::SelfPost => "self",
            Self::External => "external",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a post. Rules are checked in order; the first match wins.
#[must_use]
pub fn classify(post: &Post) -> MediaKind {
    let rules: [(fn(&Post) -> bool, MediaKind); 4] = [
        (is_gallery, MediaKind::Gallery),
        (is_video, MediaKind::Video),
        (is_image, MediaKind::Image),
        (is_self, MediaKind::SelfPost),
    ];

    rules
        .iter()
        .find(|(matches, _)| matches(post))
        .map_or(MediaKind::External, |(_, kind)| *kind)
}

fn is_gallery(post: &Post) -> bool {
    post.is_gallery
}

fn is_video(post: &Post) -> bool {
    let native_host = post
        .best_url()
        .is_some_and(|url| url.to_lowercase().contains(NATIVE_VIDEO_HOST));

    // Crossposted native videos do not always repeat the payload at the top level.
    native_host || post.own_reddit_video().is_some() || post.has_crosspost_parents
}

fn is_image(post: &Post) -> bool {
    post.post_hint
        .as_deref()
        .is_some_and(|hint| hint.eq_ignore_ascii_case("image"))
        || post
            .domain
            .as_deref()
            .is_some_and(|domain| DIRECT_IMAGE_DOMAINS.contains(&domain.to_lowercase().as_str()))
}

fn is_self(post: &Post) -> bool {
    post.is_self
}
