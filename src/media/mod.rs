//! Per-kind media acquisition.

pub mod dash;
pub mod download;
pub mod external;
pub mod gallery;
pub mod image;
pub mod mux;
pub mod registry;
pub mod text;
pub mod traits;
pub mod video;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::classify::MediaKind;

pub use mux::{FfmpegMuxer, Muxer};
pub use registry::AcquirerRegistry;
pub use traits::MediaAcquirer;

/// Local files produced for one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaResult {
    pub kind: MediaKind,
    pub files: Vec<PathBuf>,
    /// The single final deliverable of a video acquisition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged: Option<PathBuf>,
}

impl MediaResult {
    /// A result with no local files.
    #[must_use]
    pub fn empty(kind: MediaKind) -> Self {
        Self {
            kind,
            files: Vec::new(),
            merged: None,
        }
    }
}

/// Undo the HTML entity escaping the API applies to media URLs.
#[must_use]
pub fn unescape_url(url: &str) -> String {
    url.replace("&amp;", "&")
}

/// File extension (with dot) of a URL's path, or `default`.
#[must_use]
pub fn extension_from_url(url: &str, default: &str) -> String {
    let last_segment = url::Url::parse(url)
        .ok()
        .and_then(|u| u.path_segments().and_then(|mut s| s.next_back().map(str::to_string)))
        .unwrap_or_default();

    match last_segment.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < last_segment.len() => last_segment[dot..].to_lowercase(),
        _ => default.to_string(),
    }
}

/// Turn a post title into a filesystem-safe file stem.
///
/// Characters outside `[alnum - _ . ( ) [ ]]` collapse into single
/// underscores. Falls back to `fallback` when nothing usable remains.
#[must_use]
pub fn sanitize_stem(title: &str, fallback: &str) -> String {
    const MAX_STEM_CHARS: usize = 200;

    let mapped: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '(' | ')' | '[' | ']' | '-' | '_' | '.' => c,
            c if c.is_alphanumeric() => c,
            _ => '_',
        })
        .collect();

    let stem: String = mapped
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .trim_matches('.')
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();

    if stem.is_empty() {
        fallback.to_string()
    } else {
        stem
    }
}
