//! Shared constants used across the application.

/// User agent string used for Reddit and media requests.
///
/// Reddit throttles generic library user agents aggressively, so requests
/// identify as a browser with an archiver suffix.
pub const ARCHIVAL_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Reddit-Archiver/JSON";

/// Canonical site origin used to absolutize relative permalinks.
pub const REDDIT_ORIGIN: &str = "https://www.reddit.com";

/// Host marker for natively hosted Reddit video.
pub const NATIVE_VIDEO_HOST: &str = "v.redd.it";

/// Domains that serve images directly.
pub const DIRECT_IMAGE_DOMAINS: &[&str] = &["i.redd.it", "i.reddituploads.com"];

/// Path segment appended to a native video URL to reach its DASH manifest.
pub const DASH_MANIFEST_SEGMENT: &str = "DASHPlaylist.mpd";

/// Fallback delay when a `Retry-After` header cannot be parsed.
pub const DEFAULT_RETRY_AFTER_SECS: f64 = 10.0;
