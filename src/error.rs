//! Error types for the fetch, classify and acquire pipeline.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single resilient fetch, after the retry budget is spent.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection-level failure (refused, reset, DNS, TLS).
    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// No response headers or body chunk arrived within the timeout.
    #[error("request to {url} timed out after {timeout:?}")]
    TimedOut { url: String, timeout: Duration },
    /// Non-success HTTP status.
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: StatusCode },
}

impl FetchError {
    /// Whether another attempt could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { source, .. } => !source.is_builder(),
            Self::TimedOut { .. } => true,
            Self::Status { status, .. } => is_retryable_status(*status),
        }
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status(),
            Self::TimedOut { .. } => None,
        }
    }
}

/// 429 and 5xx are transient; every other 4xx is a client error.
#[must_use]
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Errors surfaced while archiving a single post.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The post/comments payload did not have the expected shape.
    #[error("unexpected Reddit JSON: {0}")]
    Schema(String),

    #[error("not a Reddit post URL: {0}")]
    InvalidUrl(String),

    /// No downloadable media source could be determined for the post.
    #[error("no media source: {0}")]
    MediaResolution(String),

    #[error("invalid DASH manifest: {0}")]
    Manifest(String),

    /// The muxer executable is not installed.
    #[error("{tool} not found; it is required to merge audio and video")]
    MuxingUnavailable { tool: String },

    #[error("{tool} exited with {status}: {stderr}")]
    MuxingFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize archive record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status behind the failure, for reporting.
    #[must_use]
    pub fn http_status(&self) -> Option<StatusCode> {
        match self {
            Self::Fetch(e) => e.status(),
            _ => None,
        }
    }
}
