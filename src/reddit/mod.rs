//! Reddit JSON endpoint access: URL handling, the post projection and the
//! comment normalizer.

pub mod comments;
pub mod post;
pub mod url;

use serde_json::Value;
use tracing::debug;

use crate::error::ArchiveError;
use crate::fetcher::Fetcher;

pub use comments::{normalize, CommentNode};
pub use post::Post;

/// A fetched post together with its comment listing.
#[derive(Debug, Clone)]
pub struct Thread {
    pub post: Post,
    /// The post object exactly as received.
    pub raw_post: Value,
    /// Second element of the response: the top-level comment `Listing`.
    pub comments_listing: Value,
}

impl Thread {
    /// Split a `.json` response into post and comments.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Schema`] unless the payload is a sequence of at
    /// least two listings whose first wraps a post object.
    pub fn from_response(payload: Value) -> Result<Self, ArchiveError> {
        let Value::Array(mut parts) = payload else {
            return Err(ArchiveError::Schema(
                "response is not a sequence".to_string(),
            ));
        };
        if parts.len() < 2 {
            return Err(ArchiveError::Schema(format!(
                "expected post and comment listings, got {} element(s)",
                parts.len()
            )));
        }

        let comments_listing = parts.swap_remove(1);
        let raw_post = parts
            .swap_remove(0)
            .pointer_mut("/data/children/0/data")
            .map(Value::take)
            .ok_or_else(|| ArchiveError::Schema("post listing is empty".to_string()))?;
        let post = Post::from_value(&raw_post)
            .ok_or_else(|| ArchiveError::Schema("post is not an object".to_string()))?;

        Ok(Self {
            post,
            raw_post,
            comments_listing,
        })
    }
}

/// Fetch a post and its comments from the JSON endpoint.
///
/// # Errors
///
/// Returns an error if the URL is not http(s), the request fails after
/// retries, or the payload does not have the post/comments shape.
pub async fn fetch_thread(
    fetcher: &Fetcher,
    post_url: &str,
    depth: usize,
    limit: usize,
) -> Result<Thread, ArchiveError> {
    let endpoint = url::json_endpoint(post_url)?;
    debug!(url = %endpoint, depth, limit, "Fetching thread");

    let response = fetcher
        .get(endpoint.as_str())
        .query("raw_json", 1)
        .query("limit", limit)
        .query("depth", depth)
        .send()
        .await?;
    let payload: Value = response.json().await.map_err(|source| {
        ArchiveError::Schema(format!("response from {endpoint} is not JSON: {source}"))
    })?;

    Thread::from_response(payload)
}
