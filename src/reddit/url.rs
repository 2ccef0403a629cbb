//! Post URL handling: JSON endpoints, post ids and `redd.it` short links.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::LOCATION;
use reqwest::Method;
use url::Url;

use crate::error::{ArchiveError, FetchError};
use crate::fetcher::Fetcher;

/// Hosts that serve `redd.it/<id>` short links.
const SHORT_LINK_HOSTS: &[&str] = &["redd.it", "www.redd.it"];

static POST_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"/comments/([A-Za-z0-9]+)").unwrap(),
        Regex::new(r"(?i)^https?://(?:www\.)?redd\.it/([A-Za-z0-9]+)").unwrap(),
    ]
});

/// Post id (the part after `t3_`) embedded in a post or short-link URL.
#[must_use]
pub fn post_id_from_url(url: &str) -> Option<String> {
    POST_ID_PATTERNS
        .iter()
        .find_map(|p| p.captures(url))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Turn a post URL into its JSON endpoint.
///
/// Drops query and fragment (share links carry tracking parameters), ensures
/// a trailing slash and appends `.json`. Parsing already lowercases the host.
///
/// # Errors
///
/// Returns [`ArchiveError::InvalidUrl`] for anything that is not http(s).
pub fn json_endpoint(url: &str) -> Result<Url, ArchiveError> {
    let mut parsed = parse_http_url(url)?;
    parsed.set_query(None);
    parsed.set_fragment(None);

    let mut path = parsed.path().to_string();
    if !path.ends_with(".json") {
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(".json");
    }
    parsed.set_path(&path);

    Ok(parsed)
}

/// Whether the URL is a `redd.it` short link that must be resolved first.
#[must_use]
pub fn is_short_link(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .is_some_and(|host| SHORT_LINK_HOSTS.contains(&host.as_str()))
}

/// Resolve a `redd.it` short link to the full post URL.
///
/// Sends a HEAD through the fetcher without following redirects, so the
/// usual retry policy and request timeout apply, and returns the `Location`
/// target resolved against the short link.
///
/// # Errors
///
/// Returns the fetch error once retries are exhausted, or
/// [`FetchError::Status`] when the response is not a redirect with a
/// usable `Location`.
pub async fn resolve_short_link(fetcher: &Fetcher, short_url: &str) -> Result<String, ArchiveError> {
    let response = fetcher
        .request(Method::HEAD, short_url)
        .without_redirects()
        .send()
        .await?;

    let status = response.status();
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|location| location.to_str().ok())
        .and_then(|location| response.url().join(location).ok());

    match location {
        Some(target) if status.is_redirection() => Ok(target.to_string()),
        _ => Err(FetchError::Status {
            url: short_url.to_string(),
            status,
        }
        .into()),
    }
}

fn parse_http_url(url: &str) -> Result<Url, ArchiveError> {
    let parsed = Url::parse(url.trim()).map_err(|_| ArchiveError::InvalidUrl(url.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ArchiveError::InvalidUrl(url.to_string()));
    }
    Ok(parsed)
}
