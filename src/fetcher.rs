//! Resilient HTTP fetching with exponential backoff and rate-limit awareness.
//!
//! Every remote call in the pipeline goes through [`Fetcher`], which owns one
//! pooled [`reqwest::Client`] for the whole process, plus a twin client that
//! never follows redirects for short-link resolution. A request is retried on
//! transport failures, HTTP 429 and 5xx; any other 4xx fails immediately.

use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Response};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::constants::DEFAULT_RETRY_AFTER_SECS;
use crate::error::{is_retryable_status, ArchiveError, FetchError};

/// Upper bound of the random jitter added to computed backoff.
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Shared HTTP client plus the default retry policy.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    /// Same settings as `client` but redirects are returned, not followed.
    no_redirect_client: Client,
    max_retries: u32,
    request_timeout: Duration,
    download_timeout: Duration,
    backoff_cap: Duration,
}

impl Fetcher {
    /// Build a fetcher from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self, ArchiveError> {
        let builder = || {
            Client::builder()
                .user_agent(config.user_agent.as_str())
                .connect_timeout(config.connect_timeout)
        };
        let client = builder().build().map_err(ArchiveError::Client)?;
        let no_redirect_client = builder()
            .redirect(Policy::none())
            .build()
            .map_err(ArchiveError::Client)?;

        Ok(Self {
            client,
            no_redirect_client,
            max_retries: config.max_retries,
            request_timeout: config.request_timeout,
            download_timeout: config.download_timeout,
            backoff_cap: config.backoff_cap,
        })
    }

    /// Start building a request with this fetcher's defaults.
    #[must_use]
    pub fn request(&self, method: Method, url: &str) -> FetchRequest<'_> {
        FetchRequest {
            fetcher: self,
            method,
            url: url.to_string(),
            max_retries: self.max_retries,
            timeout: None,
            stream: false,
            follow_redirects: true,
            headers: HeaderMap::new(),
            query: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(&self, url: &str) -> FetchRequest<'_> {
        self.request(Method::GET, url)
    }

    /// Timeout applied to each body chunk of a streamed download.
    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        self.download_timeout
    }

}

/// A request being configured; sent with [`FetchRequest::send`].
#[derive(Debug)]
pub struct FetchRequest<'a> {
    fetcher: &'a Fetcher,
    method: Method,
    url: String,
    max_retries: u32,
    timeout: Option<Duration>,
    stream: bool,
    follow_redirects: bool,
    headers: HeaderMap,
    query: Vec<(String, String)>,
}

impl FetchRequest<'_> {
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Leave the body unread for incremental consumption.
    ///
    /// The timeout then bounds the wait for response headers only instead of
    /// the whole transfer.
    #[must_use]
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Return 3xx responses as-is instead of following them.
    #[must_use]
    pub fn without_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    fn effective_timeout(&self) -> Duration {
        self.timeout.unwrap_or(if self.stream {
            self.fetcher.download_timeout
        } else {
            self.fetcher.request_timeout
        })
    }

    /// Send the request, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last transport error or HTTP status once `max_retries`
    /// retries are exhausted, or immediately for a non-retryable 4xx.
    pub async fn send(self) -> Result<Response, FetchError> {
        let mut attempt = 0u32;

        loop {
            match self.attempt().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_client_error() && !status.is_server_error() {
                        return Ok(response);
                    }

                    let error = FetchError::Status {
                        url: self.url.clone(),
                        status,
                    };
                    if !is_retryable_status(status) || attempt >= self.max_retries {
                        return Err(error);
                    }

                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .map(|v| v.to_str().unwrap_or_default().to_string());
                    let delay = retry_delay(
                        attempt,
                        retry_after.as_deref(),
                        self.fetcher.backoff_cap,
                        random_jitter(),
                    );
                    warn!(
                        url = %self.url,
                        status = status.as_u16(),
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "HTTP {status}; retrying in {:.1}s",
                        delay.as_secs_f64()
                    );
                    sleep(delay).await;
                }
                Err(error) => {
                    if !error.is_retryable() || attempt >= self.max_retries {
                        return Err(error);
                    }

                    let delay = backoff_delay(attempt, self.fetcher.backoff_cap) + random_jitter();
                    warn!(
                        url = %self.url,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Network error {error}; retrying in {:.1}s",
                        delay.as_secs_f64()
                    );
                    sleep(delay).await;
                }
            }
            attempt += 1;
        }
    }

    async fn attempt(&self) -> Result<Response, FetchError> {
        let timeout = self.effective_timeout();
        let client = if self.follow_redirects {
            &self.fetcher.client
        } else {
            &self.fetcher.no_redirect_client
        };
        let mut builder = client
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone());
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }

        debug!(url = %self.url, method = %self.method, stream = self.stream, "Sending request");

        let result = if self.stream {
            match tokio::time::timeout(timeout, builder.send()).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(FetchError::TimedOut {
                        url: self.url.clone(),
                        timeout,
                    })
                }
            }
        } else {
            builder.timeout(timeout).send().await
        };

        result.map_err(|source| {
            if source.is_timeout() {
                FetchError::TimedOut {
                    url: self.url.clone(),
                    timeout,
                }
            } else {
                FetchError::Transport {
                    url: self.url.clone(),
                    source,
                }
            }
        })
    }
}

/// Exponential backoff for the given zero-based attempt: `min(cap, 2^attempt)` seconds.
#[must_use]
pub fn backoff_delay(attempt: u32, cap: Duration) -> Duration {
    let secs = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
    Duration::from_secs(secs).min(cap)
}

/// Delay before retrying a 429/5xx response.
///
/// An explicit `Retry-After` value wins over the computed backoff; an
/// unparsable one falls back to a fixed delay.
#[must_use]
pub fn retry_delay(
    attempt: u32,
    retry_after: Option<&str>,
    cap: Duration,
    jitter: Duration,
) -> Duration {
    match retry_after {
        Some(value) => parse_retry_after(value),
        None => backoff_delay(attempt, cap) + jitter,
    }
}

/// Parse a `Retry-After` header as (possibly fractional) seconds.
#[must_use]
pub fn parse_retry_after(value: &str) -> Duration {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| *secs >= 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_RETRY_AFTER_SECS))
}

fn random_jitter() -> Duration {
    rand::thread_rng().gen_range(Duration::ZERO..MAX_JITTER)
}
