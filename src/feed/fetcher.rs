use crate::feed::parser::{parse_feed, ParsedFeed};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Default response body limit (10MB).
pub const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024;

/// Errors that can occur while fetching a feed.
///
/// The poller treats every variant the same way (log, record the poll
/// time, keep the cursor); the variants exist for logging.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Fetch did not finish within the fetch timeout
    #[error("Request timed out")]
    Timeout,
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Document could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Shared HTTP client for feed fetches and webhook delivery.
///
/// Connections are pooled across workers; per-call timeouts are applied
/// by the callers, the builder timeout is only a backstop.
pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("feedwatch/", env!("CARGO_PKG_VERSION")))
        .redirect(redirect_policy())
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .timeout(Duration::from_secs(120))
        .build()
}

fn redirect_policy() -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            "Following redirect"
        );
        attempt.follow()
    })
}

/// Source of parsed feeds.
///
/// Implementations return items newest-first and must give up once
/// `timeout` has elapsed.
#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<ParsedFeed, FetchError>;
}

/// [`FeedClient`] backed by reqwest and feed-rs.
#[derive(Clone)]
pub struct HttpFeedClient {
    client: reqwest::Client,
    max_feed_size: usize,
}

impl HttpFeedClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            max_feed_size: DEFAULT_MAX_FEED_SIZE,
        }
    }

    pub fn with_max_feed_size(mut self, max_feed_size: usize) -> Self {
        self.max_feed_size = max_feed_size;
        self
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        // No retries here: the next tick is the retry
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, self.max_feed_size).await
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<ParsedFeed, FetchError> {
        // The timeout covers connect, headers and the whole body
        let bytes = tokio::time::timeout(timeout, self.download(url))
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| match e {
                FetchError::Network(err) if err.is_timeout() => FetchError::Timeout,
                other => other,
            })?;

        let feed = parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;
        tracing::debug!(url = %url, items = feed.items.len(), "Fetched feed");
        Ok(feed)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if content_length_exceeds(len, limit) {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

/// A length that doesn't fit in `usize` is always over the limit.
fn content_length_exceeds(len: u64, limit: usize) -> bool {
    usize::try_from(len).map_or(true, |len| len > limit)
}
