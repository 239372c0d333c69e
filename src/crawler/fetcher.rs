//! HTTP page retrieval
//!
//! Robots-gated GET with content-type and size guards. The underlying
//! client pools idle connections and applies the 30 s request timeout;
//! per-host pacing lives in the frontier, not here.

use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::crawler::robots::RobotsCache;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const MAX_IDLE_PER_HOST: usize = 10;
const ACCEPT_HEADER: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Bodies larger than this are dropped before download.
pub const MAX_CONTENT_LENGTH: u64 = 10 * 1024 * 1024;

const HTML_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml", "application/xhtml"];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("disallowed by robots.txt")]
    Disallowed,
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("non-200 status: {0}")]
    Status(u16),
    #[error("unsupported content type: {0}")]
    ContentType(String),
    #[error("content too large: {0} bytes")]
    TooLarge(u64),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// A successfully fetched HTML page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    /// `Content-Language` response header, if present.
    pub content_language: Option<String>,
    pub body: String,
}

/// Robots-aware HTTP fetcher shared by all crawl workers.
pub struct Fetcher {
    client: reqwest::Client,
    robots: RobotsCache,
}

impl Fetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .user_agent(user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        let robots = RobotsCache::new(client.clone(), user_agent.to_string());
        Ok(Self { client, robots })
    }

    /// Fetch one page. Fails fast on robots denial, non-200 status,
    /// non-HTML content type, or an oversize `Content-Length`.
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        if !self.robots.is_allowed(&parsed).await {
            return Err(FetchError::Disallowed);
        }

        let response = self
            .client
            .get(url)
            .header("Accept", ACCEPT_HEADER)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(FetchError::Status(status));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        // A missing header is given the benefit of the doubt
        if !content_type.is_empty() && !is_html_content_type(&content_type) {
            return Err(FetchError::ContentType(content_type));
        }

        if let Some(length) = response.content_length() {
            if length > MAX_CONTENT_LENGTH {
                return Err(FetchError::TooLarge(length));
            }
        }

        let content_language = response
            .headers()
            .get("content-language")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await?;

        Ok(FetchedPage {
            status,
            content_language,
            body,
        })
    }
}

/// Case-insensitive prefix match against the accepted HTML content types.
fn is_html_content_type(content_type: &str) -> bool {
    let normalized = content_type.trim().to_lowercase();
    HTML_CONTENT_TYPES
        .iter()
        .any(|t| normalized.starts_with(t))
}
