//! HTTP client for the GeoJSON feed.

use anyhow::Result;
use reqwest::header;
use std::future::Future;
use tokio::time::{timeout, Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::parser::parse_document;
use super::types::{FetchError, RawFeature, REQUEST_TIMEOUT};
use crate::TARGET_WEB_REQUEST;

/// Anything that can produce one batch of raw features.
pub trait FeedSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<Vec<RawFeature>, FetchError>> + Send;
}

/// Create the shared HTTP client
pub fn create_http_client() -> Result<reqwest::Client> {
    debug!(target: TARGET_WEB_REQUEST, "Creating HTTP client");
    reqwest::Client::builder()
        .gzip(true)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::default())
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))
}

/// Checks that `url` parses and uses http or https.
pub fn parse_feed_url(url: &str) -> Result<Url, FetchError> {
    match Url::parse(url.trim()) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => Ok(parsed),
        _ => Err(FetchError::InvalidUrl(url.to_string())),
    }
}

/// Fetches the USGS summary feed (or any feed in the same layout).
#[derive(Debug, Clone)]
pub struct UsgsClient {
    client: reqwest::Client,
    url: Url,
    request_timeout: Duration,
}

impl UsgsClient {
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self> {
        let url = parse_feed_url(url)?;
        Ok(Self {
            client: create_http_client()?,
            url,
            request_timeout,
        })
    }

    /// Client for `url` with the default request timeout.
    pub fn with_url(url: &str) -> Result<Self> {
        Self::new(url, REQUEST_TIMEOUT)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl FeedSource for UsgsClient {
    async fn fetch(&self) -> Result<Vec<RawFeature>, FetchError> {
        info!(target: TARGET_WEB_REQUEST, "Loading feed from {}", self.url);
        let started = Instant::now();

        let response = match timeout(
            self.request_timeout,
            self.client
                .get(self.url.clone())
                .header(header::ACCEPT, "application/geo+json, application/json;q=0.9, */*;q=0.8")
                .send(),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                warn!(target: TARGET_WEB_REQUEST, "Request to {} failed: {}", self.url, err);
                return Err(FetchError::Transport(err.to_string()));
            }
            Err(_) => {
                warn!(target: TARGET_WEB_REQUEST, "Request to {} timed out after {:?}", self.url, self.request_timeout);
                return Err(FetchError::Timeout(self.request_timeout));
            }
        };

        let status = response.status();
        debug!(target: TARGET_WEB_REQUEST, "Request to {} returned status {}", self.url, status);
        if !status.is_success() {
            warn!(target: TARGET_WEB_REQUEST, "Feed {} responded with {}", self.url, status);
            return Err(FetchError::Status(status.as_u16()));
        }

        let remaining = self.request_timeout.saturating_sub(started.elapsed());
        let body = match timeout(remaining, response.text()).await {
            Ok(Ok(body)) => body,
            Ok(Err(err)) => {
                warn!(target: TARGET_WEB_REQUEST, "Failed to read body from {}: {}", self.url, err);
                return Err(FetchError::Transport(err.to_string()));
            }
            Err(_) => return Err(FetchError::Timeout(self.request_timeout)),
        };
        debug!(target: TARGET_WEB_REQUEST, "Received {} bytes from {} in {:?}", body.len(), self.url, started.elapsed());

        parse_document(&body)
    }
}
